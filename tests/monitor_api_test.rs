//! Tests for the cross-cutting HTTP surface: request ids, the error log,
//! list filters and the operational endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use procurement_api::middleware_helpers::REQUEST_ID_HEADER;
use serde_json::json;

#[tokio::test]
async fn error_body_echoes_request_id_header() {
    let app = TestApp::new();

    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/orders/PO999999",
            None,
            &[(REQUEST_ID_HEADER, "trace-42")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-42");

    let body = response_json(response).await;
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["request_id"], "trace-42");
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn generated_request_id_matches_error_body() {
    let app = TestApp::new();

    let response = app.request(Method::GET, "/api/v1/nowhere", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let header = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .expect("request id header")
        .to_str()
        .unwrap()
        .to_string();

    let body = response_json(response).await;
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["request_id"], header.as_str());
}

#[tokio::test]
async fn failed_requests_land_in_error_log() {
    let app = TestApp::new();
    let po = app.create_order(("1", "1")).await;

    app.call(Method::GET, "/api/v1/orders/PO999999", None).await;
    app.call(Method::POST, &format!("/api/v1/orders/{po}/receive"), None)
        .await;
    app.call(Method::GET, "/api/v1/materials/RAW99999", None).await;

    let (status, body) = app.call(Method::GET, "/api/v1/monitor/errors", None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = body["data"].as_array().expect("error log");
    assert_eq!(logs.len(), 3);
    // Newest first
    assert_eq!(logs[0]["path"], "/api/v1/materials/RAW99999");
    assert_eq!(logs[0]["component"], "materials");
    assert_eq!(logs[1]["error_type"], "validation_error");
    assert_eq!(logs[1]["status_code"], 400);
    assert_eq!(logs[1]["method"], "POST");

    let (_, body) = app
        .call(Method::GET, "/api/v1/monitor/errors?error_type=not_found", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .call(Method::GET, "/api/v1/monitor/errors?component=orders&limit=1", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .call(Method::GET, "/api/v1/monitor/errors/summary?hours=24", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["data"];
    assert_eq!(summary["count"], 3);
    assert_eq!(summary["time_period_hours"], 24);
    assert_eq!(summary["by_type"]["not_found"], 2);
    assert_eq!(summary["by_status"]["400"], 1);
    assert_eq!(summary["by_component"]["orders"], 2);
    assert!(summary["time_range"].is_object());

    let (status, body) = app.call(Method::DELETE, "/api/v1/monitor/errors", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], 3);

    let (_, body) = app.call(Method::GET, "/api/v1/monitor/errors", None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn summary_rejects_non_positive_window() {
    let app = TestApp::new();
    let (status, body) = app
        .call(Method::GET, "/api/v1/monitor/errors/summary?hours=0", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_filter");
}

#[tokio::test]
async fn oversized_hour_windows_are_rejected() {
    let app = TestApp::new();
    app.call(Method::GET, "/api/v1/orders/PO999999", None).await;

    for uri in [
        "/api/v1/monitor/errors?hours=9223372036854775807",
        "/api/v1/monitor/errors?hours=-1",
        "/api/v1/monitor/errors/summary?hours=9223372036854775807",
        "/api/v1/monitor/metrics?hours=9223372036854775807",
        "/api/v1/monitor/metrics/summary?hours=0",
    ] {
        let (status, body) = app.call(Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
        assert_eq!(body["code"], "invalid_filter", "{uri}");
    }

    // The service is still up and a sane window still answers
    let (status, body) = app
        .call(Method::GET, "/api/v1/monitor/errors?hours=1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["path"], "/api/v1/orders/PO999999");
}

#[tokio::test]
async fn system_metrics_are_collected_and_summarised() {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::GET, "/api/v1/monitor/metrics/summary", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);
    assert_eq!(body["data"]["message"], "No metrics available");

    for _ in 0..2 {
        let (status, body) = app
            .call(Method::POST, "/api/v1/monitor/metrics/collect", None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let memory = body["data"]["memory_usage"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&memory));
    }

    let (_, body) = app
        .call(Method::GET, "/api/v1/monitor/metrics?hours=1", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .call(Method::GET, "/api/v1/monitor/metrics/summary?hours=24", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["data"];
    assert_eq!(summary["count"], 2);
    assert_eq!(summary["time_period_hours"], 24);
    assert!(summary["averages"]["disk_usage"].is_number());
    assert!(summary["maximums"]["cpu_percent"].is_number());
    assert!(summary["current"]["timestamp"].is_string());

    let (status, body) = app.call(Method::GET, "/api/v1/monitor/system", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["cpu_count"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn order_list_filters_and_paginates() {
    let app = TestApp::new();
    let first = app.create_order(("1", "1")).await;
    let second = app.approved_order(("2", "2")).await;
    app.create_order(("3", "3")).await;

    let (status, body) = app
        .call(Method::GET, "/api/v1/orders?per_page=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["total"], 3);
    assert_eq!(page["per_page"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["items"][0]["document_number"], first.as_str());

    let (_, body) = app
        .call(Method::GET, "/api/v1/orders?per_page=2&page=2", None)
        .await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    let (_, body) = app
        .call(Method::GET, "/api/v1/orders?status=approved", None)
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["document_number"], second.as_str());

    let (_, body) = app
        .call(Method::GET, "/api/v1/orders?status=DRAFT,APPROVED&vendor=acme%20industrial", None)
        .await;
    assert_eq!(body["data"]["total"], 3);

    let (_, body) = app
        .call(Method::GET, "/api/v1/orders?search=nuts", None)
        .await;
    assert_eq!(body["data"]["total"], 3);

    let (_, body) = app
        .call(Method::GET, "/api/v1/orders?vendor=Globex", None)
        .await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn invalid_filters_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::GET, "/api/v1/orders?status=SHIPPED", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_filter");

    let (status, body) = app
        .call(Method::GET, "/api/v1/requisitions?date_from=yesterday", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_filter");
}

#[tokio::test]
async fn malformed_receipt_body_is_rejected() {
    let app = TestApp::new();
    let po = app.approved_order(("1", "1")).await;

    let response = app
        .request_with_headers(
            Method::POST,
            &format!("/api/v1/orders/{po}/receive"),
            None,
            &[("content-type", "application/json")],
        )
        .await;
    // An empty body still means "receive everything"
    assert_eq!(response.status(), StatusCode::OK);

    let po = app.approved_order(("1", "1")).await;
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/receive"),
            Some(json!({ "items": "all" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_body");
}

#[tokio::test]
async fn operational_endpoints_respond() {
    let app = TestApp::new();
    app.create_material("Copper wire").await;

    let (status, body) = app.call(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["status"].is_string());
    assert!(body["version"].is_string());

    let (status, body) = app.call(Method::GET, "/api/v1/monitor/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["documents"]["materials"], 1);

    let (status, body) = app.call(Method::GET, "/api/v1/monitor/components", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert!(names.contains(&"state_manager"));

    let response = app.request(Method::GET, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));

    let (status, body) = app.call(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/orders/{number}/receive"].is_object());
    assert!(body["paths"]["/api/v1/monitor/metrics/summary"].is_object());
}
