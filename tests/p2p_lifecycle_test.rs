//! End-to-end tests for the procure-to-pay flow over HTTP.
//!
//! - Material creation and activation rules
//! - Requisition submit / approve / reject
//! - Requisition to order conversion
//! - Goods receipt (partial, full, over-receipt)
//! - Order completion, cancellation and deletion rules

mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

fn item<'a>(document: &'a Value, item_number: u64) -> &'a Value {
    document["items"]
        .as_array()
        .expect("items array")
        .iter()
        .find(|i| i["item_number"] == item_number)
        .expect("item present")
}

// ==================== Requisition to order ====================

#[tokio::test]
async fn requisition_converts_into_order_and_is_received() {
    let app = TestApp::new();
    let steel = app.create_material("Steel sheet").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/requisitions",
            Some(json!({
                "description": "Sheet metal for line 3",
                "requester": "mrossi",
                "department": "Production",
                "items": [
                    { "item_number": 10, "material_number": steel, "description": "Steel sheet 2mm", "quantity": "8", "unit": "KG", "price": "12.50" },
                    { "item_number": 20, "description": "Cutting service", "quantity": "2", "unit": "H", "price": "80" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);
    let requisition = body["data"].clone();
    let pr = requisition["document_number"].as_str().unwrap().to_string();
    assert!(pr.starts_with("PR"));
    assert_eq!(requisition["status"], "DRAFT");
    assert_eq!(decimal(&requisition["total_value"]), dec!(260));

    for step in ["submit", "approve"] {
        let (status, body) = app
            .call(Method::POST, &format!("/api/v1/requisitions/{pr}/{step}"), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{step}: {body}");
    }

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/requisitions/{pr}/order"),
            Some(json!({ "vendor": "Acme Metals", "payment_terms": "NET30" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = body["data"].clone();
    let po = order["document_number"].as_str().unwrap().to_string();
    assert!(po.starts_with("PO"));
    assert_eq!(order["status"], "DRAFT");
    assert_eq!(order["requisition_reference"], pr.as_str());
    assert_eq!(order["vendor"], "Acme Metals");
    assert_eq!(item(&order, 10)["requisition_item"], 10);
    assert_eq!(decimal(&order["total_value"]), dec!(260));

    let (_, body) = app
        .call(Method::GET, &format!("/api/v1/requisitions/{pr}"), None)
        .await;
    assert_eq!(body["data"]["status"], "ORDERED");
    assert_eq!(item(&body["data"], 20)["status"], "ORDERED");
    assert_eq!(item(&body["data"], 20)["assigned_to_order"], po.as_str());

    // A requisition can only be converted once
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/requisitions/{pr}/order"),
            Some(json!({ "vendor": "Acme Metals" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["current_status"], "ORDERED");

    for step in ["submit", "approve"] {
        let (status, _) = app
            .call(Method::POST, &format!("/api/v1/orders/{po}/{step}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/receive"),
            Some(json!({ "items": [{ "item_number": 10, "quantity": "5" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "PARTIALLY_RECEIVED");
    assert_eq!(decimal(&item(&body["data"], 10)["received_quantity"]), dec!(5));
    assert_eq!(item(&body["data"], 10)["status"], "PARTIALLY_RECEIVED");
    assert_eq!(item(&body["data"], 20)["status"], "OPEN");

    // Empty body receives whatever is still open
    let (status, body) = app
        .call(Method::POST, &format!("/api/v1/orders/{po}/receive"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "RECEIVED");
    assert_eq!(decimal(&item(&body["data"], 10)["received_quantity"]), dec!(8));
    assert_eq!(decimal(&item(&body["data"], 20)["received_quantity"]), dec!(2));

    let (status, body) = app
        .call(Method::POST, &format!("/api/v1/orders/{po}/complete"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "COMPLETED");
}

#[tokio::test]
async fn rejecting_requires_reason_and_appends_note() {
    let app = TestApp::new();
    let (_, body) = app
        .call(
            Method::POST,
            "/api/v1/requisitions",
            Some(json!({
                "description": "Laptops",
                "requester": "akim",
                "notes": "Urgent",
                "items": [{ "item_number": 10, "description": "Laptop", "quantity": "3", "price": "1200" }]
            })),
        )
        .await;
    let pr = body["data"]["document_number"].as_str().unwrap().to_string();
    app.call(Method::POST, &format!("/api/v1/requisitions/{pr}/submit"), None)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/requisitions/{pr}/reject"),
            Some(json!({ "reason": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/requisitions/{pr}/reject"),
            Some(json!({ "reason": "Budget frozen" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "REJECTED");
    assert_eq!(body["data"]["notes"], "Urgent\nREJECTED: Budget frozen");

    // Rejected requisitions may be deleted
    let (status, body) = app
        .call(Method::DELETE, &format!("/api/v1/requisitions/{pr}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains(&pr));

    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/requisitions/{pr}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inactive_materials_cannot_be_requested() {
    let app = TestApp::new();
    let material = app.create_material("Old gasket").await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/materials/{material}/deprecate"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "DEPRECATED");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/requisitions",
            Some(json!({
                "description": "Gaskets",
                "requester": "mrossi",
                "items": [{ "item_number": 10, "material_number": material, "description": "Gasket", "quantity": "10" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("is not active"));

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/requisitions",
            Some(json!({
                "description": "Gaskets",
                "requester": "mrossi",
                "items": [{ "item_number": 10, "material_number": "RAW99999", "description": "Gasket", "quantity": "10" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Deprecated is terminal
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/materials/{material}/activate"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/materials/{material}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

// ==================== Goods receipt ====================

#[tokio::test]
async fn over_receipt_is_rejected_with_details() {
    let app = TestApp::new();
    let po = app.approved_order(("10", "4")).await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/receive"),
            Some(json!({ "items": [{ "item_number": 20, "quantity": "5" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    let over = &body["details"]["over_receipt"][0];
    assert_eq!(over["item_number"], 20);
    assert_eq!(decimal(&over["remaining"]), dec!(4));

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/receive"),
            Some(json!({ "items": [{ "item_number": 99, "quantity": "1" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["unknown_items"], json!([99]));

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/receive"),
            Some(json!({ "items": [
                { "item_number": 10, "quantity": "1" },
                { "item_number": 10, "quantity": "2" }
            ] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["duplicate_items"], json!([10]));

    // Nothing was posted by the failed attempts
    let (_, body) = app
        .call(Method::GET, &format!("/api/v1/orders/{po}"), None)
        .await;
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(decimal(&item(&body["data"], 20)["received_quantity"]), dec!(0));
}

#[tokio::test]
async fn draft_orders_cannot_be_received() {
    let app = TestApp::new();
    let po = app.create_order(("1", "1")).await;

    let (status, body) = app
        .call(Method::POST, &format!("/api/v1/orders/{po}/receive"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["current_status"], "DRAFT");
    assert_eq!(body["details"]["allowed_statuses"], json!(["APPROVED", "PARTIALLY_RECEIVED"]));
}

// ==================== Deletion and cancellation ====================

#[tokio::test]
async fn orders_are_deletable_only_in_draft_or_canceled() {
    let app = TestApp::new();
    let po = app.create_order(("3", "3")).await;

    let (status, _) = app
        .call(Method::POST, &format!("/api/v1/orders/{po}/submit"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/v1/orders/{po}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        format!("Validation error: Cannot delete order {po} with status SUBMITTED. Must be DRAFT or CANCELED.")
    );

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/cancel"),
            Some(json!({ "reason": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/cancel"),
            Some(json!({ "reason": "Vendor out of stock" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CANCELED");
    assert_eq!(body["data"]["notes"], "CANCELED: Vendor out of stock");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/orders/{po}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/orders/{po}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn received_orders_cannot_be_canceled() {
    let app = TestApp::new();
    let po = app.approved_order(("1", "1")).await;
    app.call(Method::POST, &format!("/api/v1/orders/{po}/receive"), None)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/orders/{po}/cancel"),
            Some(json!({ "reason": "Too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["current_status"], "RECEIVED");
}

// ==================== Updates ====================

#[tokio::test]
async fn items_are_frozen_after_submit() {
    let app = TestApp::new();
    let po = app.create_order(("2", "2")).await;

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/orders/{po}"),
            Some(json!({
                "items": [{ "item_number": 10, "description": "Bolts M10", "quantity": "4", "price": "0.30" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(decimal(&body["data"]["total_value"]), dec!(1.2));

    app.call(Method::POST, &format!("/api/v1/orders/{po}/submit"), None)
        .await;

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/v1/orders/{po}"),
            Some(json!({
                "items": [{ "item_number": 10, "description": "Bolts M12", "quantity": "4", "price": "0.30" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Jumping straight to COMPLETED is not a valid transition
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/orders/{po}"),
            Some(json!({ "status": "COMPLETED" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["requested_status"], "COMPLETED");
}

#[tokio::test]
async fn duplicate_document_numbers_conflict() {
    let app = TestApp::new();
    let payload = json!({
        "document_number": "PO-EXT-1",
        "description": "External order",
        "requester": "jdoe",
        "vendor": "Globex",
        "items": [{ "item_number": 10, "description": "Widget", "quantity": "1" }]
    });

    let (status, _) = app
        .call(Method::POST, "/api/v1/orders", Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.call(Method::POST, "/api/v1/orders", Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
    assert_eq!(body["details"]["document_number"], "PO-EXT-1");
}

#[tokio::test]
async fn update_cannot_skip_dedicated_operations() {
    let app = TestApp::new();
    let po = app.approved_order(("2", "2")).await;

    for (status, endpoint) in [
        ("CANCELED", "cancel"),
        ("RECEIVED", "receive"),
        ("PARTIALLY_RECEIVED", "receive"),
        ("COMPLETED", "complete"),
    ] {
        let (code, body) = app
            .call(
                Method::PUT,
                &format!("/api/v1/orders/{po}"),
                Some(json!({ "status": status })),
            )
            .await;
        assert_eq!(code, StatusCode::BAD_REQUEST, "{status}: {body}");
        assert_eq!(body["code"], "validation_error");
        assert_eq!(body["details"]["reason"], "status_requires_endpoint");
        assert_eq!(body["details"]["endpoint"], endpoint);
        assert_eq!(body["details"]["requested_status"], status);
    }

    let (_, body) = app.call(Method::GET, &format!("/api/v1/orders/{po}"), None).await;
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(decimal(&item(&body["data"], 10)["received_quantity"]), Decimal::ZERO);
    assert_eq!(decimal(&item(&body["data"], 20)["received_quantity"]), Decimal::ZERO);

    // Receipt through the dedicated operation still works afterwards
    let (status, body) = app
        .call(Method::POST, &format!("/api/v1/orders/{po}/receive"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "RECEIVED");
}

#[tokio::test]
async fn requisition_update_cannot_reject_or_order() {
    let app = TestApp::new();
    let (_, body) = app
        .call(
            Method::POST,
            "/api/v1/requisitions",
            Some(json!({
                "description": "Monitors",
                "requester": "akim",
                "items": [{ "item_number": 10, "description": "Monitor", "quantity": "2", "price": "300" }]
            })),
        )
        .await;
    let pr = body["data"]["document_number"].as_str().unwrap().to_string();

    // DRAFT to SUBMITTED stays available through update
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/requisitions/{pr}"),
            Some(json!({ "status": "SUBMITTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "SUBMITTED");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/requisitions/{pr}"),
            Some(json!({ "status": "REJECTED", "notes": "no reason given" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["endpoint"], "reject");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/requisitions/{pr}"),
            Some(json!({ "status": "APPROVED" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["endpoint"], "approve");

    let (_, body) = app
        .call(Method::GET, &format!("/api/v1/requisitions/{pr}"), None)
        .await;
    assert_eq!(body["data"]["status"], "SUBMITTED");
    assert!(body["data"]["notes"].is_null());
}

// ==================== Input limits ====================

#[tokio::test]
async fn amounts_beyond_decimal_range_are_rejected() {
    let app = TestApp::new();
    let huge = "100000000000000000000";

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "description": "Too much",
                "requester": "jdoe",
                "vendor": "Acme Industrial",
                "items": [{ "item_number": 10, "description": "Bolts", "quantity": huge, "price": huge }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "validation_error");
    assert_eq!(body["details"]["reason"], "amount_overflow");
    assert_eq!(body["details"]["item_number"], 10);

    let po = app.create_order(("1", "1")).await;
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/orders/{po}"),
            Some(json!({
                "items": [{ "item_number": 10, "description": "Bolts", "quantity": huge, "price": huge }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["details"]["reason"], "amount_overflow");

    // The server keeps serving and the failures are logged
    let (status, body) = app.call(Method::GET, "/api/v1/monitor/errors", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let (_, body) = app.call(Method::GET, &format!("/api/v1/orders/{po}"), None).await;
    assert_eq!(decimal(&body["data"]["total_value"]), dec!(0.35));
}

#[tokio::test]
async fn blank_document_and_material_numbers_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "document_number": "   ",
                "description": "Blank number",
                "requester": "jdoe",
                "vendor": "Acme Industrial",
                "items": [{ "item_number": 10, "description": "Bolts", "quantity": "1" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/requisitions",
            Some(json!({
                "document_number": "\t ",
                "description": "Blank number",
                "requester": "jdoe",
                "items": [{ "item_number": 10, "description": "Bolts", "quantity": "1" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/materials",
            Some(json!({ "material_number": "  ", "name": "Copper", "type": "RAW", "base_unit": "KG" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "validation_error");

    let (_, body) = app.call(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(body["data"]["total"], 0);
}
