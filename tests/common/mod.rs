#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use procurement_api::{
    config::AppConfig,
    events::{self, EventSender},
    handlers::AppServices,
    logging,
    services::monitor::MonitorSettings,
    store::StateManager,
    AppState,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Helper harness wrapping the full router over a fresh in-memory state manager.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig {
            error_log_capacity: 100,
            monitor_system_checks: false,
            ..AppConfig::default()
        })
    }

    pub fn with_config(cfg: AppConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let store = Arc::new(StateManager::new());
        let services =
            AppServices::new(store.clone(), Some(event_sender), MonitorSettings::from(&cfg));
        let state = AppState {
            config: Arc::new(cfg),
            services,
            store,
        };
        let router = procurement_api::build_router(state.clone(), logging::discard_logger());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a request with an optional JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and returns status plus parsed JSON body.
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Creates an active material and returns its number.
    pub async fn create_material(&self, name: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/materials",
                Some(json!({ "name": name, "type": "RAW", "base_unit": "KG" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["material_number"]
            .as_str()
            .expect("material number")
            .to_string()
    }

    /// Creates a draft order with two items (10 and 20) and returns its number.
    pub async fn create_order(&self, quantities: (&str, &str)) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/orders",
                Some(json!({
                    "description": "Workshop supplies",
                    "requester": "jdoe",
                    "vendor": "Acme Industrial",
                    "items": [
                        { "item_number": 10, "description": "Bolts M8", "quantity": quantities.0, "price": "0.25" },
                        { "item_number": 20, "description": "Nuts M8", "quantity": quantities.1, "price": "0.10" }
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["document_number"]
            .as_str()
            .expect("order number")
            .to_string()
    }

    /// Creates an order and drives it to APPROVED.
    pub async fn approved_order(&self, quantities: (&str, &str)) -> String {
        let number = self.create_order(quantities).await;
        for step in ["submit", "approve"] {
            let (status, body) = self
                .call(
                    Method::POST,
                    &format!("/api/v1/orders/{}/{}", number, step),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{step}: {body}");
        }
        number
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
