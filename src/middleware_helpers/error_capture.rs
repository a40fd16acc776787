use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::errors::ErrorInfo;
use crate::metrics;
use crate::services::monitor::{ErrorLogEntry, MonitorService};
use crate::tracing::RequestId;

/// Records request metrics and copies every 4xx/5xx response into the
/// monitor's error log.
pub async fn error_capture_middleware(
    State(monitor): State<Arc<MonitorService>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|rid| rid.as_str().to_string());

    let response = next.run(request).await;
    let status = response.status();
    metrics::record_http_request(status.as_u16(), start.elapsed());

    if status.is_client_error() || status.is_server_error() {
        let (error_type, message) = match response.extensions().get::<ErrorInfo>() {
            Some(info) => (info.code.clone(), info.message.clone()),
            // Rejections produced by axum extractors carry no ErrorInfo
            None => (
                "http_error".to_string(),
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            ),
        };
        monitor
            .record_error(ErrorLogEntry::new(
                error_type,
                message,
                status.as_u16(),
                method,
                path,
                request_id,
            ))
            .await;
    }

    response
}
