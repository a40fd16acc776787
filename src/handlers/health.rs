use super::common::{map_service_error, parse_hours_filter, success_response};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::monitor::{
        ComponentHealth, ComponentStatus, ErrorLogEntry, ErrorLogQuery, ErrorSummary, HealthReport,
        MetricsQuery, MetricsSummary, SystemInfo, SystemMetrics,
    },
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

/// Router for the monitoring endpoints mounted under `/api/v1/monitor`
pub fn monitor_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(monitor_health))
        .route("/components", get(list_components))
        .route("/errors", get(list_errors).delete(clear_errors))
        .route("/errors/summary", get(error_summary))
        .route("/metrics", get(list_system_metrics))
        .route("/metrics/summary", get(system_metrics_summary))
        .route("/metrics/collect", post(collect_system_metrics))
        .route("/system", get(system_info))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Only count errors from the last N hours
    pub hours: Option<i64>,
}

/// Liveness check. Responds 503 when any component reports an error.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up"),
        (status = 503, description = "A component reports an error")
    ),
    tag = "monitor"
)]
pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.services.monitor.health().await;
    let status = if report.status == ComponentHealth::Error {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({
            "status": report.status,
            "version": report.version,
            "uptime_seconds": report.uptime_seconds,
            "timestamp": report.timestamp.to_rfc3339(),
        })),
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/monitor/health",
    responses(
        (status = 200, description = "Aggregate health report", body = crate::ApiResponse<HealthReport>)
    ),
    tag = "monitor"
)]
pub async fn monitor_health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.monitor.health().await;
    Ok(success_response(report))
}

#[utoipa::path(
    get,
    path = "/api/v1/monitor/components",
    responses(
        (status = 200, description = "Registered components", body = crate::ApiResponse<Vec<ComponentStatus>>)
    ),
    tag = "monitor"
)]
pub async fn list_components(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.monitor.components()))
}

/// Captured error responses, newest first
#[utoipa::path(
    get,
    path = "/api/v1/monitor/errors",
    params(ErrorLogQuery),
    responses(
        (status = 200, description = "Error log entries", body = crate::ApiResponse<Vec<ErrorLogEntry>>)
    ),
    tag = "monitor"
)]
pub async fn list_errors(
    State(state): State<AppState>,
    Query(mut query): Query<ErrorLogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.hours = parse_hours_filter(query.hours)?;
    let logs = state.services.monitor.error_logs(&query).await;
    Ok(success_response(logs))
}

#[utoipa::path(
    get,
    path = "/api/v1/monitor/errors/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Error counts by type, status, path and component", body = crate::ApiResponse<ErrorSummary>)
    ),
    tag = "monitor"
)]
pub async fn error_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hours = parse_hours_filter(query.hours)?;
    let summary = state.services.monitor.error_summary(hours).await;
    Ok(success_response(summary))
}

#[utoipa::path(
    delete,
    path = "/api/v1/monitor/errors",
    responses(
        (status = 200, description = "Error log cleared")
    ),
    tag = "monitor"
)]
pub async fn clear_errors(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cleared = state.services.monitor.clear_error_logs().await;
    Ok(success_response(json!({ "cleared": cleared })))
}

/// Stored system metric snapshots, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/monitor/metrics",
    params(MetricsQuery),
    responses(
        (status = 200, description = "System metric snapshots", body = crate::ApiResponse<Vec<SystemMetrics>>),
        (status = 400, description = "Invalid hours window", body = crate::errors::ErrorResponse)
    ),
    tag = "monitor"
)]
pub async fn list_system_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hours = parse_hours_filter(query.hours)?;
    Ok(success_response(state.services.monitor.get_metrics(hours).await))
}

#[utoipa::path(
    get,
    path = "/api/v1/monitor/metrics/summary",
    params(MetricsQuery),
    responses(
        (status = 200, description = "Averages and maximums over the window", body = crate::ApiResponse<MetricsSummary>),
        (status = 400, description = "Invalid hours window", body = crate::errors::ErrorResponse)
    ),
    tag = "monitor"
)]
pub async fn system_metrics_summary(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hours = parse_hours_filter(query.hours)?;
    Ok(success_response(
        state.services.monitor.get_metrics_summary(hours).await,
    ))
}

/// Samples the host now and stores the snapshot
#[utoipa::path(
    post,
    path = "/api/v1/monitor/metrics/collect",
    responses(
        (status = 200, description = "Collected snapshot", body = crate::ApiResponse<SystemMetrics>)
    ),
    tag = "monitor"
)]
pub async fn collect_system_metrics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .services
        .monitor
        .collect_current_metrics()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(snapshot))
}

#[utoipa::path(
    get,
    path = "/api/v1/monitor/system",
    responses(
        (status = 200, description = "Host platform details", body = crate::ApiResponse<SystemInfo>)
    ),
    tag = "monitor"
)]
pub async fn system_info(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .services
        .monitor
        .get_system_info()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(info))
}

/// Prometheus text exposition of the in-process registry
#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, description = "Metrics in Prometheus text format", content_type = "text/plain")),
    tag = "monitor"
)]
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::METRICS.export_metrics(),
    )
}

pub async fn metrics_json() -> impl IntoResponse {
    Json(crate::metrics::METRICS.export_metrics_json())
}
