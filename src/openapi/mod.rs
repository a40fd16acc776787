use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Procurement API",
        version = "1.0.0",
        description = r#"
# Procure-to-pay document service

Material master data, purchase requisitions and purchase orders with
lifecycle validation and goods receipt.

## Document lifecycle

- Requisitions: `DRAFT -> SUBMITTED -> APPROVED | REJECTED`, approved requisitions become `ORDERED` once converted
- Orders: `DRAFT -> SUBMITTED -> APPROVED -> PARTIALLY_RECEIVED -> RECEIVED -> COMPLETED`, cancelable until fully received

## Error Handling

Every failure uses the same body:

```json
{
  "error": "Bad Request",
  "code": "validation_error",
  "message": "Validation error: Cannot delete order PO000001 with status SUBMITTED. Must be DRAFT or CANCELED.",
  "details": { "document_number": "PO000001", "current_status": "SUBMITTED" },
  "request_id": "5a1f...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "materials", description = "Material master data"),
        (name = "requisitions", description = "Purchase requisitions"),
        (name = "orders", description = "Purchase orders and goods receipt"),
        (name = "monitor", description = "Health, error log and metrics")
    ),
    paths(
        // Materials
        crate::handlers::materials::list_materials,
        crate::handlers::materials::create_material,
        crate::handlers::materials::get_material,
        crate::handlers::materials::update_material,
        crate::handlers::materials::delete_material,
        crate::handlers::materials::deprecate_material,
        crate::handlers::materials::activate_material,

        // Requisitions
        crate::handlers::requisitions::list_requisitions,
        crate::handlers::requisitions::create_requisition,
        crate::handlers::requisitions::get_requisition,
        crate::handlers::requisitions::update_requisition,
        crate::handlers::requisitions::delete_requisition,
        crate::handlers::requisitions::submit_requisition,
        crate::handlers::requisitions::approve_requisition,
        crate::handlers::requisitions::reject_requisition,
        crate::handlers::requisitions::create_order_from_requisition,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::submit_order,
        crate::handlers::orders::approve_order,
        crate::handlers::orders::receive_order,
        crate::handlers::orders::complete_order,
        crate::handlers::orders::cancel_order,

        // Monitor
        crate::handlers::health::liveness,
        crate::handlers::health::monitor_health,
        crate::handlers::health::list_components,
        crate::handlers::health::list_errors,
        crate::handlers::health::error_summary,
        crate::handlers::health::clear_errors,
        crate::handlers::health::list_system_metrics,
        crate::handlers::health::system_metrics_summary,
        crate::handlers::health::collect_system_metrics,
        crate::handlers::health::system_info,
        crate::handlers::health::metrics,
    ),
    components(
        schemas(
            crate::ResponseMeta,

            crate::models::DocumentStatus,
            crate::models::DocumentItemStatus,
            crate::models::ProcurementType,
            crate::models::MaterialType,
            crate::models::UnitOfMeasure,
            crate::models::MaterialStatus,

            crate::models::Material,
            crate::models::CreateMaterialRequest,
            crate::models::UpdateMaterialRequest,

            crate::models::Requisition,
            crate::models::RequisitionItem,
            crate::models::RequisitionItemInput,
            crate::models::CreateRequisitionRequest,
            crate::models::UpdateRequisitionRequest,
            crate::models::CreateOrderFromRequisitionRequest,

            crate::models::Order,
            crate::models::OrderItem,
            crate::models::OrderItemInput,
            crate::models::CreateOrderRequest,
            crate::models::UpdateOrderRequest,
            crate::models::ReasonRequest,
            crate::models::ReceiptLine,
            crate::models::ReceiveOrderRequest,

            crate::services::monitor::ComponentHealth,
            crate::services::monitor::ComponentStatus,
            crate::services::monitor::ErrorLogEntry,
            crate::services::monitor::ErrorSummary,
            crate::services::monitor::TimeRange,
            crate::services::monitor::HealthReport,
            crate::services::monitor::SystemMetrics,
            crate::services::monitor::MetricAggregates,
            crate::services::monitor::MetricsTimeRange,
            crate::services::monitor::MetricsSummary,
            crate::services::monitor::SystemInfo,
            crate::store::StoreCounts,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}
