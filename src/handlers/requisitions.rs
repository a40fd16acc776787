use super::common::{
    created_response, map_service_error, message_response, paginate, parse_date_filter,
    parse_enum_filter, success_response,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    models::{
        CreateOrderFromRequisitionRequest, CreateRequisitionRequest, Order, ReasonRequest,
        Requisition, RequisitionFilter, UpdateRequisitionRequest,
    },
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

/// Router for purchase requisition endpoints
pub fn requisition_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requisitions).post(create_requisition))
        .route(
            "/:number",
            get(get_requisition)
                .put(update_requisition)
                .delete(delete_requisition),
        )
        .route("/:number/submit", post(submit_requisition))
        .route("/:number/approve", post(approve_requisition))
        .route("/:number/reject", post(reject_requisition))
        .route("/:number/order", post(create_order_from_requisition))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequisitionListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Comma separated statuses, e.g. `DRAFT,SUBMITTED`
    pub status: Option<String>,
    pub requester: Option<String>,
    pub department: Option<String>,
    /// Case-insensitive match on description, document number or item text
    pub search: Option<String>,
    /// Inclusive lower bound on creation date (`YYYY-MM-DD`)
    pub date_from: Option<String>,
    /// Inclusive upper bound on creation date (`YYYY-MM-DD`)
    pub date_to: Option<String>,
}

/// List requisitions
#[utoipa::path(
    get,
    path = "/api/v1/requisitions",
    params(RequisitionListQuery),
    responses(
        (status = 200, description = "Requisitions listed", body = crate::ApiResponse<crate::PaginatedResponse<Requisition>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn list_requisitions(
    State(state): State<AppState>,
    Query(query): Query<RequisitionListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = RequisitionFilter {
        statuses: parse_enum_filter("status", query.status.as_deref())?,
        requester: query.requester,
        department: query.department,
        search: query.search,
        date_from: parse_date_filter("date_from", query.date_from.as_deref())?,
        date_to: parse_date_filter("date_to", query.date_to.as_deref())?,
    };
    let requisitions = state.services.p2p.list_requisitions(&filter).await;
    Ok(success_response(paginate(
        requisitions,
        query.page,
        query.per_page,
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    )))
}

/// Create a requisition in DRAFT
#[utoipa::path(
    post,
    path = "/api/v1/requisitions",
    request_body = CreateRequisitionRequest,
    responses(
        (status = 201, description = "Requisition created", body = crate::ApiResponse<Requisition>),
        (status = 400, description = "Invalid request or inactive material", body = crate::errors::ErrorResponse),
        (status = 409, description = "Document number already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn create_requisition(
    State(state): State<AppState>,
    Json(payload): Json<CreateRequisitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requisition = state
        .services
        .p2p
        .create_requisition(payload)
        .await
        .map_err(map_service_error)?;

    info!("Requisition created: {}", requisition.document_number);
    Ok(created_response(requisition))
}

#[utoipa::path(
    get,
    path = "/api/v1/requisitions/{number}",
    params(("number" = String, Path, description = "Requisition number")),
    responses(
        (status = 200, description = "Requisition fetched", body = crate::ApiResponse<Requisition>),
        (status = 404, description = "Requisition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn get_requisition(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requisition = state
        .services
        .p2p
        .get_requisition(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(requisition))
}

/// Update header fields, items (DRAFT only) or status
#[utoipa::path(
    put,
    path = "/api/v1/requisitions/{number}",
    request_body = UpdateRequisitionRequest,
    params(("number" = String, Path, description = "Requisition number")),
    responses(
        (status = 200, description = "Requisition updated", body = crate::ApiResponse<Requisition>),
        (status = 400, description = "Invalid update or status transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Requisition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn update_requisition(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(payload): Json<UpdateRequisitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requisition = state
        .services
        .p2p
        .update_requisition(&number, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(requisition))
}

/// Delete a requisition in DRAFT or REJECTED
#[utoipa::path(
    delete,
    path = "/api/v1/requisitions/{number}",
    params(("number" = String, Path, description = "Requisition number")),
    responses(
        (status = 200, description = "Requisition deleted"),
        (status = 400, description = "Requisition cannot be deleted in its status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Requisition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn delete_requisition(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .p2p
        .delete_requisition(&number)
        .await
        .map_err(map_service_error)?;
    Ok(message_response(format!("Requisition {} deleted", number)))
}

#[utoipa::path(
    post,
    path = "/api/v1/requisitions/{number}/submit",
    params(("number" = String, Path, description = "Requisition number")),
    responses(
        (status = 200, description = "Requisition submitted", body = crate::ApiResponse<Requisition>),
        (status = 400, description = "Not in DRAFT or items invalid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Requisition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn submit_requisition(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requisition = state
        .services
        .p2p
        .submit_requisition(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(requisition))
}

#[utoipa::path(
    post,
    path = "/api/v1/requisitions/{number}/approve",
    params(("number" = String, Path, description = "Requisition number")),
    responses(
        (status = 200, description = "Requisition approved", body = crate::ApiResponse<Requisition>),
        (status = 400, description = "Not in SUBMITTED", body = crate::errors::ErrorResponse),
        (status = 404, description = "Requisition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn approve_requisition(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requisition = state
        .services
        .p2p
        .approve_requisition(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(requisition))
}

#[utoipa::path(
    post,
    path = "/api/v1/requisitions/{number}/reject",
    request_body = ReasonRequest,
    params(("number" = String, Path, description = "Requisition number")),
    responses(
        (status = 200, description = "Requisition rejected", body = crate::ApiResponse<Requisition>),
        (status = 400, description = "Missing reason or not in SUBMITTED", body = crate::errors::ErrorResponse),
        (status = 404, description = "Requisition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn reject_requisition(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(payload): Json<ReasonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requisition = state
        .services
        .p2p
        .reject_requisition(&number, &payload.reason)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(requisition))
}

/// Convert an approved requisition into a draft order
#[utoipa::path(
    post,
    path = "/api/v1/requisitions/{number}/order",
    request_body = CreateOrderFromRequisitionRequest,
    params(("number" = String, Path, description = "Requisition number")),
    responses(
        (status = 201, description = "Order created from requisition", body = crate::ApiResponse<Order>),
        (status = 400, description = "Requisition not APPROVED or vendor missing", body = crate::errors::ErrorResponse),
        (status = 404, description = "Requisition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "requisitions"
)]
pub async fn create_order_from_requisition(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(payload): Json<CreateOrderFromRequisitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .create_order_from_requisition(&number, &payload.vendor, payload.payment_terms)
        .await
        .map_err(map_service_error)?;

    info!(
        "Order {} created from requisition {}",
        order.document_number, number
    );
    Ok(created_response(order))
}
