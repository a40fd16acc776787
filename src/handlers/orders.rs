use std::collections::BTreeMap;

use super::common::{
    created_response, map_service_error, message_response, paginate, parse_date_filter,
    parse_enum_filter, success_response,
};
use crate::{
    errors::{ApiError, ServiceError},
    handlers::AppState,
    models::{
        CreateOrderRequest, Order, OrderFilter, ReasonRequest, ReceiptLine, ReceiveOrderRequest,
        UpdateOrderRequest,
    },
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

/// Router for purchase order endpoints
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/:number",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/:number/submit", post(submit_order))
        .route("/:number/approve", post(approve_order))
        .route("/:number/receive", post(receive_order))
        .route("/:number/complete", post(complete_order))
        .route("/:number/cancel", post(cancel_order))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Comma separated statuses, e.g. `APPROVED,PARTIALLY_RECEIVED`
    pub status: Option<String>,
    pub vendor: Option<String>,
    /// Source requisition number
    pub requisition_reference: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// An empty body is a full receipt; anything else must be a valid
/// `ReceiveOrderRequest`.
fn parse_receipt_body(body: &[u8]) -> Result<ReceiveOrderRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReceiveOrderRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest {
        message: format!("Invalid goods receipt body: {}", e),
        error_code: Some("invalid_body".to_string()),
    })
}

/// Folds receipt lines into an item-number keyed map, refusing repeats.
fn receipt_map(number: &str, lines: Vec<ReceiptLine>) -> Result<BTreeMap<u32, Decimal>, ApiError> {
    let mut receipt = BTreeMap::new();
    let mut duplicates = Vec::new();
    for line in lines {
        if receipt.insert(line.item_number, line.quantity).is_some() {
            duplicates.push(line.item_number);
        }
    }
    if duplicates.is_empty() {
        return Ok(receipt);
    }
    duplicates.sort_unstable();
    duplicates.dedup();
    Err(map_service_error(
        ServiceError::validation(format!(
            "Goods receipt for order {} lists item numbers more than once",
            number
        ))
        .with_detail("document_number", number)
        .with_detail("duplicate_items", duplicates)
        .with_detail("reason", "duplicate_items"),
    ))
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders listed", body = crate::ApiResponse<crate::PaginatedResponse<Order>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = OrderFilter {
        statuses: parse_enum_filter("status", query.status.as_deref())?,
        vendor: query.vendor,
        requisition_reference: query.requisition_reference,
        search: query.search,
        date_from: parse_date_filter("date_from", query.date_from.as_deref())?,
        date_to: parse_date_filter("date_to", query.date_to.as_deref())?,
    };
    let orders = state.services.p2p.list_orders(&filter).await;
    Ok(success_response(paginate(
        orders,
        query.page,
        query.per_page,
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    )))
}

/// Create an order in DRAFT
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = crate::ApiResponse<Order>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Document number already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .create_order(payload)
        .await
        .map_err(map_service_error)?;

    info!("Order created: {}", order.document_number);
    Ok(created_response(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{number}",
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order fetched", body = crate::ApiResponse<Order>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .get_order(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{number}",
    request_body = UpdateOrderRequest,
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order updated", body = crate::ApiResponse<Order>),
        (status = 400, description = "Invalid update or status transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .update_order(&number, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

/// Delete an order in DRAFT or CANCELED
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{number}",
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order deleted"),
        (status = 400, description = "Order cannot be deleted in its status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .p2p
        .delete_order(&number)
        .await
        .map_err(map_service_error)?;
    Ok(message_response(format!("Order {} deleted", number)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{number}/submit",
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order submitted", body = crate::ApiResponse<Order>),
        (status = 400, description = "Not in DRAFT or items invalid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn submit_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .submit_order(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{number}/approve",
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order approved", body = crate::ApiResponse<Order>),
        (status = 400, description = "Not in SUBMITTED", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn approve_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .approve_order(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

/// Post a goods receipt. An empty body receives all open quantities.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{number}/receive",
    request_body(content = ReceiveOrderRequest, description = "Quantities per item; omit to receive everything"),
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Goods receipt posted", body = crate::ApiResponse<Order>),
        (status = 400, description = "Receipt rejected", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn receive_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = parse_receipt_body(&body)?;
    let receipt = request
        .items
        .map(|lines| receipt_map(&number, lines))
        .transpose()?;

    let order = state
        .services
        .p2p
        .receive_order(&number, receipt)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{number}/complete",
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order completed", body = crate::ApiResponse<Order>),
        (status = 400, description = "Order has not been received", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn complete_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .complete_order(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{number}/cancel",
    request_body = ReasonRequest,
    params(("number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order canceled", body = crate::ApiResponse<Order>),
        (status = 400, description = "Missing reason or order not cancelable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(payload): Json<ReasonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .p2p
        .cancel_order(&number, &payload.reason)
        .await
        .map_err(map_service_error)?;

    info!("Order {} canceled", order.document_number);
    Ok(success_response(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn receipt_map_rejects_repeated_items() {
        let lines = vec![
            ReceiptLine {
                item_number: 10,
                quantity: dec!(1),
            },
            ReceiptLine {
                item_number: 10,
                quantity: dec!(2),
            },
        ];
        assert!(receipt_map("PO000001", lines).is_err());

        let ok = receipt_map(
            "PO000001",
            vec![ReceiptLine {
                item_number: 20,
                quantity: dec!(3),
            }],
        )
        .unwrap();
        assert_eq!(ok.get(&20), Some(&dec!(3)));
    }

    #[test]
    fn blank_receipt_body_means_full_receipt() {
        assert!(parse_receipt_body(b"").unwrap().items.is_none());
        assert!(parse_receipt_body(b"  \n").unwrap().items.is_none());
        assert!(parse_receipt_body(b"{}").unwrap().items.is_none());
        assert!(parse_receipt_body(b"{not json").is_err());

        let parsed =
            parse_receipt_body(br#"{"items":[{"item_number":10,"quantity":"2.5"}]}"#).unwrap();
        let items = parsed.items.unwrap();
        assert_eq!(items[0].item_number, 10);
        assert_eq!(items[0].quantity, dec!(2.5));
    }
}
