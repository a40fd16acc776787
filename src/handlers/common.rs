use crate::errors::{ApiError, ServiceError};
use crate::{ApiResponse, PaginatedResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::str::FromStr;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Success envelope with a human readable message and no payload.
pub fn message_response(message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::<()>::message(message.into())),
    )
        .into_response()
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

fn invalid_filter(message: String) -> ApiError {
    ApiError::BadRequest {
        message,
        error_code: Some("invalid_filter".to_string()),
    }
}

/// Parses a comma separated enum filter such as `status=DRAFT,SUBMITTED`.
pub fn parse_enum_filter<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Vec<T>, ApiError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => crate::models::parse_status_list(raw)
            .map_err(|e| invalid_filter(format!("{} for '{}'", e, field))),
    }
}

/// Parses a `YYYY-MM-DD` query parameter.
pub fn parse_date_filter(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                invalid_filter(format!(
                    "Invalid date '{}' for '{}', expected YYYY-MM-DD",
                    s, field
                ))
            })
        })
        .transpose()
}

/// Validates an `hours` look-back window: positive and representable.
pub fn parse_hours_filter(hours: Option<i64>) -> Result<Option<i64>, ApiError> {
    match hours {
        Some(h) if h <= 0 => Err(invalid_filter(format!(
            "hours must be a positive number, got {}",
            h
        ))),
        Some(h) if crate::services::monitor::lookback_cutoff(h).is_none() => Err(invalid_filter(
            format!("hours window of {} is out of range", h),
        )),
        other => Ok(other),
    }
}

/// Resolves page / per_page against the configured bounds and slices `items`.
pub fn paginate<T>(
    items: Vec<T>,
    page: Option<u64>,
    per_page: Option<u64>,
    default_per_page: u64,
    max_per_page: u64,
) -> PaginatedResponse<T> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page
        .unwrap_or(default_per_page)
        .clamp(1, max_per_page.max(1));
    let total = items.len() as u64;
    let offset = (page - 1).saturating_mul(per_page);
    let items = items
        .into_iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .collect();
    PaginatedResponse::new(items, total, page, per_page)
}
