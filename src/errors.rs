use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use utoipa::ToSchema;

/// Structured context attached to validation and conflict errors.
pub type ErrorDetails = Map<String, Value>;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Attached to error responses so middleware can see what failed without
/// re-parsing the body.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

fn error_response(status: StatusCode, body: ErrorResponse) -> Response {
    let info = ErrorInfo {
        code: body.code.clone(),
        message: body.message.clone(),
    };
    let mut response = (status, Json(body)).into_response();
    response.extensions_mut().insert(info);
    response
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "code": "validation_error",
    "message": "Validation error: Cannot delete order PO000001 with status SUBMITTED",
    "details": { "document_number": "PO000001", "current_status": "SUBMITTED" },
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Structured error context (unknown items, offending status, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        details: ErrorDetails,
    },

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        details: ErrorDetails,
    },

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        details: ErrorDetails,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let fields: Vec<Value> = err
            .field_errors()
            .keys()
            .map(|field| Value::String(field.to_string()))
            .collect();
        ServiceError::validation(err.to_string()).with_detail("fields", Value::Array(fields))
    }
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Attaches a detail entry. No-op for variants that carry no details.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(details) = self.details_mut() {
            details.insert(key.to_string(), value.into());
        }
        self
    }

    fn details_mut(&mut self) -> Option<&mut ErrorDetails> {
        match self {
            Self::NotFound { details, .. }
            | Self::ValidationError { details, .. }
            | Self::Conflict { details, .. } => Some(details),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Self::NotFound { details, .. }
            | Self::ValidationError { details, .. }
            | Self::Conflict { details, .. } => Some(details),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ValidationError { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InternalError(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ValidationError { .. } => "validation_error",
            Self::Conflict { .. } => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return a generic message.
    pub fn response_message(&self) -> String {
        match self {
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        let status = self.status_code();
        ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.error_code().to_string(),
            message: self.response_message(),
            details: self
                .details()
                .filter(|details| !details.is_empty())
                .map(|details| Value::Object(details.clone())),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed with internal error");
        }
        error_response(self.status_code(), self.to_error_response())
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        error_code: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let service_error = match self {
            ApiError::ServiceError(err) => err,
            ApiError::ValidationError(msg) => ServiceError::validation(msg),
            ApiError::NotFound(msg) => ServiceError::not_found(msg),
            ApiError::BadRequest {
                message,
                error_code,
            } => {
                let mut response = ServiceError::BadRequest(message).to_error_response();
                if let Some(code) = error_code {
                    response.code = code;
                }
                return error_response(StatusCode::BAD_REQUEST, response);
            }
        };
        service_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
