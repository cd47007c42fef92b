/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. `ApiError` maps onto the HTTP status
/// and renders the uniform body:
///
/// ```json
/// { "error": "not_found", "message": "User not found" }
/// ```
///
/// with `details` for validation failures and `existing_partition` for
/// rejected duplicate uploads.
///
/// # Example
///
/// ```
/// use solfa_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(id: &str) -> ApiResult<Json<serde_json::Value>> {
///     let id: i64 = id
///         .parse()
///         .map_err(|_| ApiError::NotFound("User not found".to_string()))?;
///     Ok(Json(json!({ "id": id })))
/// }
/// ```

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use solfa_shared::{
    auth::{jwt::JwtError, middleware::AuthError, password::PasswordError},
    models::StoreError,
    partitions::WorkflowError,
    search::SearchHit,
};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. email already registered
    Conflict(String),

    /// Rejected duplicate upload (409), carrying the matching partition
    Duplicate {
        message: String,
        existing: SearchHit,
    },

    /// Request body over the configured limit (413)
    PayloadTooLarge(String),

    /// Field validation failed (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    /// The already indexed partition a duplicate upload matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_partition: Option<SearchHit>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Duplicate { message, existing } => {
                write!(f, "Duplicate of {}: {}", existing.id, message)
            }
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = ErrorResponse {
            error: String::new(),
            message: String::new(),
            details: None,
            existing_partition: None,
        };

        let status = match self {
            ApiError::BadRequest(msg) => {
                body.error = "bad_request".to_string();
                body.message = msg;
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(msg) => {
                body.error = "unauthorized".to_string();
                body.message = msg;
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotFound(msg) => {
                body.error = "not_found".to_string();
                body.message = msg;
                StatusCode::NOT_FOUND
            }
            ApiError::Conflict(msg) => {
                body.error = "conflict".to_string();
                body.message = msg;
                StatusCode::CONFLICT
            }
            ApiError::Duplicate { message, existing } => {
                body.error = "duplicate_partition".to_string();
                body.message = message;
                body.existing_partition = Some(existing);
                StatusCode::CONFLICT
            }
            ApiError::PayloadTooLarge(msg) => {
                body.error = "payload_too_large".to_string();
                body.message = msg;
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::ValidationError(errors) => {
                body.error = "validation_error".to_string();
                body.message = "Request validation failed".to_string();
                body.details = Some(errors);
                StatusCode::BAD_REQUEST
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                body.error = "internal_error".to_string();
                body.message = "An internal error occurred".to_string();
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) if constraint.contains("email") => {
                ApiError::Conflict("Email already in use".to_string())
            }
            StoreError::Conflict(constraint) => {
                ApiError::Conflict(format!("Constraint violation: {}", constraint))
            }
            StoreError::Database(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ApiError::Unauthorized("Missing token".to_string()),
            AuthError::InvalidToken(_) => {
                ApiError::Unauthorized("Invalid or expired token".to_string())
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::InvalidInput(msg) => ApiError::BadRequest(msg),
            WorkflowError::Duplicate { existing } => ApiError::Duplicate {
                message: "A similar partition already exists".to_string(),
                existing,
            },
            WorkflowError::NotFound(_) => ApiError::NotFound("Partition not found".to_string()),
            WorkflowError::Store(e) => e.into(),
            WorkflowError::Storage(e) => ApiError::InternalError(format!("Object storage: {}", e)),
            WorkflowError::Search(e) => ApiError::InternalError(format!("Search: {}", e)),
            WorkflowError::Index(e) => ApiError::InternalError(format!("Index update: {}", e)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        // Reading past DefaultBodyLimit surfaces here, mid-stream
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge(err.body_text());
        }
        ApiError::BadRequest(err.body_text())
    }
}
