// HTTP API Error Types
use axum::{extract::multipart::MultipartError, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::StoreError;
use crate::services::media_service::MediaError;
use crate::services::user_service::UpdateRejection;
use crate::uploads::UploadError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest { message: String, code: &'static str },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden { message: String, code: &'static str },

    // 404 Not Found
    NotFound(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden { .. } => 403,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. } => code,
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden { code, .. } => code,
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            code: "BAD_REQUEST",
        }
    }

    pub fn bad_request_with_code(message: impl Into<String>, code: &'static str) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            code,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            code: "FORBIDDEN",
        }
    }

    pub fn forbidden_with_code(message: impl Into<String>, code: &'static str) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::not_found(msg),
            StoreError::Conflict(msg) => ApiError::bad_request(msg),
            StoreError::InvalidRecord(msg) => {
                tracing::error!("Invalid stored record: {}", msg);
                ApiError::internal_server_error("Stored record is invalid")
            }
            StoreError::ConnectionError(msg) => {
                tracing::error!("Store connection error: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<UpdateRejection> for ApiError {
    fn from(rejection: UpdateRejection) -> Self {
        let message = rejection.to_string();
        match rejection {
            UpdateRejection::InvalidRole(_) => ApiError::bad_request_with_code(message, "INVALID_ROLE"),
            UpdateRejection::SelfRoleChange => ApiError::forbidden_with_code(message, "SELF_ROLE_CHANGE"),
            UpdateRejection::InvalidEmail => ApiError::bad_request_with_code(message, "INVALID_EMAIL"),
            UpdateRejection::DuplicateEmail => ApiError::bad_request_with_code(message, "DUPLICATE_EMAIL"),
            UpdateRejection::InsufficientPrivilege => {
                ApiError::forbidden_with_code(message, "INSUFFICIENT_PRIVILEGE")
            }
            UpdateRejection::RoleOrUidChange => ApiError::forbidden_with_code(message, "ROLE_CHANGE_FORBIDDEN"),
            UpdateRejection::InvalidPreviousPassword => {
                ApiError::bad_request_with_code(message, "INVALID_PREVIOUS_PASSWORD")
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        let message = err.to_string();
        match err {
            MediaError::NotFound(msg) => ApiError::not_found(msg),
            MediaError::InvalidName(msg) | MediaError::InvalidCourse(msg) => ApiError::bad_request(msg),
            MediaError::RootDeletion => ApiError::bad_request_with_code(message, "ROOT_DIRECTORY"),
            MediaError::Store(e) => e.into(),
            MediaError::Upload(e) => e.into(),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        match err {
            UploadError::UnsupportedFormat(_) | UploadError::InvalidImage(_) => {
                ApiError::bad_request_with_code(message, "INVALID_UPLOAD")
            }
            UploadError::Task(msg) => {
                tracing::error!("Upload task failed: {}", msg);
                ApiError::internal_server_error("Failed to process upload")
            }
            UploadError::Io(e) => {
                tracing::error!("Upload I/O error: {}", e);
                ApiError::internal_server_error("Failed to store upload")
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large(err.body_text())
        } else {
            ApiError::bad_request(format!("Invalid multipart upload: {}", err.body_text()))
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_do_not_leak_details() {
        let err: ApiError = StoreError::InvalidRecord("user 1 has unknown role 'x'".to_string()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("unknown role"));

        let err: ApiError = StoreError::NotFound("user 1".to_string()).into();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn body_carries_code() {
        let err = ApiError::forbidden_with_code("nope", "SELF_ROLE_CHANGE");
        assert_eq!(err.to_json()["code"], json!("SELF_ROLE_CHANGE"));
        assert_eq!(err.to_json()["error"], json!(true));
    }
}
