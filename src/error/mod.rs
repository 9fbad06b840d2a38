use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::error::Error as StdError;
use sqlx::error::Error as SqlxError;

#[derive(Debug)]
pub enum AppError {
    Database(String),
    Internal(String),
    Auth(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Configuration(String),
    Validation(String),
    External(String),
    Locked(String),
    TooManyRequests(String),
    WeakPassword(Vec<String>),
    MustChangePassword(String),
    PasswordChangeRequired(String),
    Maintenance(String),
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    code: u16,
    message: String,
    error_type: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::Auth(e) => write!(f, "Authentication error: {}", e),
            AppError::Forbidden(e) => write!(f, "Forbidden: {}", e),
            AppError::NotFound(e) => write!(f, "Not found: {}", e),
            AppError::BadRequest(e) => write!(f, "Bad request: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Validation(e) => write!(f, "Validation error: {}", e),
            AppError::External(e) => write!(f, "External service error: {}", e),
            AppError::Locked(e) => write!(f, "Account locked: {}", e),
            AppError::TooManyRequests(e) => write!(f, "Too many requests: {}", e),
            AppError::WeakPassword(reasons) => {
                write!(f, "Password does not meet requirements: {}", reasons.join("; "))
            }
            AppError::MustChangePassword(e) => write!(f, "Password change required: {}", e),
            AppError::PasswordChangeRequired(e) => write!(f, "Password change required: {}", e),
            AppError::Maintenance(e) => write!(f, "Service unavailable: {}", e),
        }
    }
}

impl StdError for AppError {}

// Sign-in era clients depend on status 355 for "password change required",
// while the refresh path answers 422 for the same condition. The split is kept
// as-is: MustChangePassword is the 355 contract, PasswordChangeRequired the
// 422 one. Do not unify without coordinating a client migration.
fn must_change_password_status() -> StatusCode {
    StatusCode::from_u16(355).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY)
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_type) = match self {
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::Auth(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "authorization_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::External(_) => (StatusCode::BAD_GATEWAY, "external_service_error"),
            AppError::Locked(_) => (StatusCode::LOCKED, "account_locked"),
            AppError::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AppError::WeakPassword(_) => (StatusCode::BAD_REQUEST, "password_policy"),
            AppError::MustChangePassword(_) => {
                (must_change_password_status(), "password_change_required")
            }
            AppError::PasswordChangeRequired(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "password_change_required")
            }
            AppError::Maintenance(_) => (StatusCode::SERVICE_UNAVAILABLE, "maintenance"),
        };

        let error_response = ErrorResponse {
            code: status_code.as_u16(),
            message: self.to_string(),
            error_type: error_type.to_string(),
        };

        HttpResponse::build(status_code).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::External(_) => StatusCode::BAD_GATEWAY,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::WeakPassword(_) => StatusCode::BAD_REQUEST,
            AppError::MustChangePassword(_) => must_change_password_status(),
            AppError::PasswordChangeRequired(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Maintenance(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::NotFound("Record not found".to_string()),
            _ => AppError::Database(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON deserialization/serialization error: {}", error))
    }
}

// Security state lives in the shared store; a failed store call must surface
// as an error, never as a silent admit.
impl From<redis::RedisError> for AppError {
    fn from(error: redis::RedisError) -> Self {
        AppError::Internal(format!("Security store error: {}", error))
    }
}

// Define AppResult type alias for Result<T, AppError>
pub type AppResult<T> = Result<T, AppError>;
