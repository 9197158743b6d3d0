/// Unified error types for the account service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single offending request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed request body, one entry per offending field
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// Required login field was empty or absent
    #[error("The {0} field is missing")]
    MissingField(&'static str),

    /// Path identifier is not an integer
    #[error("The user identifier is not valid")]
    InvalidId,

    /// Resource absent
    #[error("{0} does not exist")]
    NotFound(String),

    /// Authentication failed; never says which part was wrong
    #[error("Username or password is wrong")]
    InvalidCredentials,

    /// Valid credentials on an account that has not confirmed its email
    #[error("Please verify your email before login")]
    EmailNotVerified,

    /// Resend requested for a verified account
    #[error("You have already confirmed your email")]
    AlreadyVerified,

    /// Confirmation attempted for a verified account
    #[error("Account already confirmed")]
    AlreadyConfirmed,

    /// Username or email already taken
    #[error("A user with that username or email already exists")]
    DuplicateAccount,

    /// Malformed, forged, expired or wrong-purpose token
    #[error("The token is invalid or has expired")]
    InvalidToken,

    /// Missing or invalid bearer token on a protected route
    #[error("Authorization required: {0}")]
    Unauthorized(String),

    /// Current password did not match during a password change
    #[error("Current password is incorrect")]
    IncorrectPassword,

    /// No account registered with the given email
    #[error("The user is not registered in the system")]
    UnknownEmail,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    /// HTTP status and stable error code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            ApiError::MissingField(_) => (StatusCode::BAD_REQUEST, "MissingField"),
            ApiError::InvalidId => (StatusCode::BAD_REQUEST, "InvalidId"),
            ApiError::InvalidToken => (StatusCode::BAD_REQUEST, "InvalidToken"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::IncorrectPassword => (StatusCode::UNAUTHORIZED, "IncorrectPassword"),
            ApiError::EmailNotVerified => (StatusCode::FORBIDDEN, "EmailNotVerified"),
            ApiError::AlreadyVerified => (StatusCode::FORBIDDEN, "AlreadyVerified"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::UnknownEmail => (StatusCode::NOT_FOUND, "UnknownEmail"),
            // Login failures are reported as not-found, like the clients expect
            ApiError::InvalidCredentials => (StatusCode::NOT_FOUND, "InvalidCredentials"),
            ApiError::AlreadyConfirmed => (StatusCode::CONFLICT, "AlreadyConfirmed"),
            ApiError::DuplicateAccount => (StatusCode::CONFLICT, "DuplicateAccount"),
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        let fields = match self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            fields,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type ApiResult<T> = Result<T, ApiError>;
