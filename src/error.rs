use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ApiResponse;
use crate::validation::form::FieldErrors;

/// The generic message shown to clients for every server-side failure.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred.";

/// The message shown for every failed sign-in, whatever the cause.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The connection pool could not be built.
    #[error("Pool creation error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A storage call exceeded its deadline.
    #[error("Storage operation timed out")]
    StorageTimeout,

    /// Session data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operating system entropy source failed.
    #[error("Entropy source failure: {0}")]
    Entropy(String),

    /// A stored password hash does not have the expected shape.
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    /// The key derivation function rejected its input or parameters.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Field-level input errors.
    #[error("Invalid input!")]
    Validation(FieldErrors),

    /// The email is already registered.
    #[error("User with email: {0} already exists.")]
    DuplicateEmail(String),

    /// Unknown email or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The anti-forgery check failed.
    #[error("CSRF check failed: {0}")]
    CsrfRejected(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Whether this error belongs to the storage class (transient or
    /// data-integrity failures that the client cannot fix).
    pub fn is_storage(&self) -> bool {
        !matches!(
            self,
            AppError::Validation(_)
                | AppError::DuplicateEmail(_)
                | AppError::InvalidCredentials
                | AppError::CsrfRejected(_)
        )
    }

    /// The HTTP status this error renders with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateEmail(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::CsrfRejected(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body: ApiResponse<()> = match self {
            AppError::Validation(errors) => {
                tracing::debug!(?errors, "Validation error");
                ApiResponse::with_errors("Invalid input!", errors)
            }

            AppError::DuplicateEmail(ref email) => {
                tracing::debug!("Duplicate email: {}", email);
                let mut errors = FieldErrors::default();
                errors.add("email", self.to_string());
                ApiResponse::with_errors("Invalid input!", errors)
            }

            AppError::InvalidCredentials => {
                tracing::warn!("Authentication failed");
                ApiResponse::message(INVALID_CREDENTIALS_MESSAGE)
            }

            AppError::CsrfRejected(ref reason) => {
                tracing::warn!("CSRF check failed: {}", reason);
                ApiResponse::message("Forbidden")
            }

            ref e => {
                tracing::error!("Server error: {}", e);
                ApiResponse::message(GENERIC_ERROR_MESSAGE)
            }
        };

        (status, Json(body)).into_response()
    }
}
