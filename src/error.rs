use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by an `AccountRepository`.
///
/// The duplicate variants are produced by the store's own uniqueness constraints, so they can
/// surface even after the service's pre-checks passed (two concurrent registrations).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("username is already taken")]
    DuplicateUsername,

    #[error("email is already in use")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failures of the bcrypt work offloaded to the blocking pool.
#[derive(Debug, Error)]
pub enum HashingError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("blocking hash task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of a failed registration.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Username is already taken!")]
    DuplicateUsername,

    #[error("Email is already in use!")]
    DuplicateEmail,

    #[error("password hashing failed: {0}")]
    Hashing(#[from] HashingError),

    #[error("credential store failure: {0}")]
    Store(#[source] RepositoryError),
}

impl CredentialError {
    /// Business-rule conflicts are re-displayed on the form; everything else is fatal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateUsername | Self::DuplicateEmail)
    }
}

impl From<RepositoryError> for CredentialError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateUsername => Self::DuplicateUsername,
            RepositoryError::DuplicateEmail => Self::DuplicateEmail,
            other => Self::Store(other),
        }
    }
}

/// Failures of the login / session mechanism.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no account with username {0:?}")]
    PrincipalNotFound(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid session: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),

    #[error("password verification failed: {0}")]
    Hashing(#[from] HashingError),

    #[error("credential store failure: {0}")]
    Store(#[from] RepositoryError),
}

impl AuthError {
    /// True for every failure the login form reports with the generic message.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::PrincipalNotFound(_) | Self::InvalidCredentials)
    }
}

/// AppError
///
/// Fatal request-level error. Rendered as a JSON body carrying a generic message; the detail
/// is logged, never sent to the client.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "request failed: {}", self.message);
        }

        let body = Json(json!({
            "error": self.status.canonical_reason().unwrap_or("Error"),
        }));

        (self.status, body).into_response()
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::internal(err.to_string())
    }
}
