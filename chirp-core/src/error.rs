use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("code invalid or expired")]
    InvalidOrExpired,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("sign-in cancelled: {0}")]
    Cancelled(String),
    #[error("identity provider error: {0}")]
    Upstream(String),
    #[error("mail error: {0}")]
    Mail(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}
