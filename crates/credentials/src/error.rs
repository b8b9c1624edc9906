//! Error types for credential store operations

/// Errors from credential store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account not found: {0}")]
    NotFound(String),
}

/// Result alias for credential store operations.
pub type Result<T> = std::result::Result<T, Error>;
