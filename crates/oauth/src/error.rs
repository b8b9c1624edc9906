//! Error types for OAuth token refresh

/// Errors from refreshing an upstream account's access token.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("token refresh request failed: {0}")]
    Http(String),

    #[error("refresh token rejected: {0}")]
    InvalidCredentials(String),

    #[error("token endpoint returned an unreadable response: {0}")]
    TokenResponse(String),
}

/// Result alias for OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
