//! Error types for the upstream transport (spec.md §4.8, §7)

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("rate limited")]
    RateLimited,

    #[error("auth refresh failed: {0}")]
    AuthFailed(String),

    #[error("all base URLs failed: {0}")]
    BadGateway(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

impl From<credentials::Error> for Error {
    fn from(e: credentials::Error) -> Self {
        Error::NotFound(e.to_string())
    }
}

impl From<oauth::Error> for Error {
    fn from(e: oauth::Error) -> Self {
        match e {
            oauth::Error::NotFound(id) => Error::NotFound(id),
            other => Error::AuthFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
