//! Error types for project discovery and quota tracking

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Credential(#[from] credentials::Error),

    #[error(transparent)]
    Oauth(#[from] oauth::Error),

    #[error("project discovery failed: {0}")]
    Discovery(String),

    #[error("quota fetch failed: {0}")]
    Quota(String),
}

pub type Result<T> = std::result::Result<T, Error>;
