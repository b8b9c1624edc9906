//! Error kinds surfaced by the dispatcher (spec.md §7)

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no ready accounts; retry after {retry_after}s")]
    RateLimitExhausted { retry_after: u64 },

    #[error("account authentication failed: {0}")]
    AuthRefreshFailed(String),

    #[error("no accounts configured")]
    NoAccounts,

    #[error("all upstream base URLs failed: {0}")]
    BadGateway(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<pool::Error> for Error {
    fn from(e: pool::Error) -> Self {
        match e {
            pool::Error::NotFound(id) => Error::AuthRefreshFailed(format!("unknown account {id}")),
            pool::Error::Oauth(oe) => Error::AuthRefreshFailed(oe.to_string()),
            other => Error::AuthRefreshFailed(other.to_string()),
        }
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        match e {
            transport::Error::RateLimited => {
                unreachable!("RateLimited is handled by the dispatch retry loop before conversion")
            }
            transport::Error::NotFound(id) => Error::AuthRefreshFailed(format!("unknown account {id}")),
            transport::Error::AuthFailed(msg) => Error::AuthRefreshFailed(msg),
            transport::Error::BadGateway(msg) => Error::BadGateway(msg),
            transport::Error::Upstream { status, body } => Error::Upstream { status, body },
        }
    }
}

impl From<protocol::Error> for Error {
    fn from(e: protocol::Error) -> Self {
        Error::InvalidRequest(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
