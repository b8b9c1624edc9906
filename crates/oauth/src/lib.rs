//! Upstream OAuth token refresh (spec.md C2)
//!
//! Accounts authenticate to the upstream with a Google-style OAuth2
//! `refresh_token` grant. This crate only ever presents a refresh token at
//! the token endpoint — the interactive authorization-code / PKCE flow that
//! produces the first refresh token is out of scope (spec.md §1 Non-goals).

mod constants;
mod error;
mod refresher;
mod token;

pub use constants::{REFRESH_BUFFER, TOKEN_ENDPOINT};
pub use error::{Error, Result};
pub use refresher::TokenRefresher;
pub use token::{refresh_token, TokenResponse};
