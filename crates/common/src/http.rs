//! Shared HTTP client construction
//!
//! Every crate that talks to the upstream or to an OAuth endpoint builds its
//! client through here so the `User-Agent` and connection defaults stay
//! consistent with spec.md §4.8's fixed-header requirement.

use std::time::Duration;

/// `User-Agent` sent on every upstream request (spec.md §4.8).
pub const USER_AGENT: &str = "antigravity-gateway/1.0";

/// Build the shared reqwest client used for upstream + OAuth calls.
///
/// `timeout` bounds a single request attempt. Streaming callers should use
/// [`build_client_unbounded`] instead, since the transport is only meant to
/// bound the time-to-first-byte, not the lifetime of an SSE body (spec.md
/// §4.8 point 6 and §5 "Timeouts").
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .expect("reqwest client configuration is static and always valid")
}

/// Build a client with no whole-request timeout, for streaming upstream calls
/// where only headers (not the body) should be bounded in time.
pub fn build_client_unbounded() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .expect("reqwest client configuration is static and always valid")
}
