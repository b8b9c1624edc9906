//! Unix-millisecond time helpers
//!
//! The account/quota/cooldown data model (spec.md §3) stores all timestamps
//! as unix milliseconds rather than `Instant`, since accounts are compared
//! against wall-clock expiry values returned by the upstream OAuth and quota
//! endpoints.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as unix milliseconds since epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current time as unix seconds since epoch.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}
