//! Fixed OAuth endpoint constants (spec.md §6 "Configuration")

use std::time::Duration;

pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// An access token is refreshed once it is within this much of expiry
/// (spec.md §4.2).
pub const REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);
