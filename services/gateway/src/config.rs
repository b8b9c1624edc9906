//! Environment-driven configuration (spec.md §6 "Configuration (environment)")

use common::Secret;
use credentials::NewCredential;
use serde::Deserialize;
use tracing::warn;

fn default_port() -> u16 {
    8080
}

fn default_cooldown_ms() -> u64 {
    60_000
}

fn default_max_retry_accounts() -> usize {
    3
}

/// One `ANTIGRAVITY_ACCOUNTS_<N>` entry, camelCase on the wire per spec.md §6.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEnvEntry {
    email: String,
    access_token: String,
    refresh_token: String,
    expiry_date: u64,
    #[serde(default)]
    project_id: Option<String>,
}

impl From<AccountEnvEntry> for NewCredential {
    fn from(e: AccountEnvEntry) -> Self {
        NewCredential {
            email: e.email,
            access_token: e.access_token,
            refresh_token: e.refresh_token,
            expiry_date: e.expiry_date,
            project_id: e.project_id,
        }
    }
}

pub struct Config {
    pub port: u16,
    pub proxy_api_key: Option<Secret<String>>,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub cooldown_duration_ms: u64,
    pub max_retry_accounts: usize,
    pub accounts: Vec<NewCredential>,
}

impl Config {
    /// Load configuration from the process environment. `ANTIGRAVITY_CLIENT_ID`
    /// and `ANTIGRAVITY_CLIENT_SECRET` are required; everything else has a
    /// default or is optional.
    pub fn from_env() -> common::Result<Self> {
        let port = env_or_default("PORT", default_port())?;
        let proxy_api_key = std::env::var("PROXY_API_KEY").ok().map(Secret::new);
        let client_id = require_env("ANTIGRAVITY_CLIENT_ID")?;
        let client_secret = Secret::new(require_env("ANTIGRAVITY_CLIENT_SECRET")?);
        let cooldown_duration_ms = env_or_default("COOLDOWN_DURATION_MS", default_cooldown_ms())?;
        let max_retry_accounts = env_or_default("MAX_RETRY_ACCOUNTS", default_max_retry_accounts())?;
        let accounts = load_accounts();

        Ok(Self {
            port,
            proxy_api_key,
            client_id,
            client_secret,
            cooldown_duration_ms,
            max_retry_accounts,
            accounts,
        })
    }
}

fn require_env(name: &str) -> common::Result<String> {
    std::env::var(name).map_err(|_| common::Error::Config(format!("missing required env var {name}")))
}

fn env_or_default<T>(name: &str, default: T) -> common::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| common::Error::Config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Read `ANTIGRAVITY_ACCOUNTS_<N>` starting at N=1, stopping at the first gap.
/// A present-but-unparsable entry is skipped with a warning; N keeps advancing.
fn load_accounts() -> Vec<NewCredential> {
    let mut accounts = Vec::new();
    let mut n = 1;
    loop {
        let key = format!("ANTIGRAVITY_ACCOUNTS_{n}");
        let Ok(raw) = std::env::var(&key) else {
            break;
        };
        match serde_json::from_str::<AccountEnvEntry>(&raw) {
            Ok(entry) => accounts.push(entry.into()),
            Err(e) => warn!(var = %key, error = %e, "skipping malformed account entry"),
        }
        n += 1;
    }
    accounts
}
