//! Account record (spec.md §3 "Account")

use serde::Deserialize;

/// Runtime status of an account.
///
/// `Cooldown` carries no data of its own — `cooldown_until` on [`Account`]
/// is the timestamp, and the invariant `status == Cooldown ⇔ cooldown_until`
/// is set and in the future is enforced by [`crate::AccountStore`], not by
/// this type, since lazy expiry needs the current time to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Ready,
    Cooldown,
    Error,
}

impl AccountStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AccountStatus::Ready => "ready",
            AccountStatus::Cooldown => "cooldown",
            AccountStatus::Error => "error",
        }
    }
}

/// A credential as supplied by configuration or the OAuth callback, before
/// it is assigned a stable account id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCredential {
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix milliseconds.
    pub expiry_date: u64,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// One upstream account (spec.md §3 "Account").
///
/// Ids are stable and 1-based (`account-1`, `account-2`, ...), assigned by
/// insertion rank and never reused or renumbered.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub rank: usize,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix milliseconds.
    pub expiry: u64,
    pub configured_project_id: Option<String>,
    pub discovered_project_id: Option<String>,
    pub status: AccountStatus,
    /// Unix milliseconds; set only while `status == Cooldown`.
    pub cooldown_until: Option<u64>,
    pub request_count: u64,
    pub error_count: u64,
    pub consecutive_errors: u32,
    /// Unix milliseconds of the last successful dispatch, if any.
    pub last_used: Option<u64>,
}

impl Account {
    pub(crate) fn new(rank: usize, credential: NewCredential) -> Self {
        Self {
            id: format!("account-{rank}"),
            rank,
            email: credential.email,
            access_token: credential.access_token,
            refresh_token: credential.refresh_token,
            expiry: credential.expiry_date,
            configured_project_id: credential.project_id,
            discovered_project_id: None,
            status: AccountStatus::Ready,
            cooldown_until: None,
            request_count: 0,
            error_count: 0,
            consecutive_errors: 0,
            last_used: None,
        }
    }

    /// The project id a caller should use: configured takes priority over
    /// discovered (spec.md §4.3 steps 1-2).
    pub fn project_id(&self) -> Option<&str> {
        self.configured_project_id
            .as_deref()
            .or(self.discovered_project_id.as_deref())
    }
}
