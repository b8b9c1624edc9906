//! The credential store itself (spec.md §4.1)
//!
//! A coarse-grained `RwLock` around one `Inner` struct is acceptable per
//! spec.md §5: operations are O(accounts) at worst and pool sizes are small.
//! Reads clone the account record so callers never hold the lock across
//! await points in their own code.

use std::collections::HashMap;

use common::time::now_millis;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::account::{Account, AccountStatus, NewCredential};
use crate::error::{Error, Result};

/// Exponential backoff ceiling: cooldown saturates at 2^6 = 64x the base
/// duration (spec.md §4.1/§4.7).
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Outcome of [`AccountStore::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddResult {
    pub id: String,
    pub rank: usize,
    pub is_new: bool,
}

struct Inner {
    accounts: Vec<Account>,
    email_index: HashMap<String, usize>,
}

/// Owns every account record for the process lifetime.
pub struct AccountStore {
    inner: RwLock<Inner>,
    cooldown_base_ms: u64,
}

impl AccountStore {
    /// `cooldown_base_ms` is the configured base cooldown duration (spec.md
    /// §4.7; default 60000 when unset by the caller).
    pub fn new(cooldown_base_ms: u64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                accounts: Vec::new(),
                email_index: HashMap::new(),
            }),
            cooldown_base_ms,
        }
    }

    /// Add a credential, or update the existing account if the email is
    /// already known (spec.md §4.1 `add`). O(1) via the email index.
    pub async fn add(&self, credential: NewCredential) -> AddResult {
        let mut inner = self.inner.write().await;
        if let Some(&idx) = inner.email_index.get(&credential.email) {
            let account = &mut inner.accounts[idx];
            account.access_token = credential.access_token;
            account.refresh_token = credential.refresh_token;
            account.expiry = credential.expiry_date;
            if credential.project_id.is_some() {
                account.configured_project_id = credential.project_id;
            }
            account.status = AccountStatus::Ready;
            account.cooldown_until = None;
            account.error_count = 0;
            account.consecutive_errors = 0;
            info!(account_id = %account.id, email = %account.email, "updated existing account");
            return AddResult {
                id: account.id.clone(),
                rank: account.rank,
                is_new: false,
            };
        }

        let rank = inner.accounts.len() + 1;
        let email = credential.email.clone();
        let account = Account::new(rank, credential);
        let id = account.id.clone();
        inner.email_index.insert(email, inner.accounts.len());
        inner.accounts.push(account);
        info!(account_id = %id, rank, "added new account");
        AddResult {
            id,
            rank,
            is_new: true,
        }
    }

    /// Fetch a clone of one account by id.
    pub async fn get(&self, id: &str) -> Option<Account> {
        let inner = self.inner.read().await;
        inner.accounts.iter().find(|a| a.id == id).cloned()
    }

    /// All accounts in insertion order.
    pub async fn list(&self) -> Vec<Account> {
        self.inner.read().await.accounts.clone()
    }

    /// All account ids in insertion order.
    pub async fn list_ids(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .map(|a| a.id.clone())
            .collect()
    }

    /// Record a successful dispatch: resets error streak and clears cooldown
    /// (spec.md §4.1 `markSuccess`).
    pub async fn mark_success(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let account = find_mut(&mut inner.accounts, id)?;
        account.request_count += 1;
        account.last_used = Some(now_millis());
        account.consecutive_errors = 0;
        account.status = AccountStatus::Ready;
        account.cooldown_until = None;
        Ok(())
    }

    /// Record a rate-limit failure: schedules exponential-backoff cooldown
    /// (spec.md §4.1 `markCooldown`, §4.7 backoff schedule).
    pub async fn mark_cooldown(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let base_ms = self.cooldown_base_ms;
        let account = find_mut(&mut inner.accounts, id)?;
        account.consecutive_errors += 1;
        account.error_count += 1;
        let exponent = (account.consecutive_errors - 1).min(MAX_BACKOFF_EXPONENT);
        let duration_ms = base_ms.saturating_mul(1u64 << exponent);
        let until = now_millis() + duration_ms;
        account.status = AccountStatus::Cooldown;
        account.cooldown_until = Some(until);
        warn!(
            account_id = id,
            consecutive_errors = account.consecutive_errors,
            cooldown_ms = duration_ms,
            "account entering cooldown"
        );
        Ok(())
    }

    /// Record a non-recoverable auth failure (spec.md §4.1 `markError`).
    /// Does not schedule a recovery — the account stays `Error` until an
    /// operator-driven `add` refreshes its credential.
    pub async fn mark_error(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let account = find_mut(&mut inner.accounts, id)?;
        account.status = AccountStatus::Error;
        account.error_count += 1;
        warn!(account_id = id, "account marked error (auth failure)");
        Ok(())
    }

    /// Flip any account whose cooldown has elapsed back to `Ready`
    /// (spec.md §4.1 `expireCooldowns`).
    pub async fn expire_cooldowns(&self) {
        let mut inner = self.inner.write().await;
        let now = now_millis();
        for account in inner.accounts.iter_mut() {
            if account.status == AccountStatus::Cooldown {
                if let Some(until) = account.cooldown_until {
                    if now >= until {
                        account.status = AccountStatus::Ready;
                        account.cooldown_until = None;
                    }
                }
            }
        }
    }

    /// Ready accounts after lazily expiring cooldowns.
    pub async fn ready_accounts(&self) -> Vec<Account> {
        self.expire_cooldowns().await;
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .filter(|a| a.status == AccountStatus::Ready)
            .cloned()
            .collect()
    }

    /// Earliest cooldown-until timestamp across all cooling-down accounts,
    /// after lazy expiry (spec.md §4.1 `earliestCooldownEnd`).
    pub async fn earliest_cooldown_end(&self) -> Option<u64> {
        self.expire_cooldowns().await;
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .filter(|a| a.status == AccountStatus::Cooldown)
            .filter_map(|a| a.cooldown_until)
            .min()
    }

    /// Persist a discovered project id onto an account (spec.md §4.3 step 3).
    pub async fn set_discovered_project_id(&self, id: &str, project_id: String) -> Result<()> {
        let mut inner = self.inner.write().await;
        let account = find_mut(&mut inner.accounts, id)?;
        account.discovered_project_id = Some(project_id);
        Ok(())
    }

    /// Replace an account's tokens after a successful refresh (spec.md §4.2).
    pub async fn update_tokens(
        &self,
        id: &str,
        access_token: String,
        refresh_token: String,
        expiry: u64,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let account = find_mut(&mut inner.accounts, id)?;
        account.access_token = access_token;
        account.refresh_token = refresh_token;
        account.expiry = expiry;
        Ok(())
    }
}

fn find_mut<'a>(accounts: &'a mut [Account], id: &str) -> Result<&'a mut Account> {
    accounts
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| Error::NotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(email: &str) -> NewCredential {
        NewCredential {
            email: email.to_string(),
            access_token: format!("at_{email}"),
            refresh_token: format!("rt_{email}"),
            expiry_date: now_millis() + 3_600_000,
            project_id: None,
        }
    }

    #[tokio::test]
    async fn add_assigns_sequential_ranks() {
        let store = AccountStore::new(60_000);
        let a = store.add(credential("a@example.com")).await;
        let b = store.add(credential("b@example.com")).await;
        assert_eq!(a.id, "account-1");
        assert_eq!(b.id, "account-2");
        assert!(a.is_new && b.is_new);
    }

    #[tokio::test]
    async fn add_is_idempotent_on_email() {
        let store = AccountStore::new(60_000);
        let first = store.add(credential("dup@example.com")).await;
        let second = store.add(credential("dup@example.com")).await;
        assert_eq!(first.id, second.id);
        assert!(!second.is_new);
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn update_in_place_resets_errors_and_status() {
        let store = AccountStore::new(0);
        let added = store.add(credential("flaky@example.com")).await;
        store.mark_cooldown(&added.id).await.unwrap();
        let acct = store.get(&added.id).await.unwrap();
        assert_eq!(acct.status, AccountStatus::Cooldown);

        store.add(credential("flaky@example.com")).await;
        let acct = store.get(&added.id).await.unwrap();
        assert_eq!(acct.status, AccountStatus::Ready);
        assert_eq!(acct.consecutive_errors, 0);
        assert_eq!(acct.error_count, 0);
    }

    #[tokio::test]
    async fn mark_success_resets_consecutive_errors() {
        let store = AccountStore::new(60_000);
        let added = store.add(credential("a@example.com")).await;
        store.mark_cooldown(&added.id).await.unwrap();
        store.mark_cooldown(&added.id).await.unwrap();
        store.mark_success(&added.id).await.unwrap();

        let account = store.get(&added.id).await.unwrap();
        assert_eq!(account.status, AccountStatus::Ready);
        assert_eq!(account.consecutive_errors, 0);
        assert!(account.cooldown_until.is_none());
        assert_eq!(account.request_count, 1);
    }

    #[tokio::test]
    async fn cooldown_backoff_escalates_and_saturates() {
        let store = AccountStore::new(1000);
        let added = store.add(credential("a@example.com")).await;

        for expected_multiplier in [1u64, 2, 4, 8, 16, 32, 64, 64, 64] {
            store.mark_cooldown(&added.id).await.unwrap();
            let account = store.get(&added.id).await.unwrap();
            let until = account.cooldown_until.unwrap();
            let now = now_millis();
            let delta = until.saturating_sub(now);
            let expected = 1000 * expected_multiplier;
            assert!(
                delta.abs_diff(expected) < 50,
                "expected ~{expected}ms, got {delta}ms at k={}",
                account.consecutive_errors
            );
        }
    }

    #[tokio::test]
    async fn expire_cooldowns_flips_elapsed_accounts_to_ready() {
        let store = AccountStore::new(0);
        let added = store.add(credential("a@example.com")).await;
        store.mark_cooldown(&added.id).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let ready = store.ready_accounts().await;
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, added.id);
    }

    #[tokio::test]
    async fn ready_accounts_never_returns_cooling_or_error() {
        let store = AccountStore::new(3_600_000);
        let a = store.add(credential("a@example.com")).await;
        let b = store.add(credential("b@example.com")).await;
        let c = store.add(credential("c@example.com")).await;
        store.mark_cooldown(&a.id).await.unwrap();
        store.mark_error(&b.id).await.unwrap();

        let ready = store.ready_accounts().await;
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, c.id);
    }

    #[tokio::test]
    async fn mark_error_never_schedules_cooldown() {
        let store = AccountStore::new(60_000);
        let added = store.add(credential("a@example.com")).await;
        store.mark_error(&added.id).await.unwrap();
        let account = store.get(&added.id).await.unwrap();
        assert_eq!(account.status, AccountStatus::Error);
        assert!(account.cooldown_until.is_none());
    }

    #[tokio::test]
    async fn earliest_cooldown_end_reports_minimum() {
        let store = AccountStore::new(60_000);
        let a = store.add(credential("a@example.com")).await;
        let b = store.add(credential("b@example.com")).await;
        store.mark_cooldown(&a.id).await.unwrap();
        store.mark_cooldown(&b.id).await.unwrap();
        store.mark_cooldown(&b.id).await.unwrap(); // b backs off further

        let a_until = store.get(&a.id).await.unwrap().cooldown_until.unwrap();
        let earliest = store.earliest_cooldown_end().await.unwrap();
        assert_eq!(earliest, a_until);
    }

    #[tokio::test]
    async fn operations_on_unknown_id_error() {
        let store = AccountStore::new(60_000);
        assert!(store.mark_success("account-999").await.is_err());
        assert!(store.mark_cooldown("account-999").await.is_err());
        assert!(store.mark_error("account-999").await.is_err());
    }
}
