//! Single-flight token refresh (spec.md §4.2, §9 "Per-account single-flight")
//!
//! A refresh for one account must not run twice concurrently; a second
//! caller racing the first must observe the first's result instead of
//! spending another refresh against the upstream token endpoint. We take a
//! per-account `tokio::sync::Mutex` from a lazily-populated map and
//! double-check freshness after acquiring it, the way the teacher's
//! background refresh cycle re-checks expiry rather than trusting a stale
//! read.

use std::collections::HashMap;
use std::sync::Arc;

use common::time::now_millis;
use credentials::{Account, AccountStore};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::constants::REFRESH_BUFFER;
use crate::error::{Error, Result};
use crate::token::refresh_token;

pub struct TokenRefresher {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenRefresher {
    pub fn new(client: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, account_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return an account with a usable access token, refreshing it first if
    /// it is within [`REFRESH_BUFFER`] of expiry.
    pub async fn ensure_fresh(&self, store: &AccountStore, account_id: &str) -> Result<Account> {
        let account = store
            .get(account_id)
            .await
            .ok_or_else(|| Error::NotFound(account_id.to_string()))?;
        if !needs_refresh(&account) {
            return Ok(account);
        }

        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        // Re-check: the caller that held the lock before us may have already
        // refreshed this account's token.
        let account = store
            .get(account_id)
            .await
            .ok_or_else(|| Error::NotFound(account_id.to_string()))?;
        if !needs_refresh(&account) {
            return Ok(account);
        }

        self.do_refresh(store, account_id, account).await
    }

    /// Refresh unconditionally, regardless of the cached expiry. Used when a
    /// caller has independent evidence the access token is already invalid
    /// (an upstream 401) rather than merely close to expiring (spec.md
    /// §4.8 point 4).
    pub async fn force_refresh(&self, store: &AccountStore, account_id: &str) -> Result<Account> {
        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        let account = store
            .get(account_id)
            .await
            .ok_or_else(|| Error::NotFound(account_id.to_string()))?;
        self.do_refresh(store, account_id, account).await
    }

    async fn do_refresh(
        &self,
        store: &AccountStore,
        account_id: &str,
        account: Account,
    ) -> Result<Account> {
        match refresh_token(
            &self.client,
            &self.client_id,
            &self.client_secret,
            &account.refresh_token,
        )
        .await
        {
            Ok(response) => {
                let refresh_token = response.refresh_token.unwrap_or(account.refresh_token);
                let expiry = now_millis() + response.expires_in * 1000;
                store
                    .update_tokens(account_id, response.access_token.clone(), refresh_token.clone(), expiry)
                    .await
                    .map_err(|e| Error::NotFound(e.to_string()))?;
                info!(account_id, "refreshed access token");
                Ok(Account {
                    access_token: response.access_token,
                    refresh_token,
                    expiry,
                    ..account
                })
            }
            Err(Error::InvalidCredentials(msg)) => {
                warn!(account_id, "refresh token rejected, marking account error");
                let _ = store.mark_error(account_id).await;
                Err(Error::InvalidCredentials(msg))
            }
            Err(e) => Err(e),
        }
    }
}

fn needs_refresh(account: &Account) -> bool {
    now_millis() + REFRESH_BUFFER.as_millis() as u64 >= account.expiry
}

#[cfg(test)]
mod tests {
    use super::*;
    use credentials::NewCredential;

    fn fresh_credential(email: &str, expiry_offset_ms: i64) -> NewCredential {
        NewCredential {
            email: email.to_string(),
            access_token: "old_at".into(),
            refresh_token: "old_rt".into(),
            expiry_date: (now_millis() as i64 + expiry_offset_ms) as u64,
            project_id: None,
        }
    }

    #[tokio::test]
    async fn needs_refresh_true_within_buffer() {
        let store = AccountStore::new(60_000);
        let added = store.add(fresh_credential("a@example.com", 60_000)).await;
        let account = store.get(&added.id).await.unwrap();
        assert!(needs_refresh(&account));
    }

    #[tokio::test]
    async fn needs_refresh_false_when_far_from_expiry() {
        let store = AccountStore::new(60_000);
        let added = store
            .add(fresh_credential("a@example.com", 3_600_000))
            .await;
        let account = store.get(&added.id).await.unwrap();
        assert!(!needs_refresh(&account));
    }

    #[tokio::test]
    async fn ensure_fresh_skips_refresh_when_token_is_fresh() {
        let store = AccountStore::new(60_000);
        let added = store
            .add(fresh_credential("a@example.com", 3_600_000))
            .await;
        let refresher = TokenRefresher::new(reqwest::Client::new(), "id".into(), "secret".into());
        let account = refresher.ensure_fresh(&store, &added.id).await.unwrap();
        assert_eq!(account.access_token, "old_at");
    }

    #[tokio::test]
    async fn ensure_fresh_errors_on_unknown_account() {
        let store = AccountStore::new(60_000);
        let refresher = TokenRefresher::new(reqwest::Client::new(), "id".into(), "secret".into());
        let result = refresher.ensure_fresh(&store, "account-404").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
