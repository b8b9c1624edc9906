//! Dispatcher (spec.md C7 / §4.6)
//!
//! Unifies the unary and stream dispatch paths: pick a ready account, resolve
//! its project, translate the request, and call the upstream transport,
//! retrying on 429 against the next account up to `max_retry_accounts`.

use std::sync::Arc;

use credentials::{Account, AccountStore};
use oauth::TokenRefresher;
use pool::{ProjectResolver, QuotaTracker, Selector};
use protocol::upstream::{UpstreamRequest, UpstreamResponse};
use transport::Transport;

use crate::error::{Error, Result};

pub struct Dispatcher {
    store: Arc<AccountStore>,
    refresher: Arc<TokenRefresher>,
    resolver: Arc<ProjectResolver>,
    quota: Arc<QuotaTracker>,
    transport: Arc<Transport>,
    max_retry_accounts: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<AccountStore>,
        refresher: Arc<TokenRefresher>,
        resolver: Arc<ProjectResolver>,
        quota: Arc<QuotaTracker>,
        transport: Arc<Transport>,
        max_retry_accounts: usize,
    ) -> Self {
        Self {
            store,
            refresher,
            resolver,
            quota,
            transport,
            max_retry_accounts,
        }
    }

    async fn attempts(&self) -> usize {
        let pool_size = self.store.list_ids().await.len();
        self.max_retry_accounts.min(pool_size)
    }

    /// Ceil-to-seconds delay until the soonest cooldown expires, or 60s if no
    /// account is in cooldown (spec.md §4.6).
    pub(crate) async fn retry_after_seconds(&self) -> u64 {
        match self.store.earliest_cooldown_end().await {
            Some(ts) => {
                let now = common::time::now_millis();
                if ts <= now {
                    1
                } else {
                    (ts - now).div_ceil(1000)
                }
            }
            None => 60,
        }
    }

    async fn pick(&self, model: Option<&str>) -> Option<Account> {
        Selector::new(&self.store, &self.quota).pick(model).await
    }

    async fn resolve_project(&self, account_id: &str) -> Result<String> {
        Ok(self
            .resolver
            .resolve(&self.store, &self.refresher, account_id)
            .await?)
    }

    /// Run the retry-with-failover loop up to `attempts`, calling `attempt`
    /// once per picked account. `attempt` returns `Ok(Err(()))` to signal a
    /// retryable 429 (cooldown already applied by the caller) and `Ok(Ok(t))`
    /// on success; any other error short-circuits the loop.
    async fn with_failover<T, F, Fut>(&self, model: Option<&str>, mut attempt: F) -> Result<T>
    where
        F: FnMut(Account, String) -> Fut,
        Fut: std::future::Future<Output = Result<std::result::Result<T, ()>>>,
    {
        let attempts = self.attempts().await;
        if attempts == 0 {
            return Err(Error::NoAccounts);
        }

        for _ in 0..attempts {
            let Some(account) = self.pick(model).await else {
                let retry_after = self.retry_after_seconds().await;
                return Err(Error::RateLimitExhausted { retry_after });
            };
            let project = self.resolve_project(&account.id).await?;
            match attempt(account, project).await? {
                Ok(value) => return Ok(value),
                Err(()) => continue,
            }
        }

        let retry_after = self.retry_after_seconds().await;
        Err(Error::RateLimitExhausted { retry_after })
    }

    /// Unary dispatch (spec.md §4.6): `build` translates the client request
    /// into the upstream envelope given a resolved project id.
    pub async fn unary(
        &self,
        model: Option<&str>,
        build: impl Fn(&str) -> protocol::Result<UpstreamRequest>,
    ) -> Result<UpstreamResponse> {
        self.with_failover(model, |account, project| {
            let build = &build;
            async move {
                let upstream_req = build(&project)?;
                let body = serde_json::to_value(&upstream_req)
                    .map_err(|e| Error::InvalidRequest(format!("request not serializable: {e}")))?;

                match self
                    .transport
                    .post_json(&self.store, &self.refresher, &account.id, ":generateContent", &body)
                    .await
                {
                    Ok(value) => {
                        let resp: UpstreamResponse = serde_json::from_value(value).map_err(|e| {
                            Error::Upstream {
                                status: 502,
                                body: format!("malformed upstream response: {e}"),
                            }
                        })?;
                        let _ = self.store.mark_success(&account.id).await;
                        Ok(Ok(resp))
                    }
                    Err(transport::Error::RateLimited) => {
                        let _ = self.store.mark_cooldown(&account.id).await;
                        Ok(Err(()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        })
        .await
    }

    /// Stream dispatch (spec.md §4.6): same account-selection and failover
    /// as [`Dispatcher::unary`], but returns the raw upstream response for
    /// the caller to drive through the SSE framer and a dialect's stream
    /// accumulator. Failover here is pre-header only (spec.md §4.6, §5
    /// "Streaming failover"): once this call returns, the caller owns the
    /// response body and no further retry happens.
    pub async fn stream(
        &self,
        model: Option<&str>,
        build: impl Fn(&str) -> protocol::Result<UpstreamRequest>,
    ) -> Result<(reqwest::Response, Account)> {
        self.with_failover(model, |account, project| {
            let build = &build;
            async move {
                let upstream_req = build(&project)?;
                let body = serde_json::to_value(&upstream_req)
                    .map_err(|e| Error::InvalidRequest(format!("request not serializable: {e}")))?;

                match self
                    .transport
                    .post_stream(
                        &self.store,
                        &self.refresher,
                        &account.id,
                        ":streamGenerateContent?alt=sse",
                        &body,
                    )
                    .await
                {
                    Ok(response) => {
                        let _ = self.store.mark_success(&account.id).await;
                        Ok(Ok((response, account)))
                    }
                    Err(transport::Error::RateLimited) => {
                        let _ = self.store.mark_cooldown(&account.id).await;
                        Ok(Err(()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credentials::NewCredential;

    fn dispatcher(store: Arc<AccountStore>, max_retry_accounts: usize) -> Dispatcher {
        let client = reqwest::Client::new();
        Dispatcher::new(
            store,
            Arc::new(TokenRefresher::new(client.clone(), "id".into(), "secret".into())),
            Arc::new(ProjectResolver::new("http://unused.invalid", client.clone())),
            Arc::new(QuotaTracker::new("http://unused.invalid", client.clone())),
            Arc::new(Transport::new(vec!["http://unused.invalid".into()])),
            max_retry_accounts,
        )
    }

    fn credential(email: &str) -> NewCredential {
        NewCredential {
            email: email.to_string(),
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expiry_date: common::time::now_millis() + 3_600_000,
            project_id: None,
        }
    }

    #[tokio::test]
    async fn retry_after_defaults_to_60_seconds_with_no_cooldowns() {
        let store = Arc::new(AccountStore::new(60_000));
        let dispatcher = dispatcher(store, 3);
        assert_eq!(dispatcher.retry_after_seconds().await, 60);
    }

    #[tokio::test]
    async fn retry_after_ceils_to_the_next_whole_second() {
        let store = Arc::new(AccountStore::new(60_000));
        let added = store.add(credential("a@example.com")).await;
        store.mark_cooldown(&added.id).await.unwrap();
        let dispatcher = dispatcher(store, 3);
        let retry_after = dispatcher.retry_after_seconds().await;
        assert!(retry_after >= 59 && retry_after <= 61, "got {retry_after}");
    }

    #[tokio::test]
    async fn attempts_are_capped_at_pool_size() {
        let store = Arc::new(AccountStore::new(60_000));
        store.add(credential("a@example.com")).await;
        store.add(credential("b@example.com")).await;
        let dispatcher = dispatcher(store, 10);
        assert_eq!(dispatcher.attempts().await, 2);
    }

    #[tokio::test]
    async fn unary_fails_fast_with_no_accounts_configured() {
        let store = Arc::new(AccountStore::new(60_000));
        let dispatcher = dispatcher(store, 3);
        let err = dispatcher
            .unary(None, |project| {
                Ok(UpstreamRequest::wrap(
                    "gemini-3-flash",
                    project,
                    Default::default(),
                ))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoAccounts));
    }
}
