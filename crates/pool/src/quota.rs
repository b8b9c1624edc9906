//! Quota Tracker (spec.md C4 / §4.4)

use std::collections::HashMap;
use std::time::Duration;

use common::time::now_millis;
use credentials::AccountStore;
use oauth::TokenRefresher;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default exhaustion threshold (spec.md §3 "Quota cache entry"): a
/// remaining-fraction at or below this is `exhausted`, not merely low.
const EXHAUSTED_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    Available,
    Exhausted,
}

#[derive(Debug, Clone)]
struct ModelQuota {
    remaining_fraction: f64,
    reset_time: Option<String>,
    last_fetched_at: u64,
}

impl ModelQuota {
    fn status(&self) -> QuotaStatus {
        if self.remaining_fraction > EXHAUSTED_THRESHOLD {
            QuotaStatus::Available
        } else {
            QuotaStatus::Exhausted
        }
    }
}

/// One row of a quota dashboard snapshot (spec.md §4.4 "Reads").
#[derive(Debug, Clone)]
pub struct ModelQuotaView {
    pub model_name: String,
    pub remaining_fraction: f64,
    pub reset_time: Option<String>,
    pub status: QuotaStatus,
}

#[derive(Debug, Deserialize)]
struct QuotaInfo {
    #[serde(rename = "remainingFraction")]
    remaining_fraction: f64,
    #[serde(rename = "resetTime", default)]
    reset_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(rename = "quotaInfo", default)]
    quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
struct FetchAvailableModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

pub struct QuotaTracker {
    base_url: String,
    client: reqwest::Client,
    quotas: RwLock<HashMap<String, HashMap<String, ModelQuota>>>,
}

impl QuotaTracker {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            quotas: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch and upsert quota for one account (spec.md §4.4, first paragraph).
    pub async fn refresh(
        &self,
        store: &AccountStore,
        refresher: &TokenRefresher,
        account_id: &str,
    ) -> Result<()> {
        let account = refresher.ensure_fresh(store, account_id).await?;
        let project = account.project_id().unwrap_or("").to_string();

        let url = format!("{}/:fetchAvailableModels", self.base_url);
        let response: FetchAvailableModelsResponse = self
            .client
            .post(&url)
            .bearer_auth(&account.access_token)
            .timeout(FETCH_TIMEOUT)
            .json(&json!({ "project": project }))
            .send()
            .await
            .map_err(|e| Error::Quota(format!("fetchAvailableModels request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Quota(format!("fetchAvailableModels returned error: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Quota(format!("fetchAvailableModels response unreadable: {e}")))?;

        let now = now_millis();
        let mut quotas = self.quotas.write().await;
        let account_quotas = quotas.entry(account_id.to_string()).or_default();
        for model in response.models {
            let Some(info) = model.quota_info else {
                continue;
            };
            account_quotas.insert(
                model.name,
                ModelQuota {
                    remaining_fraction: info.remaining_fraction,
                    reset_time: info.reset_time,
                    last_fetched_at: now,
                },
            );
        }
        Ok(())
    }

    /// Fan out a refresh across all given accounts concurrently, ignoring
    /// individual failures (spec.md §4.4, last paragraph: "fan-out, gather
    /// all results, ignore individual failures").
    pub async fn refresh_all(
        &self,
        store: &AccountStore,
        refresher: &TokenRefresher,
        account_ids: &[String],
    ) {
        let futures = account_ids
            .iter()
            .map(|id| self.refresh(store, refresher, id));
        for result in futures_util::future::join_all(futures).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "quota refresh failed for one account");
            }
        }
    }

    /// Snapshot of one account's quota rows, sorted by model name, plus the
    /// most recent fetch time across all of its entries.
    pub async fn snapshot(&self, account_id: &str) -> (Vec<ModelQuotaView>, Option<u64>) {
        let quotas = self.quotas.read().await;
        let Some(account_quotas) = quotas.get(account_id) else {
            return (Vec::new(), None);
        };

        let mut rows: Vec<ModelQuotaView> = account_quotas
            .iter()
            .map(|(name, q)| ModelQuotaView {
                model_name: name.clone(),
                remaining_fraction: q.remaining_fraction,
                reset_time: q.reset_time.clone(),
                status: q.status(),
            })
            .collect();
        rows.sort_by(|a, b| a.model_name.cmp(&b.model_name));

        let last_fetched = account_quotas.values().map(|q| q.last_fetched_at).max();
        (rows, last_fetched)
    }

    /// Quota entry for one account/model pair, used by the Selector's
    /// scoring function (spec.md §4.5).
    pub(crate) async fn entry(&self, account_id: &str, model: &str) -> Option<(f64, QuotaStatus)> {
        let quotas = self.quotas.read().await;
        quotas
            .get(account_id)
            .and_then(|m| m.get(model))
            .map(|q| (q.remaining_fraction, q.status()))
    }
}
