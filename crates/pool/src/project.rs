//! Project Resolver (spec.md C3 / §4.3)
//!
//! Single-flight per account, same double-checked-lock shape as
//! [`oauth::TokenRefresher`]: a discovery in flight for an account must be
//! awaited by any concurrent caller instead of duplicated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::ids::dummy_project_id;
use credentials::AccountStore;
use oauth::TokenRefresher;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Error, Result};

const LOAD_CODE_ASSIST_TIMEOUT: Duration = Duration::from_secs(20);
const ONBOARD_TIMEOUT: Duration = Duration::from_secs(30);
const ONBOARD_POLL_INTERVAL: Duration = Duration::from_secs(2);
const ONBOARD_MAX_ATTEMPTS: usize = 60;

#[derive(Debug, Serialize)]
struct ClientMetadata {
    #[serde(rename = "ideType")]
    ide_type: &'static str,
    platform: &'static str,
    #[serde(rename = "pluginType")]
    plugin_type: &'static str,
}

impl Default for ClientMetadata {
    fn default() -> Self {
        Self {
            ide_type: "IDE_UNSPECIFIED",
            platform: "PLATFORM_UNSPECIFIED",
            plugin_type: "GEMINI",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Tier {
    id: String,
    #[serde(rename = "isDefault", default)]
    is_default: bool,
}

#[derive(Debug, Deserialize)]
struct LoadCodeAssistResponse {
    #[serde(rename = "cloudaicompanionProject", default)]
    cloudaicompanion_project: Option<String>,
    #[serde(rename = "currentTier", default)]
    current_tier: Option<Tier>,
    #[serde(rename = "allowedTiers", default)]
    allowed_tiers: Vec<Tier>,
}

#[derive(Debug, Deserialize)]
struct OnboardProject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OnboardResponsePayload {
    #[serde(rename = "cloudaicompanionProject")]
    cloudaicompanion_project: OnboardProject,
}

#[derive(Debug, Deserialize)]
struct OnboardUserResponse {
    #[serde(default)]
    done: bool,
    response: Option<OnboardResponsePayload>,
}

pub struct ProjectResolver {
    base_url: String,
    client: reqwest::Client,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProjectResolver {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
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

    /// Resolve a usable project id for `account_id` (spec.md §4.3).
    ///
    /// Never fails outright: on any discovery failure this falls back to a
    /// dummy project id, since resolution policy (whether the upstream
    /// accepts the dummy) is the dispatcher's problem, not this one's.
    pub async fn resolve(
        &self,
        store: &AccountStore,
        refresher: &TokenRefresher,
        account_id: &str,
    ) -> Result<String> {
        let account = store
            .get(account_id)
            .await
            .ok_or_else(|| Error::NotFound(account_id.to_string()))?;
        if let Some(id) = account.configured_project_id.clone() {
            return Ok(id);
        }
        if let Some(id) = account.discovered_project_id.clone() {
            return Ok(id);
        }

        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        if let Some(id) = store
            .get(account_id)
            .await
            .and_then(|a| a.discovered_project_id)
        {
            return Ok(id);
        }

        let fresh = refresher.ensure_fresh(store, account_id).await?;
        match self.discover(&fresh).await {
            Ok(id) => {
                store
                    .set_discovered_project_id(account_id, id.clone())
                    .await?;
                Ok(id)
            }
            Err(e) => {
                warn!(account_id, error = %e, "project discovery failed, using dummy id");
                Ok(dummy_project_id())
            }
        }
    }

    async fn discover(&self, account: &credentials::Account) -> Result<String> {
        let url = format!("{}/:loadCodeAssist", self.base_url);
        let response: LoadCodeAssistResponse = self
            .client
            .post(&url)
            .bearer_auth(&account.access_token)
            .timeout(LOAD_CODE_ASSIST_TIMEOUT)
            .json(&json!({
                "metadata": ClientMetadata::default(),
                "cloudaicompanionProject": serde_json::Value::Null,
            }))
            .send()
            .await
            .map_err(|e| Error::Discovery(format!("loadCodeAssist request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Discovery(format!("loadCodeAssist returned error: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Discovery(format!("loadCodeAssist response unreadable: {e}")))?;

        if let Some(project) = response.cloudaicompanion_project {
            return Ok(project);
        }

        if response.current_tier.is_some() {
            return Err(Error::Discovery(
                "no project on account with an existing tier".into(),
            ));
        }

        let tier_id = response
            .allowed_tiers
            .iter()
            .find(|t| t.is_default)
            .map(|t| t.id.clone())
            .unwrap_or_else(|| "free-tier".to_string());

        self.onboard(account, &tier_id).await
    }

    async fn onboard(&self, account: &credentials::Account, tier_id: &str) -> Result<String> {
        let url = format!("{}/:onboardUser", self.base_url);
        for _ in 0..ONBOARD_MAX_ATTEMPTS {
            let response: OnboardUserResponse = self
                .client
                .post(&url)
                .bearer_auth(&account.access_token)
                .timeout(ONBOARD_TIMEOUT)
                .json(&json!({
                    "tierId": tier_id,
                    "metadata": ClientMetadata::default(),
                }))
                .send()
                .await
                .map_err(|e| Error::Discovery(format!("onboardUser request failed: {e}")))?
                .error_for_status()
                .map_err(|e| Error::Discovery(format!("onboardUser returned error: {e}")))?
                .json()
                .await
                .map_err(|e| Error::Discovery(format!("onboardUser response unreadable: {e}")))?;

            if response.done {
                return response
                    .response
                    .map(|r| r.cloudaicompanion_project.id)
                    .ok_or_else(|| {
                        Error::Discovery("onboardUser done without a project".to_string())
                    });
            }

            sleep(ONBOARD_POLL_INTERVAL).await;
        }

        Err(Error::Discovery("onboarding did not complete in time".into()))
    }
}
