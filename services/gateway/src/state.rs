//! Shared application state, wiring every crate together (spec.md §9 "one-way
//! dependency" wiring happens one level up, inside the individual crates;
//! this module only assembles the already-wired pieces for the HTTP layer).

use std::sync::Arc;
use std::time::Instant;

use common::Secret;
use credentials::AccountStore;
use dispatch::Dispatcher;
use metrics_exporter_prometheus::PrometheusHandle;
use oauth::TokenRefresher;
use pool::QuotaTracker;

use crate::config::Config;

const UPSTREAM_BASE_URL: &str = "https://cloudcode-pa.googleapis.com/v1internal";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<AccountStore>,
    pub quota: Arc<QuotaTracker>,
    pub refresher: Arc<TokenRefresher>,
    pub proxy_api_key: Option<Secret<String>>,
    pub started_at: Instant,
    pub metrics_handle: Arc<PrometheusHandle>,
}

impl AppState {
    pub async fn build(config: Config, metrics_handle: PrometheusHandle) -> Self {
        let store = Arc::new(AccountStore::new(config.cooldown_duration_ms));
        for credential in config.accounts {
            store.add(credential).await;
        }

        let client = common::http::build_client_unbounded();
        let refresher = Arc::new(TokenRefresher::new(
            client.clone(),
            config.client_id,
            config.client_secret.expose().clone(),
        ));
        let resolver = Arc::new(pool::ProjectResolver::new(UPSTREAM_BASE_URL, client.clone()));
        let quota = Arc::new(QuotaTracker::new(UPSTREAM_BASE_URL, client.clone()));
        let transport = Arc::new(transport::Transport::new(vec![UPSTREAM_BASE_URL.to_string()]));

        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            refresher.clone(),
            resolver,
            quota.clone(),
            transport,
            config.max_retry_accounts,
        ));

        Self {
            dispatcher,
            store,
            quota,
            refresher,
            proxy_api_key: config.proxy_api_key,
            started_at: Instant::now(),
            metrics_handle: Arc::new(metrics_handle),
        }
    }
}
