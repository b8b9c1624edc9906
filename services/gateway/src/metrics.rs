//! Prometheus metrics exposition (SPEC_FULL.md "Metrics")
//!
//! - `pool_accounts_total` (gauge): label `status` (ready/cooldown/error)
//! - `gateway_requests_total` (counter): labels `dialect`, `status`
//! - `gateway_upstream_retries_total` (counter): label `dialect`
//! - `gateway_request_duration_seconds` (histogram): labels `dialect`, `status`

use credentials::AccountStore;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder, with explicit histogram buckets so
/// `/metrics` renders true histograms rather than summaries.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("gateway_request_duration_seconds".to_string()),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
            ],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request with dialect/status labels and duration.
pub fn record_request(dialect: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("gateway_requests_total", "dialect" => dialect.to_string(), "status" => status_str.clone())
        .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "dialect" => dialect.to_string(), "status" => status_str)
        .record(duration_secs);
}

/// Record one upstream 429 retry against the next account in the pool.
pub fn record_upstream_retry(dialect: &str) {
    metrics::counter!("gateway_upstream_retries_total", "dialect" => dialect.to_string()).increment(1);
}

/// Refresh the `pool_accounts_total` gauge from the current account store
/// state. Called once per `/metrics` scrape rather than on every mutation,
/// since the store has no change-notification hook.
pub async fn record_pool_composition(store: &AccountStore) {
    let accounts = store.list().await;
    let (mut ready, mut cooldown, mut error) = (0u64, 0u64, 0u64);
    for account in &accounts {
        match account.status {
            credentials::AccountStatus::Ready => ready += 1,
            credentials::AccountStatus::Cooldown => cooldown += 1,
            credentials::AccountStatus::Error => error += 1,
        }
    }
    metrics::gauge!("pool_accounts_total", "status" => "ready").set(ready as f64);
    metrics::gauge!("pool_accounts_total", "status" => "cooldown").set(cooldown as f64);
    metrics::gauge!("pool_accounts_total", "status" => "error").set(error as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("gateway_request_duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0],
            )
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_emits_labeled_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("openai", 200, 0.042);
        record_request("anthropic", 429, 1.2);

        let output = handle.render();
        assert!(output.contains("gateway_requests_total"));
        assert!(output.contains("dialect=\"openai\""));
        assert!(output.contains("dialect=\"anthropic\""));
        assert!(output.contains("status=\"429\""));
        assert!(output.contains("gateway_request_duration_seconds_bucket"));
    }

    #[test]
    fn record_upstream_retry_increments_per_dialect() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_upstream_retry("openai");
        record_upstream_retry("openai");

        let output = handle.render();
        assert!(output.contains("gateway_upstream_retries_total"));
        assert!(output.contains("dialect=\"openai\""));
    }

    #[tokio::test]
    async fn pool_composition_gauge_reflects_store_state() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let store = AccountStore::new(60_000);
        let added = store
            .add(credentials::NewCredential {
                email: "a@example.com".into(),
                access_token: "at".into(),
                refresh_token: "rt".into(),
                expiry_date: common::time::now_millis() + 3_600_000,
                project_id: None,
            })
            .await;
        store.mark_cooldown(&added.id).await.unwrap();

        record_pool_composition(&store).await;

        let output = handle.render();
        assert!(output.contains("pool_accounts_total"));
        assert!(output.contains("status=\"cooldown\""));
    }
}
