//! Selector (spec.md C5 / §4.5)
//!
//! Scores ready accounts so that fresh-quota, least-used,
//! least-recently-used accounts win, and never-used accounts get a chance
//! to warm in ahead of ones that have seen heavy traffic.

use credentials::{Account, AccountStore};

use crate::quota::{QuotaStatus, QuotaTracker};

const NEVER_USED_BONUS: f64 = 4000.0;
const RECENCY_CAP_SECONDS: f64 = 3600.0;
const QUOTA_WEIGHT: f64 = 1000.0;
const EXHAUSTED_PENALTY: f64 = -5000.0;
const USAGE_WEIGHT: f64 = -0.1;

pub struct Selector<'a> {
    store: &'a AccountStore,
    quota: &'a QuotaTracker,
}

impl<'a> Selector<'a> {
    pub fn new(store: &'a AccountStore, quota: &'a QuotaTracker) -> Self {
        Self { store, quota }
    }

    /// Pick one ready account, optionally scored against a model's quota
    /// (spec.md §4.5). Lazily expires cooldowns first.
    pub async fn pick(&self, model: Option<&str>) -> Option<Account> {
        let ready = self.store.ready_accounts().await;
        if ready.is_empty() {
            return None;
        }

        let mut best: Option<(f64, Account)> = None;
        for account in ready {
            let score = self.score(&account, model).await;
            match &best {
                Some((best_score, _)) if *best_score >= score => {}
                _ => best = Some((score, account)),
            }
        }
        best.map(|(_, account)| account)
    }

    async fn score(&self, account: &Account, model: Option<&str>) -> f64 {
        let mut score = 0.0;

        if let Some(model) = model {
            if let Some((remaining_fraction, status)) = self.quota.entry(&account.id, model).await
            {
                score += QUOTA_WEIGHT * remaining_fraction;
                if status == QuotaStatus::Exhausted {
                    score += EXHAUSTED_PENALTY;
                }
            }
        }

        score += USAGE_WEIGHT * account.request_count as f64;

        score += match account.last_used {
            None => NEVER_USED_BONUS,
            Some(last_used_ms) => {
                let now = common::time::now_millis();
                let elapsed_secs = now.saturating_sub(last_used_ms) as f64 / 1000.0;
                elapsed_secs.min(RECENCY_CAP_SECONDS)
            }
        };

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credentials::NewCredential;

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
    async fn returns_none_when_pool_empty() {
        let store = AccountStore::new(60_000);
        let quota = QuotaTracker::new("http://unused.invalid", reqwest::Client::new());
        let selector = Selector::new(&store, &quota);
        assert!(selector.pick(None).await.is_none());
    }

    #[tokio::test]
    async fn prefers_never_used_account() {
        let store = AccountStore::new(60_000);
        let quota = QuotaTracker::new("http://unused.invalid", reqwest::Client::new());
        let used = store.add(credential("used@example.com")).await;
        let fresh = store.add(credential("fresh@example.com")).await;
        store.mark_success(&used.id).await.unwrap();

        let selector = Selector::new(&store, &quota);
        let picked = selector.pick(None).await.unwrap();
        assert_eq!(picked.id, fresh.id);
    }

    #[tokio::test]
    async fn skips_accounts_in_cooldown() {
        let store = AccountStore::new(3_600_000);
        let quota = QuotaTracker::new("http://unused.invalid", reqwest::Client::new());
        let cooling = store.add(credential("cooling@example.com")).await;
        let ready = store.add(credential("ready@example.com")).await;
        store.mark_cooldown(&cooling.id).await.unwrap();

        let selector = Selector::new(&store, &quota);
        let picked = selector.pick(None).await.unwrap();
        assert_eq!(picked.id, ready.id);
    }

    #[tokio::test]
    async fn heavier_usage_scores_lower() {
        let store = AccountStore::new(60_000);
        let quota = QuotaTracker::new("http://unused.invalid", reqwest::Client::new());
        let light = store.add(credential("light@example.com")).await;
        let heavy = store.add(credential("heavy@example.com")).await;
        for _ in 0..50 {
            store.mark_success(&heavy.id).await.unwrap();
        }
        store.mark_success(&light.id).await.unwrap();

        let selector = Selector::new(&store, &quota);
        let picked = selector.pick(None).await.unwrap();
        assert_eq!(picked.id, light.id);
    }
}
