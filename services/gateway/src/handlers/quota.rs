//! `GET /v1/quota` — quota snapshot preceded by a best-effort fan-out
//! refresh across all ready accounts (spec.md §4.4, §6).

use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::state::AppState;

pub async fn quota(State(state): State<AppState>) -> impl IntoResponse {
    let ready_ids: Vec<String> = state
        .store
        .ready_accounts()
        .await
        .into_iter()
        .map(|a| a.id)
        .collect();
    state
        .quota
        .refresh_all(&state.store, &state.refresher, &ready_ids)
        .await;

    let accounts = state.store.list().await;
    let mut rows = Vec::with_capacity(accounts.len());
    for account in accounts {
        let (models, last_fetched_at) = state.quota.snapshot(&account.id).await;
        let models_json: Vec<_> = models
            .iter()
            .map(|m| {
                json!({
                    "modelName": m.model_name,
                    "remainingFraction": m.remaining_fraction,
                    "resetTime": m.reset_time,
                    "status": match m.status {
                        pool::QuotaStatus::Available => "available",
                        pool::QuotaStatus::Exhausted => "exhausted",
                    },
                })
            })
            .collect();

        rows.push(json!({
            "id": account.id,
            "email": account.email,
            "status": account.status.label(),
            "lastFetchedAt": last_fetched_at,
            "models": models_json,
        }));
    }

    axum::Json(json!({ "accounts": rows }))
}
