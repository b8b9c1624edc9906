//! `GET /health` — process liveness/readiness, uptime, pool summary
//! (SPEC_FULL.md "Supplemented features").

use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let accounts = state.store.list().await;
    let (mut ready, mut cooldown, mut error) = (0u64, 0u64, 0u64);
    for account in &accounts {
        match account.status {
            credentials::AccountStatus::Ready => ready += 1,
            credentials::AccountStatus::Cooldown => cooldown += 1,
            credentials::AccountStatus::Error => error += 1,
        }
    }

    let body = json!({
        "status": if ready > 0 { "healthy" } else { "unhealthy" },
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "accounts_total": accounts.len(),
        "accounts_ready": ready,
        "accounts_cooldown": cooldown,
        "accounts_error": error,
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::record_pool_composition(&state.store).await;
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics_handle.render(),
    )
}
