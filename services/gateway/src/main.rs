//! Antigravity gateway: protocol-translating reverse proxy (spec.md §1-§2)
//!
//! Wires the credential store, OAuth refresher, project resolver, quota
//! tracker, selector, and dispatcher together behind the OpenAI and
//! Anthropic dialect HTTP surfaces (spec.md §6).

mod auth;
mod config;
mod error;
mod handlers;
mod metrics;
mod state;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting antigravity-gateway");

    let config = Config::from_env().context("failed to load configuration")?;
    let port = config.port;
    let accounts_configured = config.accounts.len();

    let metrics_handle = metrics::install_recorder();
    let state = AppState::build(config, metrics_handle).await;

    info!(accounts_configured, port, "configuration loaded");

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics))
        .route("/v1/chat/completions", post(handlers::chat::chat_completions))
        .route("/v1/messages", post(handlers::messages::messages))
        .route("/v1/models", get(handlers::models::list_models))
        .route("/v1/quota", get(handlers::quota::quota))
        .with_state(state)
}

/// Wait for SIGTERM or SIGINT for graceful shutdown. In-flight streaming
/// dispatches are allowed to finish (SPEC_FULL.md "Graceful shutdown").
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::Secret;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            port: 0,
            proxy_api_key: None,
            client_id: "test-client".to_string(),
            client_secret: Secret::new("test-secret".to_string()),
            cooldown_duration_ms: 60_000,
            max_retry_accounts: 3,
            accounts: vec![],
        }
    }

    #[tokio::test]
    async fn health_route_reports_unhealthy_with_no_accounts() {
        let state = AppState::build(test_config(), metrics::install_recorder()).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "unhealthy");
        assert_eq!(value["accounts_total"], 0);
    }
}
