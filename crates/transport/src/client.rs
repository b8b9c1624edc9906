//! Upstream Transport (spec.md C8 / §4.8)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::http::{build_client, build_client_unbounded};
use credentials::AccountStore;
use oauth::TokenRefresher;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

const UNARY_TIMEOUT: Duration = Duration::from_secs(120);

pub struct Transport {
    base_urls: Vec<String>,
    unary_client: reqwest::Client,
    stream_client: reqwest::Client,
    cursor: AtomicUsize,
}

impl Transport {
    /// `base_urls` is the ordered list of equivalent upstream endpoints
    /// (spec.md §4.8). Must be non-empty.
    pub fn new(base_urls: Vec<String>) -> Self {
        Self {
            base_urls,
            unary_client: build_client(UNARY_TIMEOUT),
            stream_client: build_client_unbounded(),
            cursor: AtomicUsize::new(0),
        }
    }

    fn rotation_start(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.base_urls.len()
    }

    /// `POST <base><path>` with a JSON body, returning the parsed JSON
    /// response (spec.md §4.8, unary path). Used for `:generateContent`,
    /// `:fetchAvailableModels`, `:loadCodeAssist`, `:onboardUser`.
    pub async fn post_json(
        &self,
        store: &AccountStore,
        refresher: &TokenRefresher,
        account_id: &str,
        path: &str,
        body: &Value,
    ) -> Result<Value> {
        let account = refresher.ensure_fresh(store, account_id).await?;
        let n = self.base_urls.len();
        let start = self.rotation_start();
        let mut last_err = String::new();

        for offset in 0..n {
            let idx = (start + offset) % n;
            let url = format!("{}{}", self.base_urls[idx], path);

            let response = match self
                .unary_client
                .post(&url)
                .bearer_auth(&account.access_token)
                .json(body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = format!("{url}: {e}");
                    continue;
                }
            };

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => return Err(Error::RateLimited),
                StatusCode::UNAUTHORIZED => {
                    return self
                        .retry_after_refresh(store, refresher, account_id, &url, body)
                        .await;
                }
                status if status.is_server_error() => {
                    last_err = format!("{url}: {status}");
                    continue;
                }
                status if status.is_success() => {
                    return response
                        .json()
                        .await
                        .map_err(|e| Error::Upstream {
                            status: status.as_u16(),
                            body: format!("unreadable response body: {e}"),
                        });
                }
                status => {
                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::Upstream {
                        status: status.as_u16(),
                        body: text,
                    });
                }
            }
        }

        warn!(account_id, error = %last_err, "all base URLs failed");
        Err(Error::BadGateway(last_err))
    }

    async fn retry_after_refresh(
        &self,
        store: &AccountStore,
        refresher: &TokenRefresher,
        account_id: &str,
        url: &str,
        body: &Value,
    ) -> Result<Value> {
        let refreshed = refresher.force_refresh(store, account_id).await?;
        let response = self
            .unary_client
            .post(url)
            .bearer_auth(&refreshed.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::AuthFailed(format!("retry after refresh failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| Error::Upstream {
                status: status.as_u16(),
                body: format!("unreadable response body: {e}"),
            });
        }
        Err(Error::AuthFailed(format!(
            "still unauthorized after refresh: {status}"
        )))
    }

    /// `POST <base><path>` with a JSON body, returning as soon as headers
    /// arrive for the caller to consume as a byte stream (spec.md §4.8
    /// point 6: unbounded body timeout).
    pub async fn post_stream(
        &self,
        store: &AccountStore,
        refresher: &TokenRefresher,
        account_id: &str,
        path: &str,
        body: &Value,
    ) -> Result<Response> {
        let account = refresher.ensure_fresh(store, account_id).await?;
        let n = self.base_urls.len();
        let start = self.rotation_start();
        let mut last_err = String::new();

        for offset in 0..n {
            let idx = (start + offset) % n;
            let base = &self.base_urls[idx];
            let url = format!("{base}{path}");
            let host = reqwest::Url::parse(&url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_default();

            let response = match self
                .stream_client
                .post(&url)
                .bearer_auth(&account.access_token)
                .header("Host", host)
                .header("Accept", "text/event-stream")
                .json(body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = format!("{url}: {e}");
                    continue;
                }
            };

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => return Err(Error::RateLimited),
                StatusCode::UNAUTHORIZED => {
                    let refreshed = refresher.force_refresh(store, account_id).await?;
                    let retry_host = reqwest::Url::parse(&url)
                        .ok()
                        .and_then(|u| u.host_str().map(str::to_string))
                        .unwrap_or_default();
                    let retry = self
                        .stream_client
                        .post(&url)
                        .bearer_auth(&refreshed.access_token)
                        .header("Host", retry_host)
                        .header("Accept", "text/event-stream")
                        .json(body)
                        .send()
                        .await
                        .map_err(|e| {
                            Error::AuthFailed(format!("retry after refresh failed: {e}"))
                        })?;
                    if retry.status().is_success() {
                        return Ok(retry);
                    }
                    return Err(Error::AuthFailed(format!(
                        "still unauthorized after refresh: {}",
                        retry.status()
                    )));
                }
                status if status.is_server_error() => {
                    last_err = format!("{url}: {status}");
                    continue;
                }
                status if status.is_success() => return Ok(response),
                status => {
                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::Upstream {
                        status: status.as_u16(),
                        body: text,
                    });
                }
            }
        }

        warn!(account_id, error = %last_err, "all base URLs failed");
        Err(Error::BadGateway(last_err))
    }
}
