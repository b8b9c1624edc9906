//! `GET /v1/models` — static model table (spec.md §6)

use axum::response::IntoResponse;
use serde_json::json;

use protocol::models::MODEL_TABLE;

/// A fixed creation timestamp for the whole table; the proxy doesn't track
/// per-model release dates, so every row reports the same value.
const CREATED: u64 = 1_700_000_000;

pub async fn list_models() -> impl IntoResponse {
    let data: Vec<_> = MODEL_TABLE
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": CREATED,
                "owned_by": "antigravity-proxy",
            })
        })
        .collect();

    axum::Json(json!({
        "object": "list",
        "data": data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn lists_every_configured_model() {
        let response = list_models().await.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["object"], "list");
        assert_eq!(value["data"].as_array().unwrap().len(), MODEL_TABLE.len());
    }
}
