//! API key enforcement (spec.md §6 "All `/v1/*` endpoints may require an API key")

use axum::http::{HeaderMap, StatusCode};
use common::Secret;

use crate::error::{ApiError, Dialect};

/// `Authorization: Bearer <k>` for OpenAI-dialect endpoints.
pub fn check_openai_key(headers: &HeaderMap, expected: Option<&Secret<String>>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(key) if key == expected.expose() => Ok(()),
        _ => Err(unauthorized(Dialect::OpenAi)),
    }
}

/// `x-api-key` for `/v1/messages`.
pub fn check_anthropic_key(headers: &HeaderMap, expected: Option<&Secret<String>>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == expected.expose() => Ok(()),
        _ => Err(unauthorized(Dialect::Anthropic)),
    }
}

fn unauthorized(dialect: Dialect) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        dialect,
        message: "invalid or missing API key".to_string(),
        retry_after: None,
    }
}
