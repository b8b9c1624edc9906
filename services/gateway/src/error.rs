//! Error-kind → wire-body mapping for both client dialects (spec.md §7)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Which dialect's error body shape to render (spec.md §6 "Error body shapes").
#[derive(Debug, Clone, Copy)]
pub enum Dialect {
    OpenAi,
    Anthropic,
}

/// A dispatch error paired with the dialect it must be rendered for.
pub struct ApiError {
    pub status: StatusCode,
    pub dialect: Dialect,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn from_dispatch(err: dispatch::Error, dialect: Dialect) -> Self {
        use dispatch::Error::*;
        match err {
            RateLimitExhausted { retry_after } => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                dialect,
                message: "no ready accounts, retry later".to_string(),
                retry_after: Some(retry_after),
            },
            AuthRefreshFailed(msg) => Self {
                status: StatusCode::UNAUTHORIZED,
                dialect,
                message: msg,
                retry_after: None,
            },
            NoAccounts => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                dialect,
                message: "no accounts configured".to_string(),
                retry_after: None,
            },
            BadGateway(msg) => Self {
                status: StatusCode::BAD_GATEWAY,
                dialect,
                message: msg,
                retry_after: None,
            },
            Upstream { status, body } => Self {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                dialect,
                message: body,
                retry_after: None,
            },
            InvalidRequest(msg) => Self {
                status: StatusCode::BAD_REQUEST,
                dialect,
                message: msg,
                retry_after: None,
            },
        }
    }

    fn openai_type(status: StatusCode) -> &'static str {
        match status.as_u16() {
            400 => "invalid_request_error",
            401 => "authentication_error",
            403 => "permission_error",
            404 => "invalid_request_error",
            429 => "rate_limit_error",
            500..=599 => "server_error",
            _ => "invalid_request_error",
        }
    }

    /// OpenAI dialect string error code (spec.md §8 scenario 2:
    /// `{error:{code:"rate_limit_exceeded",...}}`, not the bare status).
    fn openai_code(status: StatusCode) -> &'static str {
        match status.as_u16() {
            400 => "invalid_request_error",
            401 => "invalid_api_key",
            403 => "permission_error",
            404 => "invalid_request_error",
            429 => "rate_limit_exceeded",
            500..=599 => "server_error",
            _ => "invalid_request_error",
        }
    }

    fn anthropic_type(status: StatusCode) -> &'static str {
        match status.as_u16() {
            400 => "invalid_request_error",
            401 => "authentication_error",
            403 => "permission_error",
            404 => "not_found_error",
            429 => "rate_limit_error",
            529 => "overloaded_error",
            500 | 502 | 503 => "api_error",
            _ => "api_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.dialect {
            Dialect::OpenAi => json!({
                "error": {
                    "message": self.message,
                    "type": Self::openai_type(self.status),
                    "param": serde_json::Value::Null,
                    "code": Self::openai_code(self.status),
                }
            }),
            Dialect::Anthropic => json!({
                "type": "error",
                "error": {
                    "type": Self::anthropic_type(self.status),
                    "message": self.message,
                }
            }),
        };

        let mut response = (self.status, axum::Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_str(&retry_after.to_string())
                    .expect("retry_after is always ASCII digits"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limit_exhausted_renders_string_code_not_status_number() {
        let err = ApiError::from_dispatch(
            dispatch::Error::RateLimitExhausted { retry_after: 60 },
            Dialect::OpenAi,
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "60"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], "rate_limit_exceeded");
        assert_eq!(value["error"]["type"], "rate_limit_error");
    }
}
