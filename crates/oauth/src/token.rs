//! Token endpoint transport (spec.md §4.2)

use serde::Deserialize;

use crate::constants::TOKEN_ENDPOINT;
use crate::error::{Error, Result};

/// Response from the OAuth token endpoint for a `refresh_token` grant.
///
/// `refresh_token` is only present when the provider rotates it; most
/// refresh responses omit it and the caller keeps the existing one.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the new access token expires, relative to now.
    pub expires_in: u64,
}

/// POST `grant_type=refresh_token` to the token endpoint (spec.md §4.2).
pub async fn refresh_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::Http(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_deserializes_without_rotated_refresh_token() {
        let json = r#"{"access_token":"at_abc","expires_in":3599}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "at_abc");
        assert!(token.refresh_token.is_none());
        assert_eq!(token.expires_in, 3599);
    }

    #[test]
    fn token_response_deserializes_with_rotated_refresh_token() {
        let json = r#"{"access_token":"at_abc","refresh_token":"rt_new","expires_in":3600}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("rt_new"));
    }
}
