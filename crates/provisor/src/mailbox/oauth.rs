//! OAuth2 refresh-token exchange for the IMAP mailbox backend.

use std::time::Duration;

use log::{info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::{MailError, Result};

/// Microsoft identity platform token endpoint (common tenant).
pub const OUTLOOK_TOKEN_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Maximum length for error bodies echoed into logs, so token material never
/// floods them.
const MAX_ERROR_BODY_LENGTH: usize = 200;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

fn sanitize_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchanges long-lived refresh tokens for short-lived access tokens.
pub struct TokenRefresher {
    client: reqwest::Client,
    token_url: String,
}

impl TokenRefresher {
    pub fn new(token_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            // The token endpoint is reached directly, never through the
            // worker's proxy; the exchange must stay reliable even when the
            // proxy is flaky.
            .no_proxy()
            .build()
            .map_err(|e| MailError::NoToken(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token_url: token_url.into(),
        })
    }

    pub fn outlook() -> Result<Self> {
        Self::new(OUTLOOK_TOKEN_URL)
    }

    /// Performs one `grant_type=refresh_token` exchange. Any failure is
    /// session-fatal: the caller aborts the mailbox session rather than
    /// retrying the exchange.
    pub async fn refresh(
        &self,
        client_id: &str,
        refresh_token: &SecretString,
    ) -> Result<SecretString> {
        info!("Refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token.expose_secret()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| MailError::NoToken(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Token endpoint returned HTTP {}", status.as_u16());
            return Err(MailError::NoToken(format!(
                "Token refresh failed ({}): {}",
                status,
                sanitize_error_body(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailError::NoToken(format!("Malformed token response: {}", e)))?;

        info!(
            "Access token obtained{}",
            token
                .expires_in
                .map(|s| format!(" (expires in {}s)", s))
                .unwrap_or_default()
        );
        Ok(SecretString::from(token.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_short_body_untouched() {
        assert_eq!(sanitize_error_body("invalid_grant"), "invalid_grant");
    }

    #[test]
    fn test_sanitize_long_body_truncated() {
        let body = "x".repeat(500);
        let sanitized = sanitize_error_body(&body);
        assert!(sanitized.len() < body.len());
        assert!(sanitized.ends_with("(truncated)"));
    }

    #[test]
    fn test_token_response_parses_minimal_payload() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"tok"}"#).unwrap();
        assert_eq!(token.access_token, "tok");
        assert!(token.expires_in.is_none());
    }
}
