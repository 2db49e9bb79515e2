//! Client-credentials token exchange

use crate::config::ConnectionConfig;
use crate::error::{Result, WorkerError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Response body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchanges client credentials for a short-lived bearer token.
///
/// A token is fetched once per session establishment and used until the
/// session is discarded; there is no refresh-before-expiry. An expired token
/// surfaces as a failed gateway call and is resolved by rebuilding the
/// session, which fetches a fresh token here.
pub struct TokenProvider {
    client: Client,
    endpoint: String,
}

impl TokenProvider {
    /// Create a provider targeting the configured token endpoint.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        Self::with_endpoint(config.token_url())
    }

    /// Create a provider targeting an explicit endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WorkerError::Auth {
                endpoint: endpoint.clone(),
                reason: format!("client build failed: {e}"),
            })?;

        Ok(Self { client, endpoint })
    }

    /// Perform the client-credentials exchange and return the bearer token.
    pub async fn fetch_token(&self, config: &ConnectionConfig) -> Result<String> {
        debug!("requesting access token from {}", self.endpoint);

        let params = [
            ("grant_type", "client_credentials"),
            ("audience", config.audience.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.auth_error(format!("HTTP {status}: {body}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| self.auth_error(format!("invalid token response: {e}")))?;

        body.access_token
            .ok_or_else(|| self.auth_error("response body has no access_token".to_string()))
    }

    fn auth_error(&self, reason: String) -> WorkerError {
        WorkerError::Auth {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            mode: Mode::SelfManaged,
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            cluster_id: String::new(),
            region: String::new(),
            audience: "zeebe-api".to_string(),
            gateway_url: None,
            token_url: None,
        }
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            // basic auth of (c, s)
            .and(header("authorization", "Basic Yzpz"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("audience=zeebe-api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-123",
                "expires_in": 300,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let provider = TokenProvider::with_endpoint(format!("{}/oauth/token", server.uri())).unwrap();
        let token = provider.fetch_token(&config()).await.unwrap();
        assert_eq!(token, "tok-123");
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let endpoint = format!("{}/oauth/token", server.uri());
        let provider = TokenProvider::with_endpoint(endpoint.clone()).unwrap();
        let err = provider.fetch_token(&config()).await.unwrap_err();

        match err {
            WorkerError::Auth {
                endpoint: e,
                reason,
            } => {
                assert_eq!(e, endpoint);
                assert!(reason.contains("401"), "unexpected reason: {reason}");
            }
            other => panic!("Expected Auth error, got: {other:?}"),
        }
        assert!(provider
            .fetch_token(&config())
            .await
            .unwrap_err()
            .is_session_fatal());
    }

    #[tokio::test]
    async fn test_missing_access_token_field() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let provider = TokenProvider::with_endpoint(format!("{}/oauth/token", server.uri())).unwrap();
        let err = provider.fetch_token(&config()).await.unwrap_err();

        match err {
            WorkerError::Auth { reason, .. } => {
                assert!(reason.contains("access_token"), "unexpected reason: {reason}");
            }
            other => panic!("Expected Auth error, got: {other:?}"),
        }
    }
}
