//! Connection configuration loaded once at startup
//!
//! All environment reads happen in [`ConnectionConfig::from_env`]; the
//! resulting struct is immutable and passed by reference everywhere else.

use crate::error::{Result, WorkerError};
use url::Url;

/// Gateway REST base for a self-managed cluster.
const LOCAL_GATEWAY_URL: &str = "http://localhost:8088";

/// Keycloak token endpoint for a self-managed cluster.
const LOCAL_TOKEN_URL: &str =
    "http://localhost:18080/auth/realms/camunda-platform/protocol/openid-connect/token";

/// Token endpoint for SaaS clusters.
const CLOUD_TOKEN_URL: &str = "https://login.cloud.camunda.io/oauth/token";

/// Deployment profile of the target cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Local cluster with an insecure gateway and a local Keycloak realm.
    SelfManaged,
    /// Hosted cluster addressed by region and cluster id.
    Saas,
}

impl Mode {
    /// Parse the `mode` environment value. Only the exact string
    /// `self-managed` selects the local profile; anything else, including
    /// an unset variable, selects SaaS.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("self-managed") => Mode::SelfManaged,
            _ => Mode::Saas,
        }
    }
}

/// Connection and authentication parameters for one cluster.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub mode: Mode,
    pub client_id: String,
    pub client_secret: String,
    pub cluster_id: String,
    pub region: String,
    pub audience: String,
    /// Overrides the mode-derived gateway base URL when set.
    pub gateway_url: Option<String>,
    /// Overrides the mode-derived token endpoint when set.
    pub token_url: Option<String>,
}

impl ConnectionConfig {
    /// Build the configuration from the environment.
    ///
    /// Recognized variables: `mode`, `client_id`, `client_secret`,
    /// `cluster_id`, `region`, `audience`, and the optional endpoint
    /// overrides `gateway_url` and `token_url`.
    pub fn from_env() -> Result<Self> {
        let mode = Mode::from_env_value(std::env::var("mode").ok().as_deref());
        let client_id = std::env::var("client_id").unwrap_or_default();
        let client_secret = std::env::var("client_secret")
            .map_err(|_| WorkerError::Config("client_secret not set".to_string()))?;
        let cluster_id = std::env::var("cluster_id").unwrap_or_default();
        let region = std::env::var("region").unwrap_or_default();
        let audience = std::env::var("audience")
            .map_err(|_| WorkerError::Config("audience not set".to_string()))?;
        let gateway_url = optional_url("gateway_url")?;
        let token_url = optional_url("token_url")?;

        Ok(Self {
            mode,
            client_id,
            client_secret,
            cluster_id,
            region,
            audience,
            gateway_url,
            token_url,
        })
    }

    /// Base URL of the cluster's REST gateway. Serves job activation and
    /// completion as well as the document store.
    pub fn rest_base_url(&self) -> String {
        if let Some(url) = &self.gateway_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.mode {
            Mode::SelfManaged => LOCAL_GATEWAY_URL.to_string(),
            Mode::Saas => format!(
                "https://{}.zeebe.camunda.io:443/{}",
                self.region, self.cluster_id
            ),
        }
    }

    /// Endpoint the client-credentials exchange is performed against.
    pub fn token_url(&self) -> String {
        if let Some(url) = &self.token_url {
            return url.clone();
        }
        match self.mode {
            Mode::SelfManaged => LOCAL_TOKEN_URL.to_string(),
            Mode::Saas => CLOUD_TOKEN_URL.to_string(),
        }
    }
}

/// Read an optional env var holding a URL, rejecting unparseable values.
fn optional_url(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => {
            Url::parse(&value)
                .map_err(|e| WorkerError::Config(format!("invalid {name}: {e}")))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: Mode) -> ConnectionConfig {
        ConnectionConfig {
            mode,
            client_id: "worker".to_string(),
            client_secret: "secret".to_string(),
            cluster_id: "c1".to_string(),
            region: "r1".to_string(),
            audience: "zeebe.camunda.io".to_string(),
            gateway_url: None,
            token_url: None,
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(Mode::from_env_value(Some("self-managed")), Mode::SelfManaged);
        assert_eq!(Mode::from_env_value(Some("saas")), Mode::Saas);
        assert_eq!(Mode::from_env_value(Some("")), Mode::Saas);
        assert_eq!(Mode::from_env_value(None), Mode::Saas);
    }

    #[test]
    fn test_self_managed_endpoints() {
        let config = config(Mode::SelfManaged);
        assert_eq!(config.rest_base_url(), "http://localhost:8088");
        assert_eq!(
            config.token_url(),
            "http://localhost:18080/auth/realms/camunda-platform/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_saas_endpoints() {
        let config = config(Mode::Saas);
        assert_eq!(
            config.rest_base_url(),
            "https://r1.zeebe.camunda.io:443/c1"
        );
        assert_eq!(config.token_url(), "https://login.cloud.camunda.io/oauth/token");
    }

    #[test]
    fn test_overrides_win_over_mode() {
        let mut config = config(Mode::Saas);
        config.gateway_url = Some("http://127.0.0.1:9600/".to_string());
        config.token_url = Some("http://127.0.0.1:9601/token".to_string());

        assert_eq!(config.rest_base_url(), "http://127.0.0.1:9600");
        assert_eq!(config.token_url(), "http://127.0.0.1:9601/token");
    }
}
