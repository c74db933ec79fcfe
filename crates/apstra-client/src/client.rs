//! Apstra API client
//!
//! Resource operations live in per-area modules (`design`, `blueprint`,
//! `iba`, `freeform`, `graph`) as further `impl ApstraClient` blocks.

use crate::common::HttpClient;
use crate::config::ClientConfig;
use crate::error::ApstraError;
use crate::version::{self, ControllerVersion, RawVersionResponse, VersionGate};
use tokio::sync::OnceCell;
use tracing::{info, warn};

const VERSION_PATH: &str = "/api/version";

/// Apstra API client
#[derive(Debug)]
pub struct ApstraClient {
    pub(crate) http: HttpClient,
    version: OnceCell<ControllerVersion>,
    allow_unsupported: bool,
}

impl ApstraClient {
    /// Create a client without touching the network.
    ///
    /// Call [`login`](Self::login) before using authenticated endpoints, or use
    /// [`connect`](Self::connect) to do everything at once.
    pub fn new(config: &ClientConfig) -> Result<Self, ApstraError> {
        Ok(Self {
            http: HttpClient::new(config)?,
            version: OnceCell::new(),
            allow_unsupported: config.allow_unsupported,
        })
    }

    /// Create a client, log in, and verify the controller version is supported
    pub async fn connect(config: &ClientConfig) -> Result<Self, ApstraError> {
        let client = Self::new(config)?;
        client.login().await?;

        let version = client.version().await?;
        match version::check_supported(&version) {
            Ok(()) => info!("Connected to controller {} (version {})", client.base_url(), version),
            Err(e) if client.allow_unsupported => {
                warn!("{}; continuing because unsupported versions are allowed", e);
            }
            Err(e) => return Err(e),
        }

        Ok(client)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Authenticate and keep the session token for later requests
    pub async fn login(&self) -> Result<(), ApstraError> {
        self.http.login().await
    }

    /// End the session
    pub async fn logout(&self) -> Result<(), ApstraError> {
        self.http.logout().await
    }

    /// Controller version, fetched once and cached
    pub async fn version(&self) -> Result<ControllerVersion, ApstraError> {
        self.version
            .get_or_try_init(|| async {
                let raw: RawVersionResponse = self.http.get(VERSION_PATH).await?;
                raw.version.parse::<ControllerVersion>()
            })
            .await
            .cloned()
    }

    /// Fail unless the controller supports a gated feature
    pub(crate) async fn ensure_feature(&self, gate: &VersionGate) -> Result<(), ApstraError> {
        gate.ensure_supported(&self.version().await?)
    }

    /// Enforce a version-gated field on an outgoing request
    pub(crate) async fn check_field(
        &self,
        gate: &VersionGate,
        field: &str,
        present: bool,
    ) -> Result<(), ApstraError> {
        gate.require_field(&self.version().await?, field, present)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_version(version: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/aaa/login"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": "abc", "id": "admin"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(VERSION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": version, "build_version": "106"})))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_connect_supported_version() {
        let server = server_with_version("4.2.1-106").await;
        let config = ClientConfig::new(server.uri(), "admin", "admin").unwrap();

        let client = ApstraClient::connect(&config).await.unwrap();
        let version = client.version().await.unwrap();
        assert_eq!(version.version, semver::Version::new(4, 2, 1));
        // cached, the mock expects a single call
        client.version().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_unsupported_version() {
        let server = server_with_version("3.3.0").await;
        let config = ClientConfig::new(server.uri(), "admin", "admin").unwrap();

        let err = ApstraClient::connect(&config).await.unwrap_err();
        assert!(matches!(err, ApstraError::UnsupportedVersion(_)));
    }

    #[tokio::test]
    async fn test_connect_allow_unsupported() {
        let server = server_with_version("3.3.0").await;
        let mut config = ClientConfig::new(server.uri(), "admin", "admin").unwrap();
        config.allow_unsupported = true;

        assert!(ApstraClient::connect(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_feature_gate_uses_cached_version() {
        let server = server_with_version("4.1.2").await;
        let config = ClientConfig::new(server.uri(), "admin", "admin").unwrap();
        let client = ApstraClient::connect(&config).await.unwrap();

        let err = client.ensure_feature(&version::FREEFORM).await.unwrap_err();
        assert!(matches!(err, ApstraError::UnsupportedVersion(_)));
        assert!(client.ensure_feature(&version::IBA_WIDGETS).await.is_ok());
    }
}
