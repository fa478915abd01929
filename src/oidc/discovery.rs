//! Provider discovery.
//!
//! Resolves the provider's endpoints from its OpenID Connect discovery
//! document and owns the key set shared by every verifier built from it.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::config::{VerificationConfig, DEFAULT_KEY_SET_TTL};
use super::jwks::KeySet;
use super::verifier::IdTokenVerifier;
use crate::error::{OidcError, Result};

/// Timeout applied to every provider request made by the default client.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// OIDC discovery document (partial).
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// Build the HTTP client used for provider calls.
pub fn default_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .map_err(|e| OidcError::Configuration(format!("failed to create HTTP client: {}", e)))
}

/// A discovered provider.
pub struct Client {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    http_client: reqwest::Client,
    key_set: Arc<KeySet>,
}

impl Client {
    /// Discover `issuer` with the default HTTP client and key set TTL.
    pub async fn discover(issuer: &str) -> Result<Self> {
        Self::discover_with(issuer, default_http_client()?, DEFAULT_KEY_SET_TTL).await
    }

    pub async fn discover_with(
        issuer: &str,
        http_client: reqwest::Client,
        key_set_ttl: Duration,
    ) -> Result<Self> {
        let document = fetch_discovery(issuer, &http_client).await?;
        Ok(Self::from_document(document, http_client, key_set_ttl))
    }

    /// Build a client from an already known discovery document.
    pub fn from_document(
        document: DiscoveryDocument,
        http_client: reqwest::Client,
        key_set_ttl: Duration,
    ) -> Self {
        let key_set = Arc::new(KeySet::remote(
            document.jwks_uri.clone(),
            http_client.clone(),
            key_set_ttl,
        ));
        info!(
            issuer = %document.issuer,
            jwks_uri = %document.jwks_uri,
            "OIDC provider configured"
        );
        Self {
            issuer: document.issuer,
            authorization_endpoint: document.authorization_endpoint,
            token_endpoint: document.token_endpoint,
            http_client,
            key_set,
        }
    }

    /// Verifier sharing this client's key set.
    pub fn verifier(&self, config: VerificationConfig) -> IdTokenVerifier {
        IdTokenVerifier::new(Arc::clone(&self.key_set), config, self.issuer.clone())
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn authorization_endpoint(&self) -> &str {
        &self.authorization_endpoint
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub fn key_set(&self) -> &Arc<KeySet> {
        &self.key_set
    }
}

/// Fetch and check the discovery document for `issuer`.
pub async fn fetch_discovery(issuer: &str, http_client: &reqwest::Client) -> Result<DiscoveryDocument> {
    let discovery_url = format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    );

    debug!(url = %discovery_url, "Fetching OIDC discovery document");

    let response = http_client
        .get(&discovery_url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| OidcError::Discovery(format!("failed to fetch {}: {}", discovery_url, e)))?;

    if !response.status().is_success() {
        return Err(OidcError::Discovery(format!(
            "{} returned status {}",
            discovery_url,
            response.status()
        )));
    }

    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| OidcError::Discovery(format!("invalid discovery document: {}", e)))?;

    if document.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(OidcError::Discovery(format!(
            "issuer did not match the issuer returned by provider, expected {:?} got {:?}",
            issuer, document.issuer
        )));
    }

    Ok(document)
}
