//! JWKS (JSON Web Key Set) fetching and TTL caching.

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet, PublicKeyUse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{OidcError, Result};

/// Where signing keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet>;
}

/// Fetches the provider's JWKS document over HTTP.
pub struct RemoteKeySource {
    /// JWKS endpoint URL
    jwks_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl RemoteKeySource {
    pub fn new(jwks_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            http_client,
        }
    }
}

#[async_trait]
impl KeySource for RemoteKeySource {
    async fn fetch(&self) -> Result<JwkSet> {
        debug!(url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| OidcError::Http(format!("failed to fetch JWKS from {}: {}", self.jwks_url, e)))?;

        if !response.status().is_success() {
            return Err(OidcError::Http(format!(
                "JWKS endpoint {} returned status {}",
                self.jwks_url,
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| OidcError::Http(format!("failed to parse JWKS from {}: {}", self.jwks_url, e)))
    }
}

struct CachedKeys {
    keys: Arc<Vec<Jwk>>,
    fetched_at: Instant,
}

/// Signing keys cached for a fixed TTL.
///
/// The cache entry sits behind one async mutex held across the fetch, so
/// concurrent callers wait for a single fetch and never see a partial key list.
pub struct KeySet {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    cache: Mutex<Option<CachedKeys>>,
}

impl KeySet {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Key set backed by a remote JWKS endpoint.
    pub fn remote(jwks_url: impl Into<String>, http_client: reqwest::Client, ttl: Duration) -> Self {
        Self::new(Arc::new(RemoteKeySource::new(jwks_url, http_client)), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current signing keys, fetched again once the cached set is `ttl` old.
    pub async fn keys(&self) -> Result<Arc<Vec<Jwk>>> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.keys));
            }
        }

        let jwks = self.source.fetch().await?;

        // Encryption keys never verify signatures.
        let keys: Vec<Jwk> = jwks
            .keys
            .into_iter()
            .filter(|k| !matches!(k.common.public_key_use, Some(PublicKeyUse::Encryption)))
            .collect();
        let keys = Arc::new(keys);

        info!(key_count = keys.len(), "JWKS cache refreshed");

        *cache = Some(CachedKeys {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }
}
