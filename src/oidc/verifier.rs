//! ID Token verification.
//!
//! Checks run cheapest first: structure, issuer, audience and expiry are all
//! decided from the unverified payload, so a token failing any of them never
//! causes a JWKS fetch. The nonce is compared last, only once the signature
//! has been verified.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::config::VerificationConfig;
use super::jwks::KeySet;
use crate::error::{OidcError, Result};

const ISSUER_GOOGLE_ACCOUNTS: &str = "https://accounts.google.com";
const ISSUER_GOOGLE_ACCOUNTS_NO_SCHEME: &str = "accounts.google.com";

/// Anything that turns a raw ID Token into verified claims.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, raw_id_token: &str) -> Result<IdToken>;
}

/// Audience can be a single string or array of strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl From<Audience> for Vec<String> {
    fn from(aud: Audience) -> Self {
        match aud {
            Audience::None => Vec::new(),
            Audience::Single(s) => vec![s],
            Audience::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StandardClaims {
    #[serde(default)]
    iss: String,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    aud: Audience,
    /// NumericDate, which may carry a fractional part.
    #[serde(default)]
    exp: f64,
    #[serde(default)]
    nonce: String,
}

/// JOSE header. `alg` stays a string so unknown algorithms, `none`
/// included, are reported as unsupported rather than malformed.
#[derive(Debug, Deserialize)]
struct JoseHeader {
    #[serde(default)]
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Claims parsed from a verified ID Token.
#[derive(Debug, Clone)]
pub struct IdToken {
    pub issuer: String,
    pub subject: String,
    pub audience: Vec<String>,
    pub expiry: DateTime<Utc>,
    pub nonce: String,
    claims: Vec<u8>,
}

impl IdToken {
    /// Decode the raw payload into a caller-defined claims type.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.claims)
            .map_err(|e| OidcError::MalformedToken(format!("failed to unmarshal claims: {}", e)))
    }

    pub fn raw_claims(&self) -> &[u8] {
        &self.claims
    }
}

/// Verifies ID Tokens issued by one provider.
pub struct IdTokenVerifier {
    key_set: Arc<KeySet>,
    config: VerificationConfig,
    issuer: String,
}

impl IdTokenVerifier {
    pub fn new(key_set: Arc<KeySet>, config: VerificationConfig, issuer: impl Into<String>) -> Self {
        Self {
            key_set,
            config,
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Same key set and issuer, different configuration.
    pub fn with_config(&self, config: VerificationConfig) -> Self {
        Self {
            key_set: Arc::clone(&self.key_set),
            config,
            issuer: self.issuer.clone(),
        }
    }

    fn check_issuer(&self, got: &str) -> Result<()> {
        if got == self.issuer {
            return Ok(());
        }
        // Google has been seen to drop the scheme from its issuer claim.
        // No other provider gets this allowance.
        if self.issuer == ISSUER_GOOGLE_ACCOUNTS && got == ISSUER_GOOGLE_ACCOUNTS_NO_SCHEME {
            return Ok(());
        }
        Err(OidcError::IssuerMismatch {
            expected: self.issuer.clone(),
            got: got.to_string(),
        })
    }
}

#[async_trait]
impl Verifier for IdTokenVerifier {
    async fn verify(&self, raw_id_token: &str) -> Result<IdToken> {
        let parts: Vec<&str> = raw_id_token.split('.').collect();
        if parts.len() < 2 {
            return Err(OidcError::MalformedToken(format!(
                "expected 3 parts got {}",
                parts.len()
            )));
        }

        let payload = decode_segment(parts[1])?;
        let standard: StandardClaims = serde_json::from_slice(&payload)
            .map_err(|e| OidcError::MalformedToken(format!("failed to unmarshal claims: {}", e)))?;

        if parts.len() != 3 {
            return Err(OidcError::MalformedToken(format!(
                "expected 3 parts got {}",
                parts.len()
            )));
        }
        let header: JoseHeader = decode_segment(parts[0])
            .and_then(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| OidcError::MalformedToken(format!("invalid header: {}", e)))
            })?;

        self.check_issuer(&standard.iss)?;

        if self.config.client_id.is_empty() {
            return Err(OidcError::Configuration("client id must be provided".to_string()));
        }
        let audience: Vec<String> = standard.aud.into();
        if !audience.iter().any(|a| a == &self.config.client_id) {
            return Err(OidcError::AudienceMismatch {
                expected: self.config.client_id.clone(),
                got: audience,
            });
        }

        let expiry = DateTime::<Utc>::from_timestamp(standard.exp.trunc() as i64, 0).unwrap_or_default();
        if expiry <= self.config.clock.now() {
            return Err(OidcError::Expired { expiry });
        }

        let allowed = self.config.effective_algorithms();
        let alg = match Algorithm::from_str(&header.alg) {
            Ok(alg) if allowed.contains(&alg) => alg,
            _ => {
                return Err(OidcError::UnsupportedAlgorithm {
                    expected: allowed.iter().map(|a| format!("{:?}", a)).collect(),
                    got: vec![header.alg],
                })
            }
        };

        let all_keys = self.key_set.keys().await?;
        let candidates: Vec<_> = all_keys
            .iter()
            .filter(|k| k.common.key_id == header.kid)
            .collect();
        if candidates.is_empty() {
            return Err(OidcError::NoMatchingKey {
                kid: header.kid,
                available: all_keys.iter().map(|k| k.common.key_id.clone()).collect(),
            });
        }

        let message = format!("{}.{}", parts[0], parts[1]);
        let signature = parts[2];
        let mut errors = Vec::new();
        let mut verified: Option<&str> = None;
        for key in candidates {
            let kid = key.common.key_id.as_deref().unwrap_or("<none>");
            let decoding_key = match DecodingKey::from_jwk(key) {
                Ok(k) => k,
                Err(e) => {
                    errors.push(format!("key {}: {}", kid, e));
                    continue;
                }
            };
            match jsonwebtoken::crypto::verify(signature, message.as_bytes(), &decoding_key, alg) {
                Ok(true) => {
                    debug!(kid = %kid, "ID token signature verified");
                    verified = Some(message.as_str());
                    break;
                }
                Ok(false) => errors.push(format!("key {}: invalid signature", kid)),
                Err(e) => errors.push(format!("key {}: {}", kid, e)),
            }
        }
        let Some(signed) = verified else {
            return Err(OidcError::SignatureVerificationFailed { errors });
        };

        let signed_payload = signed
            .split('.')
            .nth(1)
            .map(decode_segment)
            .transpose()?
            .unwrap_or_default();
        if signed_payload != payload {
            return Err(OidcError::InternalPayloadMismatch);
        }

        if let Some(expected) = self.config.claim_nonce.as_deref().filter(|n| !n.is_empty()) {
            if standard.nonce != expected {
                return Err(OidcError::NonceMismatch {
                    expected: expected.to_string(),
                    got: standard.nonce,
                });
            }
        }

        Ok(IdToken {
            issuer: standard.iss,
            subject: standard.sub,
            audience,
            expiry,
            nonce: standard.nonce,
            claims: payload,
        })
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| OidcError::MalformedToken(format!("invalid base64 segment: {}", e)))
}
