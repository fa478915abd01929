//! Bearer token authorization against a permissions claim.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::condition::PermCondition;
use super::config::AuthorizerConfig;
use crate::error::{OidcError, Result};
use crate::oidc::{Client, VerificationConfig, Verifier};

/// Decides whether a bearer token grants access.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Ok(())` when the token's holder is authorized.
    async fn is_authorized(&self, token: &str) -> Result<()>;
}

/// Authorizer verifying ID Tokens and checking a permissions claim.
pub struct OidcAuthorizer {
    verifier: Arc<dyn Verifier>,
    perms_claim: String,
    perm_condition: PermCondition,
}

impl OidcAuthorizer {
    /// Discover the configured provider and verify tokens issued for
    /// `client_id`.
    pub async fn new(config: AuthorizerConfig) -> Result<Self> {
        let client = Client::discover(&config.provider).await.map_err(|e| {
            OidcError::Configuration(format!(
                "failed to create OIDC client against {:?} provider: {}",
                config.provider, e
            ))
        })?;
        let verifier = client.verifier(VerificationConfig::new(config.client_id.clone()));
        Ok(Self::with_verifier(Arc::new(verifier), config))
    }

    pub fn with_verifier(verifier: Arc<dyn Verifier>, config: AuthorizerConfig) -> Self {
        info!(
            perms_claim = %config.perms_claim,
            condition = %config.perm_condition,
            "Authorizer initialized"
        );
        Self {
            verifier,
            perms_claim: config.perms_claim,
            perm_condition: config.perm_condition,
        }
    }
}

#[async_trait]
impl Authorizer for OidcAuthorizer {
    async fn is_authorized(&self, token: &str) -> Result<()> {
        let id_token = self.verifier.verify(token).await.map_err(|e| {
            OidcError::Unauthenticated(format!("Unauthenticated. Verification failed. Err: {}", e))
        })?;

        let claims: Map<String, Value> = id_token.claims()?;
        let perms = permissions(&claims, &self.perms_claim)?;

        if self.perm_condition.is_satisfied_by(&perms) {
            debug!(subject = %id_token.subject, "Authorized");
            return Ok(());
        }

        info!(
            subject = %id_token.subject,
            perms = ?perms,
            condition = %self.perm_condition,
            "Authorization denied"
        );
        Err(OidcError::Unauthorized(format!(
            "Unauthorized. User {:?} has permissions {:?} and needs to have permissions {}.",
            id_token.subject, perms, self.perm_condition
        )))
    }
}

/// The `claim` entry of `claims`, which must be a list of strings.
fn permissions(claims: &Map<String, Value>, claim: &str) -> Result<Vec<String>> {
    let value = claims
        .get(claim)
        .ok_or_else(|| OidcError::UnexpectedClaimShape {
            claim: claim.to_string(),
            reason: "claim is missing".to_string(),
        })?;
    Vec::<String>::deserialize(value).map_err(|e| OidcError::UnexpectedClaimShape {
        claim: claim.to_string(),
        reason: format!("expected a list of strings: {}", e),
    })
}

/// Authorize `request` with the bearer token in header `header_name`.
pub async fn is_request_authorized<B>(
    request: &http::Request<B>,
    authorizer: &dyn Authorizer,
    header_name: &str,
) -> Result<()> {
    let value = request
        .headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        return Err(OidcError::Unauthenticated(format!(
            "Unauthenticated. No {} header.",
            header_name
        )));
    }

    let mut parts = value.split(' ');
    let token = match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => token,
        _ => {
            return Err(OidcError::Unauthenticated(format!(
                "Unauthenticated. {} header does not have Bearer format.",
                header_name
            )))
        }
    };

    authorizer.is_authorized(token).await
}
