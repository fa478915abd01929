//! ID Token verification configuration.

use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime of a fetched JWKS before it is fetched again.
pub const DEFAULT_KEY_SET_TTL: Duration = Duration::from_secs(300);

/// Source of the current time, injected so expiry checks are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Configuration for an [`IdTokenVerifier`](super::IdTokenVerifier).
#[derive(Clone)]
pub struct VerificationConfig {
    /// Expected audience. Usually the id of the client that started the login.
    /// Verification fails with a configuration error when this is empty.
    pub client_id: String,

    /// Expected `nonce` claim. Not checked when `None`.
    pub claim_nonce: Option<String>,

    /// Algorithms a signature may use. Empty means RS256 only.
    pub supported_signing_algs: Vec<Algorithm>,

    /// Clock used for the expiry check.
    pub clock: Arc<dyn Clock>,
}

impl VerificationConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.claim_nonce = Some(nonce.into());
        self
    }

    pub fn with_algorithms(mut self, algs: Vec<Algorithm>) -> Self {
        self.supported_signing_algs = algs;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Allowed algorithms with the RS256 default applied.
    pub(crate) fn effective_algorithms(&self) -> Vec<Algorithm> {
        if self.supported_signing_algs.is_empty() {
            vec![Algorithm::RS256]
        } else {
            self.supported_signing_algs.clone()
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            claim_nonce: None,
            supported_signing_algs: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for VerificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationConfig")
            .field("client_id", &self.client_id)
            .field("claim_nonce", &self.claim_nonce)
            .field("supported_signing_algs", &self.supported_signing_algs)
            .finish()
    }
}
