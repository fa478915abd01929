//! Error taxonomy for verification, login and authorization.

use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, OidcError>;

/// Every failure the crate can surface.
///
/// Verification kinds are never retried by the verifier itself; the token
/// source decides between silent refresh and interactive login by kind.
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("oidc: malformed jwt: {0}")]
    MalformedToken(String),

    #[error("oidc: id token issued by a different provider, expected {expected:?} got {got:?}")]
    IssuerMismatch { expected: String, got: String },

    #[error("oidc: expected audience {expected:?} got {got:?}")]
    AudienceMismatch { expected: String, got: Vec<String> },

    #[error("oidc: token is expired (token expiry: {expiry})")]
    Expired { expiry: chrono::DateTime<chrono::Utc> },

    #[error("oidc: no signatures use a supported algorithm, expected {expected:?} got {got:?}")]
    UnsupportedAlgorithm { expected: Vec<String>, got: Vec<String> },

    #[error("oidc: no keys match signature ID {kid:?}, got keys: {available:?}")]
    NoMatchingKey {
        kid: Option<String>,
        available: Vec<Option<String>>,
    },

    /// Every per-key failure is kept, in the order the keys were tried.
    #[error("oidc: failed to verify id token: {}", .errors.join("; "))]
    SignatureVerificationFailed { errors: Vec<String> },

    #[error("oidc: internal error, payload parsed did not match previous payload")]
    InternalPayloadMismatch,

    #[error("oidc: nonce mismatch, got {got:?}, expected {expected:?}")]
    NonceMismatch { expected: String, got: String },

    #[error("oidc: invalid configuration: {0}")]
    Configuration(String),

    #[error("oidc: callback error: {0}")]
    Callback(String),

    #[error("Failed to obtain new token. Err: {0}")]
    TokenExchange(String),

    #[error("oidc: token cache error: {0:#}")]
    Cache(#[source] anyhow::Error),

    #[error("oidc: failed to open browser: {0:#}")]
    Browser(#[source] anyhow::Error),

    #[error("oidc: discovery failed: {0}")]
    Discovery(String),

    #[error("oidc: http request failed: {0}")]
    Http(String),

    #[error("oidc: operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("oidc: unexpected shape of claim {claim:?}: {reason}")]
    UnexpectedClaimShape { claim: String, reason: String },
}

impl OidcError {
    pub fn is_nonce_mismatch(&self) -> bool {
        matches!(self, Self::NonceMismatch { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for any failure raised by ID Token verification.
    pub fn is_verification(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::IssuerMismatch { .. }
                | Self::AudienceMismatch { .. }
                | Self::Expired { .. }
                | Self::UnsupportedAlgorithm { .. }
                | Self::NoMatchingKey { .. }
                | Self::SignatureVerificationFailed { .. }
                | Self::InternalPayloadMismatch
                | Self::NonceMismatch { .. }
        )
    }
}

impl From<reqwest::Error> for OidcError {
    fn from(e: reqwest::Error) -> Self {
        OidcError::Http(e.to_string())
    }
}
