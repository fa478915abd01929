//! OpenID Connect provider access and ID Token verification.
//!
//! Provides discovery, a TTL-cached JSON Web Key Set and a verifier that
//! checks structure, claims and signature of ID Tokens.

pub mod config;
pub mod discovery;
pub mod jwks;
pub mod verifier;

pub use config::{Clock, SystemClock, VerificationConfig, DEFAULT_KEY_SET_TTL};
pub use discovery::{default_http_client, Client, DiscoveryDocument};
pub use jwks::{KeySet, KeySource, RemoteKeySource};
pub use verifier::{IdToken, IdTokenVerifier, Verifier};

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_EMAIL: &str = "email";
pub const SCOPE_PROFILE: &str = "profile";
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";
