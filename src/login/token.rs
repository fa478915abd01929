//! Token types and the token cache contract.

use serde::{Deserialize, Serialize};

use super::config::OidcConfig;

/// Access, refresh and ID Token triple as issued by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub id_token: String,
}

/// Token endpoint response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Storage for the current token.
///
/// `token` returns `Ok(None)` when nothing is stored; an `Err` is a lookup
/// failure.
pub trait TokenCache: Send + Sync {
    fn token(&self) -> anyhow::Result<Option<Token>>;

    fn save_token(&self, token: &Token) -> anyhow::Result<()>;

    fn config(&self) -> OidcConfig;
}
