//! Login configuration.

use serde::{Deserialize, Serialize};

use crate::error::{OidcError, Result};
use crate::oidc::SCOPE_OPENID;

/// Address the callback listener binds to when none is configured.
pub const DEFAULT_BIND_ADDRESS: &str = "http://127.0.0.1:8085/callback";

/// Provider and client registration, carried by the token cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcConfig {
    /// Issuer URL of the provider.
    pub provider: String,

    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_scopes() -> Vec<String> {
    vec![SCOPE_OPENID.to_string()]
}

impl OidcConfig {
    pub fn new(provider: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            client_id: client_id.into(),
            client_secret: String::new(),
            scopes: default_scopes(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(OidcError::Configuration("provider must be provided".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(OidcError::Configuration("client id must be provided".to_string()));
        }
        Ok(())
    }
}

/// Token source behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Bind cached and refreshed ID Tokens to this source's session nonce.
    #[serde(default = "default_nonce_check")]
    pub nonce_check: bool,

    /// Extra authorization request parameters, appended in this order.
    #[serde(default)]
    pub extra_auth_request_params: Vec<(String, String)>,

    /// Callback URL the local listener binds to. Port 0 picks a free port.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_nonce_check() -> bool {
    true
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nonce_check: default_nonce_check(),
            extra_auth_request_params: Vec::new(),
            bind_address: default_bind_address(),
        }
    }
}
