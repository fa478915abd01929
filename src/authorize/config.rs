//! Authorizer configuration.

use serde::{Deserialize, Serialize};

use super::condition::PermCondition;

/// Bearer token authorization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizerConfig {
    /// Issuer URL of the provider.
    pub provider: String,

    /// Expected audience of presented tokens.
    pub client_id: String,

    /// Claim holding the user's permissions as a list of strings.
    #[serde(default = "default_perms_claim")]
    pub perms_claim: String,

    pub perm_condition: PermCondition,
}

fn default_perms_claim() -> String {
    "perms".to_string()
}

impl AuthorizerConfig {
    pub fn new(
        provider: impl Into<String>,
        client_id: impl Into<String>,
        perm_condition: PermCondition,
    ) -> Self {
        Self {
            provider: provider.into(),
            client_id: client_id.into(),
            perms_claim: default_perms_claim(),
            perm_condition,
        }
    }
}
