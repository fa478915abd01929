//! Bearer token authorization.
//!
//! Verifies presented ID Tokens and checks the permissions they carry.

pub mod authorizer;
pub mod condition;
pub mod config;

pub use authorizer::{is_request_authorized, Authorizer, OidcAuthorizer};
pub use condition::PermCondition;
pub use config::AuthorizerConfig;
