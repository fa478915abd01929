//! OpenID Connect client library.
//!
//! - [`oidc`]: provider discovery, TTL-cached JSON Web Key Set and strict ID
//!   Token verification.
//! - [`login`]: a token source that serves tokens from a cache, refreshes
//!   them silently and falls back to a browser login with a local callback
//!   listener.
//! - [`authorize`]: bearer token authorization against a permissions claim.
//!
//! ```no_run
//! use std::sync::Arc;
//! use oidc_login::login::{Config, DiskTokenCache, OidcConfig, OidcTokenSource, DEFAULT_TOKEN_CACHE_PATH};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> oidc_login::Result<()> {
//! let oidc = OidcConfig::new("https://accounts.google.com", "my-client-id");
//! let cache = Arc::new(DiskTokenCache::new(oidc, DEFAULT_TOKEN_CACHE_PATH));
//! let source = OidcTokenSource::new(cache, Config::default()).await?;
//! let token = source.oidc_token(&CancellationToken::new()).await?;
//! println!("{}", token.access_token);
//! source.close().await;
//! # Ok(())
//! # }
//! ```

pub mod authorize;
pub mod error;
pub mod login;
pub mod oidc;

#[cfg(test)]
mod test_support;

pub use error::{OidcError, Result};
