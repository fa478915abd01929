//! Interactive login and token caching.
//!
//! [`OidcTokenSource`] hands out tokens from a [`TokenCache`], refreshing
//! them silently when it can and falling back to a browser login with a
//! local callback listener when it cannot.

pub mod callback;
pub mod config;
pub mod disk;
pub mod exchange;
pub mod html;
pub mod source;
pub mod token;

pub use callback::{CallbackParams, CallbackServer, PendingCallback};
pub use config::{Config, OidcConfig, DEFAULT_BIND_ADDRESS};
pub use disk::{DiskTokenCache, DEFAULT_TOKEN_CACHE_PATH};
pub use exchange::{exchange_code, refresh};
pub use html::{DEFAULT_ERR_CALLBACK_HTML, DEFAULT_OK_CALLBACK_HTML};
pub use source::{BrowserOpener, OidcTokenSource, RandomHex, RandomTokenGenerator, SystemBrowser};
pub use token::{Token, TokenCache, TokenResponse};
