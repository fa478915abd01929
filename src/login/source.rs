//! Token acquisition: cache lookup, verification, silent refresh and
//! interactive browser login.

use anyhow::Context;
use std::future::Future;
use std::process::Command;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::callback::CallbackServer;
use super::config::{Config, OidcConfig};
use super::exchange::{exchange_code, refresh};
use super::token::{Token, TokenCache};
use crate::error::{OidcError, Result};
use crate::oidc::{Client, IdTokenVerifier, VerificationConfig, Verifier};

/// Opens the authorization URL for the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Opens URLs with the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        let mut command = open_command(url);
        command
            .spawn()
            .with_context(|| format!("failed to run {:?}", command.get_program()))?;
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn open_command(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(windows)]
fn open_command(url: &str) -> Command {
    let mut command = Command::new("rundll32");
    command.args(["url.dll,FileProtocolHandler", url]);
    command
}

#[cfg(not(any(target_os = "macos", windows)))]
fn open_command(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}

/// Source of nonce and state values.
pub trait RandomTokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 16 random bytes, hex encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomHex;

impl RandomTokenGenerator for RandomHex {
    fn generate(&self) -> String {
        hex::encode(rand::random::<[u8; 16]>())
    }
}

enum Acquired {
    /// Cached token that passed verification; nothing to persist.
    Cached(Token),
    New(Token),
}

/// Obtains tokens for one client, caching them through a [`TokenCache`].
///
/// The session nonce is drawn once at construction. Every authorization
/// request made by this source carries it, and cached or refreshed ID Tokens
/// are only accepted when they echo it back, which ties them to a login
/// started by this source.
///
/// Calls to [`oidc_token`](Self::oidc_token) and
/// [`clear_id_token`](Self::clear_id_token) are serialized.
pub struct OidcTokenSource {
    config: Config,
    cache: Arc<dyn TokenCache>,
    client: Client,
    callback: CallbackServer,
    browser: Arc<dyn BrowserOpener>,
    generator: Arc<dyn RandomTokenGenerator>,
    nonce: String,
    lock: Mutex<()>,
}

impl OidcTokenSource {
    /// Discover the provider named by the cache's config and bind the
    /// callback listener.
    pub async fn new(cache: Arc<dyn TokenCache>, config: Config) -> Result<Self> {
        let oidc = cache.config();
        oidc.validate()?;
        let client = Client::discover(&oidc.provider).await?;
        let callback = CallbackServer::bind(&config.bind_address).await?;
        Ok(Self::with_parts(
            cache,
            config,
            client,
            callback,
            Arc::new(SystemBrowser),
            Arc::new(RandomHex),
        ))
    }

    pub fn with_parts(
        cache: Arc<dyn TokenCache>,
        config: Config,
        client: Client,
        callback: CallbackServer,
        browser: Arc<dyn BrowserOpener>,
        generator: Arc<dyn RandomTokenGenerator>,
    ) -> Self {
        let nonce = generator.generate();
        Self {
            config,
            cache,
            client,
            callback,
            browser,
            generator,
            nonce,
            lock: Mutex::new(()),
        }
    }

    /// Nonce this source binds its ID Tokens to.
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn redirect_url(&self) -> &str {
        self.callback.redirect_url()
    }

    /// Return a valid token, logging in through the browser when needed.
    pub async fn oidc_token(&self, cancel: &CancellationToken) -> Result<Token> {
        let _guard = tokio::select! {
            _ = cancel.cancelled() => return Err(OidcError::Cancelled),
            guard = self.lock.lock() => guard,
        };

        let oidc = self.cache.config();
        match self.acquire(&oidc, cancel).await? {
            Acquired::Cached(token) => Ok(token),
            Acquired::New(token) => {
                self.persist(&token)?;
                Ok(token)
            }
        }
    }

    /// Blank the cached ID Token, keeping access and refresh tokens.
    ///
    /// The next [`oidc_token`](Self::oidc_token) call then treats the ID
    /// Token as absent and refreshes.
    pub async fn clear_id_token(&self) -> Result<()> {
        let _guard = self.lock.lock().await;

        let Some(mut token) = self.cache.token().map_err(OidcError::Cache)? else {
            debug!("No cached token to clear");
            return Ok(());
        };
        token.id_token.clear();
        self.cache.save_token(&token).map_err(OidcError::Cache)?;
        info!("Cleared cached ID token");
        Ok(())
    }

    /// Authorization URL for `state`.
    ///
    /// Mandatory parameters come first, extra parameters follow in their
    /// configured order.
    pub fn auth_code_url(&self, oidc: &OidcConfig, state: &str) -> Result<String> {
        let mut url = Url::parse(self.client.authorization_endpoint()).map_err(|e| {
            OidcError::Configuration(format!(
                "invalid authorization endpoint {:?}: {}",
                self.client.authorization_endpoint(),
                e
            ))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &oidc.client_id)
                .append_pair("nonce", &self.nonce)
                .append_pair("redirect_uri", self.callback.redirect_url())
                .append_pair("response_type", "code")
                .append_pair("scope", &oidc.scopes.join(" "))
                .append_pair("state", state);
            for (key, value) in &self.config.extra_auth_request_params {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    /// Stop the callback listener.
    pub async fn close(&self) {
        self.callback.close().await;
    }

    async fn acquire(&self, oidc: &OidcConfig, cancel: &CancellationToken) -> Result<Acquired> {
        let cached = match self.cache.token() {
            Ok(Some(token)) => Some(token),
            Ok(None) => {
                debug!("No cached token");
                None
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Token cache lookup failed");
                None
            }
        };

        if let Some(cached) = cached {
            let verifier = self.verifier(oidc);
            let try_refresh = if cached.id_token.is_empty() {
                debug!("Cached token has no ID token");
                !cached.refresh_token.is_empty()
            } else {
                match cancellable(cancel, verifier.verify(&cached.id_token)).await {
                    Ok(_) => {
                        info!("Using cached token");
                        return Ok(Acquired::Cached(cached));
                    }
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) if e.is_nonce_mismatch() => {
                        debug!(error = %e, "Cached ID token belongs to another session");
                        !cached.refresh_token.is_empty()
                    }
                    Err(e) => {
                        info!(error = %e, "Cached ID token rejected");
                        false
                    }
                }
            };

            if try_refresh {
                match self
                    .silent_refresh(oidc, &verifier, &cached.refresh_token, cancel)
                    .await
                {
                    Ok(token) => return Ok(Acquired::New(token)),
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => warn!(error = %e, "Silent refresh failed"),
                }
            }
        }

        self.interactive_login(oidc, cancel).await.map(Acquired::New)
    }

    async fn silent_refresh(
        &self,
        oidc: &OidcConfig,
        verifier: &IdTokenVerifier,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Token> {
        info!("Refreshing token");
        let token = cancellable(cancel, refresh(&self.client, oidc, refresh_token)).await?;
        cancellable(cancel, verifier.verify(&token.id_token)).await?;
        info!("Token refreshed");
        Ok(token)
    }

    async fn interactive_login(&self, oidc: &OidcConfig, cancel: &CancellationToken) -> Result<Token> {
        let state = self.generator.generate();
        let auth_url = self.auth_code_url(oidc, &state)?;

        let pending = self.callback.expect_callback();
        info!(redirect_url = %self.callback.redirect_url(), "Starting interactive login");
        self.browser.open(&auth_url).map_err(OidcError::Browser)?;

        let params = pending.wait(cancel).await?;
        if params.state != state {
            return Err(OidcError::Callback(
                "state in redirect does not match the login request".to_string(),
            ));
        }
        debug!("Authorization code received");

        cancellable(
            cancel,
            exchange_code(&self.client, oidc, &params.code, self.callback.redirect_url()),
        )
        .await
    }

    fn persist(&self, token: &Token) -> Result<()> {
        self.cache.save_token(token).map_err(OidcError::Cache)?;
        info!("Token saved to cache");
        Ok(())
    }

    fn verifier(&self, oidc: &OidcConfig) -> IdTokenVerifier {
        let mut config = VerificationConfig::new(oidc.client_id.clone());
        if self.config.nonce_check {
            config = config.with_nonce(self.nonce.clone());
        }
        self.client.verifier(config)
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(OidcError::Cancelled),
        result = fut => result,
    }
}
