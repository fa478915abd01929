//! Local HTTP listener receiving the provider's authorization redirect.
//!
//! The listener binds once and serves for its whole lifetime, but hands a
//! redirect only to the login flow that armed it through
//! [`CallbackServer::expect_callback`]. One login at a time is assumed;
//! concurrent logins would need waiters keyed by `state`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::html::{DEFAULT_ERR_CALLBACK_HTML, DEFAULT_OK_CALLBACK_HTML};
use crate::error::{OidcError, Result};

/// Parameters carried by a successful redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

type Waiter = oneshot::Sender<Result<CallbackParams>>;

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Clone)]
struct CallbackState {
    waiter: Arc<Mutex<Option<Waiter>>>,
    ok_html: Arc<str>,
    err_html: Arc<str>,
}

/// Listener bound to the redirect URL.
pub struct CallbackServer {
    redirect_url: String,
    waiter: Arc<Mutex<Option<Waiter>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CallbackServer {
    /// Bind to the host, port and path of `bind_url`, serving the default pages.
    pub async fn bind(bind_url: &str) -> Result<Self> {
        Self::bind_with_pages(bind_url, DEFAULT_OK_CALLBACK_HTML, DEFAULT_ERR_CALLBACK_HTML).await
    }

    pub async fn bind_with_pages(bind_url: &str, ok_html: &str, err_html: &str) -> Result<Self> {
        let mut url = Url::parse(bind_url)
            .map_err(|e| OidcError::Configuration(format!("invalid bind address {:?}: {}", bind_url, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| OidcError::Configuration(format!("bind address {:?} has no host", bind_url)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().unwrap_or(0);

        let listener = TcpListener::bind((host.as_str(), port)).await.map_err(|e| {
            OidcError::Configuration(format!("failed to bind callback listener on {}:{}: {}", host, port, e))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| OidcError::Configuration(format!("callback listener address: {}", e)))?;
        url.set_port(Some(local_addr.port()))
            .map_err(|_| OidcError::Configuration(format!("cannot set port on {:?}", bind_url)))?;

        let waiter = Arc::new(Mutex::new(None));
        let state = CallbackState {
            waiter: Arc::clone(&waiter),
            ok_html: Arc::from(ok_html),
            err_html: Arc::from(err_html),
        };
        let app = Router::new()
            .route(url.path(), get(handle_callback))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "Callback listener stopped with error");
            }
        });

        info!(redirect_url = %url, "Callback listener started");

        Ok(Self {
            redirect_url: url.to_string(),
            waiter,
            shutdown: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// The redirect URL with the port actually bound.
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// Arm the listener for the next redirect.
    ///
    /// A waiter armed earlier and never completed is replaced.
    pub fn expect_callback(&self) -> PendingCallback {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut waiter) = self.waiter.lock() {
            *waiter = Some(tx);
        }
        PendingCallback { rx }
    }

    /// Stop the listener and wait for it to finish.
    pub async fn close(&self) {
        let shutdown = self.shutdown.lock().ok().and_then(|mut s| s.take());
        if let Some(tx) = shutdown {
            let _ = tx.send(());
        }
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            let _ = handle.await;
            info!(redirect_url = %self.redirect_url, "Callback listener stopped");
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.get_mut().ok().and_then(|s| s.take()) {
            let _ = tx.send(());
        }
    }
}

/// A redirect the login flow is waiting for.
pub struct PendingCallback {
    rx: oneshot::Receiver<Result<CallbackParams>>,
}

impl PendingCallback {
    /// Wait for the redirect, or until `cancel` fires.
    pub async fn wait(self, cancel: &CancellationToken) -> Result<CallbackParams> {
        tokio::select! {
            _ = cancel.cancelled() => Err(OidcError::Cancelled),
            received = self.rx => received.unwrap_or_else(|_| {
                Err(OidcError::Callback("callback listener stopped".to_string()))
            }),
        }
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, Html<String>) {
    let waiter = state.waiter.lock().ok().and_then(|mut w| w.take());
    let Some(waiter) = waiter.filter(|w| !w.is_closed()) else {
        warn!("Redirect received while no login is in progress");
        return (StatusCode::CONFLICT, Html(state.err_html.to_string()));
    };

    let result = match query {
        CallbackQuery {
            error: Some(error),
            error_description,
            ..
        } => Err(OidcError::Callback(format!(
            "provider returned error {:?}: {}",
            error,
            error_description.unwrap_or_default()
        ))),
        CallbackQuery {
            code: Some(code),
            state: Some(callback_state),
            ..
        } if !code.is_empty() && !callback_state.is_empty() => Ok(CallbackParams {
            code,
            state: callback_state,
        }),
        _ => Err(OidcError::Callback("redirect is missing code or state".to_string())),
    };

    let status = if result.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    if waiter.send(result).is_err() {
        warn!("Login flow stopped waiting before the redirect arrived");
        return (StatusCode::CONFLICT, Html(state.err_html.to_string()));
    }
    if status == StatusCode::OK {
        debug!("Authorization redirect received");
        (status, Html(state.ok_html.to_string()))
    } else {
        (status, Html(state.err_html.to_string()))
    }
}
