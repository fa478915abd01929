//! Token endpoint calls: authorization code exchange and refresh.

use tracing::{debug, warn};
use url::form_urlencoded;

use super::config::OidcConfig;
use super::token::{Token, TokenResponse};
use crate::error::{OidcError, Result};
use crate::oidc::Client;

/// Exchange an authorization code for a token.
pub async fn exchange_code(
    client: &Client,
    config: &OidcConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<Token> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    let response = request_token(client, config, &form).await?;
    into_token(response, None)
}

/// Obtain a fresh token with `refresh_token`.
///
/// The old refresh token is kept when the provider does not rotate it.
pub async fn refresh(client: &Client, config: &OidcConfig, refresh_token: &str) -> Result<Token> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    let response = request_token(client, config, &form).await?;
    into_token(response, Some(refresh_token))
}

async fn request_token(
    client: &Client,
    config: &OidcConfig,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    debug!(
        token_endpoint = %client.token_endpoint(),
        grant_type = form.first().map(|(_, v)| *v).unwrap_or_default(),
        "Requesting token"
    );

    // RFC 6749 2.3.1: credentials are form-urlencoded before basic auth.
    let client_id: String = form_urlencoded::byte_serialize(config.client_id.as_bytes()).collect();
    let client_secret: String =
        form_urlencoded::byte_serialize(config.client_secret.as_bytes()).collect();

    let response = client
        .http_client()
        .post(client.token_endpoint())
        .basic_auth(client_id, Some(client_secret))
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| OidcError::TokenExchange(format!("token request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OidcError::TokenExchange(format!("failed to read token response: {}", e)))?;

    if !status.is_success() {
        warn!(status = %status, "Token endpoint rejected request");
        return Err(OidcError::TokenExchange(format!(
            "cannot fetch token: {}\nResponse: {}",
            status, body
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| OidcError::TokenExchange(format!("invalid token response: {}", e)))
}

fn into_token(response: TokenResponse, previous_refresh_token: Option<&str>) -> Result<Token> {
    if response.access_token.is_empty() {
        return Err(OidcError::TokenExchange(
            "token response has no access_token".to_string(),
        ));
    }
    let id_token = match response.id_token {
        Some(id_token) if !id_token.is_empty() => id_token,
        _ => {
            return Err(OidcError::TokenExchange(
                "token response has no id_token".to_string(),
            ))
        }
    };
    let refresh_token = response
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous_refresh_token.map(str::to_string))
        .unwrap_or_default();

    Ok(Token {
        access_token: response.access_token,
        refresh_token,
        id_token,
    })
}
