//! OAuth2 grants against the authorization server's token endpoint.
//!
//! Both grants POST a form-encoded body and authenticate the client with
//! HTTP Basic credentials. Neither touches local state; whether a grant can
//! be replayed is up to the authorization server (codes are single-use).

use axum::http::header::ACCEPT;
use oauth2::basic::BasicErrorResponse;
use oauth2::{AccessToken, AuthorizationCode, ClientId, ClientSecret, RefreshToken};
use rootcause::prelude::Report;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, instrument};

use crate::config::AuthConfig;
use crate::error::ExchangeError;

/// Tokens returned by the authorization-code grant.
#[derive(Clone, Deserialize)]
pub struct IssuedTokens {
    pub id_token: String,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

/// Tokens returned by the refresh-token grant.
///
/// The refresh token itself is not rotated.
#[derive(Clone, Deserialize)]
pub struct RefreshedTokens {
    pub id_token: String,
    pub access_token: AccessToken,
}

impl fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedTokens").finish_non_exhaustive()
    }
}

impl fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedTokens").finish_non_exhaustive()
    }
}

/// Client for the token endpoint.
#[derive(Clone)]
pub struct TokenExchanger {
    http_client: reqwest::Client,
    token_url: String,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_uri: String,
}

impl TokenExchanger {
    /// Creates an exchanger for the configured client.
    ///
    /// The HTTP client should carry the upstream timeout.
    #[must_use]
    pub fn new(config: &AuthConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            token_url: config.token_url(),
            client_id: config.client_id().clone(),
            client_secret: config.client_secret().clone(),
            redirect_uri: config.token_redirect().to_string(),
        }
    }

    /// Exchanges an authorization code for identity, access and refresh tokens.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &AuthorizationCode,
    ) -> Result<IssuedTokens, Report<ExchangeError>> {
        self.request(&[
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code.secret().as_str()),
        ])
        .await
    }

    /// Exchanges a refresh token for new identity and access tokens.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        refresh_token: &RefreshToken,
    ) -> Result<RefreshedTokens, Report<ExchangeError>> {
        self.request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.secret().as_str()),
        ])
        .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        form: &[(&str, &str)],
    ) -> Result<T, Report<ExchangeError>> {
        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(self.client_id.as_str(), Some(self.client_secret.secret()))
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(&e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "token endpoint responded");

        if !status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| ExchangeError::from_reqwest(&e))?;
            return Err(ExchangeError::Rejected {
                status: status.as_u16(),
                error: provider_error(&body),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::from_reqwest(&e))?;
        serde_json::from_slice(&body).map_err(|e| {
            ExchangeError::InvalidResponse {
                details: e.to_string(),
            }
            .into()
        })
    }
}

impl fmt::Debug for TokenExchanger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchanger")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Extracts the OAuth2 `error` code from an error body.
fn provider_error(body: &[u8]) -> String {
    match serde_json::from_slice::<BasicErrorResponse>(body) {
        Ok(response) => response.error().to_string(),
        Err(_) => "unrecognized_error_response".to_string(),
    }
}
