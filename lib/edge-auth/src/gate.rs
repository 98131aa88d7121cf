//! Request classification.
//!
//! Every request is sorted into exactly one authentication case, evaluated
//! in order with the first match winning:
//!
//! 1. login callback carrying an authorization code
//! 2. login page without a code
//! 3. a valid identity token cookie
//! 4. a refresh token cookie that can be exchanged for new tokens
//! 5. nothing usable, so send the browser to the identity provider
//!
//! Each case returns a [`Step`]; `Continue` hands the request to the next
//! case. Upstream failures never reach the client as errors.

use axum::http::{HeaderMap, Uri};
use axum_extra::extract::cookie::Cookie;
use oauth2::{AuthorizationCode, RefreshToken};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::AuthConfig;
use crate::cookies::{CookieIssuer, SessionCookies};
use crate::error::ConfigError;
use crate::exchange::TokenExchanger;
use crate::jwks::{JwksCache, SigningKeySource};
use crate::validate::IdTokenValidator;

/// The parts of an inbound request the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    uri: &'a Uri,
    headers: &'a HeaderMap,
}

impl<'a> AuthRequest<'a> {
    #[must_use]
    pub fn new(uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self { uri, headers }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path and query exactly as requested.
    #[must_use]
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.headers
    }

    /// Returns the first `code` query parameter, if it is non-empty.
    fn authorization_code(&self) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "code")
            .map(|(_, code)| code.into_owned())
            .filter(|code| !code.is_empty())
    }
}

/// What to do with a request.
#[derive(Debug)]
pub enum Decision {
    /// Let the request through unmodified.
    Allow,
    /// Redirect with 307, attaching every cookie to the same response.
    RedirectWithCookies {
        location: String,
        cookies: Vec<Cookie<'static>>,
    },
    /// Redirect with 303 to the identity provider's hosted login.
    RedirectToProvider { location: String },
}

/// Outcome of evaluating one case.
#[derive(Debug)]
enum Step {
    Decided(Decision),
    Continue,
}

/// Stateless OIDC session gate.
///
/// Holds only immutable configuration and the shared key set source, so one
/// instance serves any number of concurrent requests.
#[derive(Debug)]
pub struct Gatekeeper {
    config: AuthConfig,
    hosted_login_url: String,
    cookies: CookieIssuer,
    validator: IdTokenValidator,
    exchanger: TokenExchanger,
}

impl Gatekeeper {
    /// Creates a gate that fetches signing keys from the issuer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or invalid.
    pub fn new(config: AuthConfig) -> Result<Self, Report<ConfigError>> {
        let http_client = upstream_client(&config)?;
        let keys = Arc::new(JwksCache::new(http_client.clone()));
        Self::build(config, http_client, keys)
    }

    /// Creates a gate with a caller-provided key source.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or invalid.
    pub fn with_key_source(
        config: AuthConfig,
        keys: Arc<dyn SigningKeySource>,
    ) -> Result<Self, Report<ConfigError>> {
        let http_client = upstream_client(&config)?;
        Self::build(config, http_client, keys)
    }

    fn build(
        config: AuthConfig,
        http_client: reqwest::Client,
        keys: Arc<dyn SigningKeySource>,
    ) -> Result<Self, Report<ConfigError>> {
        config.validate()?;

        let hosted_login_url = config.hosted_login_url()?.to_string();
        let validator =
            IdTokenValidator::new(config.issuer(), config.client_id().as_str().to_string(), keys);
        let exchanger = TokenExchanger::new(&config, http_client);

        Ok(Self {
            cookies: CookieIssuer::new(config.secure_cookies()),
            config,
            hosted_login_url,
            validator,
            exchanger,
        })
    }

    /// Returns the configuration the gate was built with.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Classifies a request and decides what to do with it.
    #[instrument(skip_all, fields(path = %request.path()))]
    pub async fn decide(&self, request: &AuthRequest<'_>) -> Decision {
        if let Step::Decided(decision) = self.login_callback(request).await {
            return decision;
        }
        if let Step::Decided(decision) = self.login_page(request) {
            return decision;
        }

        let session = SessionCookies::from_headers(request.headers());
        if let Step::Decided(decision) = self.authenticated(&session).await {
            return decision;
        }
        if let Step::Decided(decision) = self.refresh_session(request, &session).await {
            return decision;
        }

        self.redirect_to_provider()
    }

    fn is_login_path(&self, request: &AuthRequest<'_>) -> bool {
        request.path() == self.config.login_path()
    }

    async fn login_callback(&self, request: &AuthRequest<'_>) -> Step {
        if !self.is_login_path(request) {
            return Step::Continue;
        }
        let Some(code) = request.authorization_code() else {
            return Step::Continue;
        };

        match self
            .exchanger
            .exchange_code(&AuthorizationCode::new(code))
            .await
        {
            Ok(tokens) => {
                info!("authorization code exchanged, session established");
                self.learn_signing_key(&tokens.id_token).await;
                Step::Decided(Decision::RedirectWithCookies {
                    location: "/".to_string(),
                    cookies: vec![
                        self.cookies.id_token(tokens.id_token),
                        self.cookies.access_token(tokens.access_token.into_secret()),
                        self.cookies.refresh_token(tokens.refresh_token.into_secret()),
                    ],
                })
            }
            Err(report) => {
                // Serve the login page so the user can retry.
                warn!(error = %report, "authorization code exchange failed");
                Step::Decided(Decision::Allow)
            }
        }
    }

    fn login_page(&self, request: &AuthRequest<'_>) -> Step {
        if self.is_login_path(request) {
            Step::Decided(Decision::Allow)
        } else {
            Step::Continue
        }
    }

    async fn authenticated(&self, session: &SessionCookies) -> Step {
        let Some(id_token) = session.id_token.as_deref() else {
            return Step::Continue;
        };

        match self.validator.validate(id_token).await {
            Ok(claims) => {
                debug!(sub = %claims.sub, "identity token valid");
                Step::Decided(Decision::Allow)
            }
            Err(report) => {
                debug!(error = %report, "identity token not accepted");
                Step::Continue
            }
        }
    }

    async fn refresh_session(&self, request: &AuthRequest<'_>, session: &SessionCookies) -> Step {
        let Some(refresh_token) = session.refresh_token.clone() else {
            return Step::Continue;
        };

        match self
            .exchanger
            .refresh(&RefreshToken::new(refresh_token))
            .await
        {
            Ok(tokens) => {
                info!("session refreshed");
                self.learn_signing_key(&tokens.id_token).await;
                Step::Decided(Decision::RedirectWithCookies {
                    location: request.path_and_query().to_string(),
                    cookies: vec![
                        self.cookies.id_token(tokens.id_token),
                        self.cookies.access_token(tokens.access_token.into_secret()),
                    ],
                })
            }
            Err(report) => {
                warn!(error = %report, "refresh token exchange failed");
                Step::Continue
            }
        }
    }

    /// Validates a token the token endpoint just issued so that a rotated
    /// signing key is in the cache before the browser presents the token.
    /// The decision does not depend on the outcome.
    async fn learn_signing_key(&self, id_token: &str) {
        if let Err(report) = self.validator.validate_issued(id_token).await {
            warn!(error = %report, "token endpoint issued an identity token that does not validate");
        }
    }

    fn redirect_to_provider(&self) -> Decision {
        Decision::RedirectToProvider {
            location: self.hosted_login_url.clone(),
        }
    }
}

fn upstream_client(config: &AuthConfig) -> Result<reqwest::Client, Report<ConfigError>> {
    reqwest::Client::builder()
        .timeout(config.upstream_timeout())
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| {
            ConfigError::InvalidSetting {
                name: "upstream_timeout_ms",
                reason: format!("failed to create HTTP client: {e}"),
            }
            .into()
        })
}
