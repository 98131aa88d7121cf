//! Gate configuration.
//!
//! The configuration is handed to the gate once at startup by whatever
//! provisions the identity provider. It never changes for the lifetime of
//! the process, and every required field must be present and non-empty
//! before the first request is classified.

use oauth2::{ClientId, ClientSecret};
use reqwest::Url;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the OIDC session gate.
///
/// Field names match the environment variables the deployment exports
/// (`IDENTITY_DOMAIN`, `CLIENT_ID`, `CLIENT_SECRET`, `TOKEN_REDIRECT`,
/// `USER_POOL`, `AWS_REGION`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Host of the provider's hosted UI and OAuth2 endpoints (e.g. "auth.example.com").
    identity_domain: String,
    /// The OAuth2 client ID registered with the user pool.
    client_id: ClientId,
    /// The OAuth2 client secret.
    client_secret: ClientSecret,
    /// Where the provider sends the browser after login (the login path of this site).
    token_redirect: String,
    /// The user pool (tenant) identifier.
    user_pool: String,
    /// Region the user pool lives in.
    aws_region: String,
    /// Issuer override for providers that are not a Cognito user pool.
    #[serde(default)]
    issuer: Option<String>,
    /// Token endpoint override.
    #[serde(default)]
    token_url: Option<String>,
    /// Path that receives the authorization code.
    /// Default: "/login"
    #[serde(default = "default_login_path")]
    login_path: String,
    /// Bound on every upstream call (token endpoint, key set fetch).
    /// Default: 3000
    #[serde(default = "default_upstream_timeout_ms")]
    upstream_timeout_ms: u64,
    /// Whether issued cookies carry the Secure attribute.
    /// Only disable for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    secure_cookies: bool,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_upstream_timeout_ms() -> u64 {
    3000
}

fn default_secure_cookies() -> bool {
    true
}

impl AuthConfig {
    /// Creates a configuration with defaults for the optional fields.
    #[must_use]
    pub fn new(
        identity_domain: String,
        client_id: String,
        client_secret: String,
        token_redirect: String,
        user_pool: String,
        aws_region: String,
    ) -> Self {
        Self {
            identity_domain,
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            token_redirect,
            user_pool,
            aws_region,
            issuer: None,
            token_url: None,
            login_path: default_login_path(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            secure_cookies: default_secure_cookies(),
        }
    }

    /// Overrides the issuer derived from region and user pool.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Overrides the token endpoint derived from the identity domain.
    #[must_use]
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    /// Sets the path that receives the authorization code.
    #[must_use]
    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Sets the upstream call timeout.
    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets whether cookies carry the Secure attribute.
    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Returns the identity domain.
    #[must_use]
    pub fn identity_domain(&self) -> &str {
        &self.identity_domain
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &ClientSecret {
        &self.client_secret
    }

    /// Returns the post-login redirect URI.
    #[must_use]
    pub fn token_redirect(&self) -> &str {
        &self.token_redirect
    }

    /// Returns the user pool identifier.
    #[must_use]
    pub fn user_pool(&self) -> &str {
        &self.user_pool
    }

    /// Returns the expected `iss` claim of identity tokens.
    #[must_use]
    pub fn issuer(&self) -> String {
        match &self.issuer {
            Some(issuer) => issuer.trim_end_matches('/').to_string(),
            None => format!(
                "https://cognito-idp.{}.amazonaws.com/{}",
                self.aws_region,
                self.user_pool()
            ),
        }
    }

    /// Returns the OAuth2 token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        match &self.token_url {
            Some(url) => url.clone(),
            None => format!("https://{}/oauth2/token", self.identity_domain),
        }
    }

    /// Returns the path that receives the authorization code.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Returns the bound applied to every upstream call.
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Returns whether cookies carry the Secure attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    /// Builds the hosted login URL the browser is sent to when it has no
    /// usable credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity domain does not form a valid URL.
    pub fn hosted_login_url(&self) -> Result<Url, Report<ConfigError>> {
        let base = format!("https://{}/login", self.identity_domain);
        Url::parse_with_params(
            &base,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.token_redirect.as_str()),
            ],
        )
        .map_err(|e| {
            ConfigError::InvalidSetting {
                name: "identity_domain",
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Checks that every required setting is present and usable.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid setting.
    pub fn validate(&self) -> Result<(), Report<ConfigError>> {
        let required: [(&'static str, &str); 6] = [
            ("identity_domain", self.identity_domain.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.secret().as_str()),
            ("token_redirect", self.token_redirect.as_str()),
            ("user_pool", self.user_pool.as_str()),
            ("aws_region", self.aws_region.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingSetting { name }.into());
            }
        }

        Url::parse(&self.token_redirect).map_err(|e| ConfigError::InvalidSetting {
            name: "token_redirect",
            reason: e.to_string(),
        })?;
        Url::parse(&self.token_url()).map_err(|e| ConfigError::InvalidSetting {
            name: "token_url",
            reason: e.to_string(),
        })?;
        Url::parse(&self.issuer()).map_err(|e| ConfigError::InvalidSetting {
            name: "issuer",
            reason: e.to_string(),
        })?;

        if !self.login_path.starts_with('/') {
            return Err(ConfigError::InvalidSetting {
                name: "login_path",
                reason: format!("'{}' must start with '/'", self.login_path),
            }
            .into());
        }
        if self.upstream_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "upstream_timeout_ms",
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        self.hosted_login_url()?;
        Ok(())
    }
}
