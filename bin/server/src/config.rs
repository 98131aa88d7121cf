//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! Site settings come from `SITEGATE_*` variables. The gate settings use
//! the unprefixed names the identity provider provisioning exports; see
//! [`AuthConfig`](sitegate_auth::AuthConfig).

use serde::Deserialize;
use sitegate_auth::AuthConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration composed from library configs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Where and what to serve.
    pub site: SiteConfig,

    /// OIDC session gate configuration.
    pub auth: AuthConfig,
}

/// Static site settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Directory holding the protected site.
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,

    /// File under `site_root` served at the gate's login path.
    #[serde(default = "default_login_page")]
    pub login_page: PathBuf,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_site_root() -> PathBuf {
    PathBuf::from("site")
}

fn default_login_page() -> PathBuf {
    PathBuf::from("login.html")
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            site_root: default_site_root(),
            login_page: default_login_page(),
        }
    }
}

impl SiteConfig {
    /// Path of the login page on disk.
    #[must_use]
    pub fn login_page_path(&self) -> PathBuf {
        self.site_root.join(&self.login_page)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from an explicit set of variables instead of the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, config::ConfigError> {
        Self::load(Some(vars))
    }

    fn load(vars: Option<HashMap<String, String>>) -> Result<Self, config::ConfigError> {
        let site = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SITEGATE")
                    .try_parsing(true)
                    .source(vars.clone()),
            )
            .build()?
            .try_deserialize()?;

        // No try_parsing here: secrets and client IDs must stay strings even
        // when they look numeric.
        let auth = config::Config::builder()
            .add_source(config::Environment::default().source(vars))
            .build()?
            .try_deserialize()?;

        Ok(Self { site, auth })
    }
}
