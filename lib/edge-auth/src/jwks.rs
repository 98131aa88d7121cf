//! Signing key sets for identity token verification.
//!
//! Keys are fetched from `{issuer}/.well-known/jwks.json` and cached per
//! issuer. A key id that is not in the cached set triggers a refetch, rate
//! limited so that tokens with made-up key ids cannot turn every request
//! into a fetch. Tokens that arrive straight from the token endpoint bypass
//! the rate limit: they cannot be forged by the browser, so an unknown key
//! id on one of them means the cached set is stale.

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use moka::future::Cache;
use rootcause::prelude::Report;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::error::ValidationError;

/// Minimum time between two rate-limited fetches of the same issuer's key set.
pub const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// How long a fetched key set is used before it is fetched again.
pub const KEY_SET_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of an issuer's signing keys.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    /// Returns the issuer's key set, fetching it on first use.
    async fn signing_keys(&self, issuer: &str) -> Result<Arc<JwkSet>, Report<ValidationError>>;

    /// Returns a key set that is no older than the source's refresh policy
    /// allows. Called when a browser-supplied token names a key id the
    /// cached set lacks.
    async fn refresh_signing_keys(
        &self,
        issuer: &str,
    ) -> Result<Arc<JwkSet>, Report<ValidationError>>;

    /// Fetches the key set unconditionally. Called when a token just issued
    /// by the token endpoint names a key id the cached set lacks.
    async fn reload_signing_keys(
        &self,
        issuer: &str,
    ) -> Result<Arc<JwkSet>, Report<ValidationError>>;
}

#[derive(Clone)]
struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Process-wide JWKS cache keyed by issuer.
///
/// Concurrent cold starts for the same issuer share a single fetch.
pub struct JwksCache {
    http_client: reqwest::Client,
    cooldown: Duration,
    sets: Cache<String, CachedKeySet>,
}

impl JwksCache {
    /// Creates an empty cache. The HTTP client should carry the upstream timeout.
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_cooldown(http_client, REFRESH_COOLDOWN)
    }

    /// Creates an empty cache with a custom refetch cooldown.
    #[must_use]
    pub fn with_cooldown(http_client: reqwest::Client, cooldown: Duration) -> Self {
        Self {
            http_client,
            cooldown,
            sets: Cache::builder()
                .time_to_live(KEY_SET_TTL)
                .max_capacity(16)
                .build(),
        }
    }

    /// Drops every cached key set.
    pub fn invalidate(&self) {
        self.sets.invalidate_all();
    }

    async fn fetch_and_store(&self, issuer: &str) -> Result<Arc<JwkSet>, Report<ValidationError>> {
        let entry = self.fetch(issuer).await?;
        let keys = Arc::clone(&entry.keys);
        self.sets.insert(issuer.to_string(), entry).await;
        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, issuer: &str) -> Result<CachedKeySet, ValidationError> {
        let url = jwks_url(issuer);
        debug!(%url, "fetching signing keys");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, "failed to fetch signing keys");
            ValidationError::KeySetUnavailable {
                details: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            return Err(ValidationError::KeySetUnavailable {
                details: format!("{url} returned {}", response.status()),
            });
        }

        let keys = response
            .json::<JwkSet>()
            .await
            .map_err(|e| ValidationError::KeySetUnavailable {
                details: format!("invalid key set: {e}"),
            })?;

        Ok(CachedKeySet {
            keys: Arc::new(keys),
            fetched_at: Instant::now(),
        })
    }
}

#[async_trait]
impl SigningKeySource for JwksCache {
    async fn signing_keys(&self, issuer: &str) -> Result<Arc<JwkSet>, Report<ValidationError>> {
        self.sets
            .try_get_with(issuer.to_string(), self.fetch(issuer))
            .await
            .map(|entry| entry.keys)
            .map_err(|e| ValidationError::clone(&e).into())
    }

    async fn refresh_signing_keys(
        &self,
        issuer: &str,
    ) -> Result<Arc<JwkSet>, Report<ValidationError>> {
        match self.sets.get(issuer).await {
            Some(entry) if entry.fetched_at.elapsed() < self.cooldown => {
                debug!("key set fetched recently, not refetching");
                Ok(entry.keys)
            }
            _ => self.fetch_and_store(issuer).await,
        }
    }

    async fn reload_signing_keys(
        &self,
        issuer: &str,
    ) -> Result<Arc<JwkSet>, Report<ValidationError>> {
        debug!("reloading key set for a freshly issued token");
        self.fetch_and_store(issuer).await
    }
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("cooldown", &self.cooldown)
            .field("cached_issuers", &self.sets.entry_count())
            .finish_non_exhaustive()
    }
}

/// Location of an issuer's published key set.
#[must_use]
pub fn jwks_url(issuer: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
}
