//! Identity token validation.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ValidationError;
use crate::jwks::SigningKeySource;

/// The `token_use` value identity tokens carry.
pub const ID_TOKEN_USE: &str = "id";

/// Claims of a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Subject (the user's stable identifier at the provider).
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Audience (the client ID the token was issued to).
    pub aud: String,
    /// Token use marker ("id" or "access").
    pub token_use: Option<String>,
    /// Expiration timestamp.
    pub exp: i64,
    /// Email, when the scope granted it.
    #[serde(default)]
    pub email: Option<String>,
}

/// Verifies identity tokens against the issuer's published keys.
#[derive(Clone)]
pub struct IdTokenValidator {
    issuer: String,
    client_id: String,
    keys: Arc<dyn SigningKeySource>,
}

impl IdTokenValidator {
    #[must_use]
    pub fn new(issuer: String, client_id: String, keys: Arc<dyn SigningKeySource>) -> Self {
        Self {
            issuer,
            client_id,
            keys,
        }
    }

    /// Validates a token presented by the browser against the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature, issuer, audience, expiry or token
    /// use check fails, or if the signing keys cannot be obtained.
    pub async fn validate(&self, token: &str) -> Result<IdTokenClaims, Report<ValidationError>> {
        self.validate_at(token, Utc::now().timestamp()).await
    }

    /// Validates a token presented by the browser as of `now` (Unix seconds).
    ///
    /// The expiry is exclusive: a token whose `exp` equals `now` is expired.
    ///
    /// # Errors
    ///
    /// See [`IdTokenValidator::validate`].
    pub async fn validate_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<IdTokenClaims, Report<ValidationError>> {
        self.check(token, now, KeyOrigin::Presented).await
    }

    /// Validates a token that was just returned by the token endpoint.
    ///
    /// An unknown key id reloads the key set regardless of the refetch
    /// cooldown.
    ///
    /// # Errors
    ///
    /// See [`IdTokenValidator::validate`].
    pub async fn validate_issued(
        &self,
        token: &str,
    ) -> Result<IdTokenClaims, Report<ValidationError>> {
        self.check(token, Utc::now().timestamp(), KeyOrigin::Issued)
            .await
    }

    async fn check(
        &self,
        token: &str,
        now: i64,
        origin: KeyOrigin,
    ) -> Result<IdTokenClaims, Report<ValidationError>> {
        let header = decode_header(token).map_err(classify)?;
        let kid = header.kid.ok_or_else(|| ValidationError::Malformed {
            reason: "token header has no kid".to_string(),
        })?;

        let key = self.decoding_key(&kid, origin).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // Expiry is checked below against `now`, exclusive of the boundary.
        validation.validate_exp = false;

        let claims = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(classify)?
            .claims;

        if claims.exp <= now {
            return Err(ValidationError::Expired { exp: claims.exp }.into());
        }

        if claims.token_use.as_deref() != Some(ID_TOKEN_USE) {
            return Err(ValidationError::WrongTokenUse {
                found: claims.token_use,
            }
            .into());
        }

        Ok(claims)
    }

    async fn decoding_key(
        &self,
        kid: &str,
        origin: KeyOrigin,
    ) -> Result<DecodingKey, Report<ValidationError>> {
        let keys = self.keys.signing_keys(&self.issuer).await?;
        let jwk = match keys.find(kid) {
            Some(jwk) => jwk.clone(),
            None => {
                tracing::debug!(kid, ?origin, "key id not in cached key set, refreshing");
                let keys = match origin {
                    KeyOrigin::Presented => self.keys.refresh_signing_keys(&self.issuer).await?,
                    KeyOrigin::Issued => self.keys.reload_signing_keys(&self.issuer).await?,
                };
                keys.find(kid)
                    .cloned()
                    .ok_or_else(|| ValidationError::UnknownKey {
                        kid: kid.to_string(),
                    })?
            }
        };

        DecodingKey::from_jwk(&jwk).map_err(|e| {
            ValidationError::KeySetUnavailable {
                details: format!("unusable key '{kid}': {e}"),
            }
            .into()
        })
    }
}

/// Where a token came from, which decides how hard to look for its key.
#[derive(Debug, Clone, Copy)]
enum KeyOrigin {
    /// Read from a browser cookie; refetches are rate limited.
    Presented,
    /// Returned by the token endpoint moments ago.
    Issued,
}

/// Sorts decode failures into tokens that are not JWTs at all and tokens
/// that decode but fail verification.
fn classify(err: jsonwebtoken::errors::Error) -> ValidationError {
    match err.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            ValidationError::Malformed {
                reason: err.to_string(),
            }
        }
        _ => ValidationError::Rejected {
            reason: err.to_string(),
        },
    }
}

impl std::fmt::Debug for IdTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenValidator")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
