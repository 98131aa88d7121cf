//! Error types for the edge-auth crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConfigError`: missing or malformed settings, fatal at startup
//! - `ExchangeError`: the token endpoint rejected or failed a grant
//! - `ValidationError`: an identity token failed verification
//!
//! Only `ConfigError` ever escapes the crate as a hard failure. The
//! request classifier logs the other two and falls through to the next case.

use std::fmt;

/// Errors from loading or checking the gate configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is missing or empty.
    MissingSetting { name: &'static str },
    /// A setting is present but unusable.
    InvalidSetting { name: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting { name } => {
                write!(f, "required setting '{name}' is missing or empty")
            }
            Self::InvalidSetting { name, reason } => {
                write!(f, "setting '{name}' is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from the authorization-code and refresh-token grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The authorization server answered with a non-success status.
    Rejected { status: u16, error: String },
    /// The request did not complete within the upstream timeout.
    Timeout,
    /// The request could not be sent or the connection failed.
    Transport { details: String },
    /// The server answered 2xx but the body was not a usable token response.
    InvalidResponse { details: String },
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, error } => {
                write!(f, "token endpoint rejected the grant ({status}): {error}")
            }
            Self::Timeout => write!(f, "token endpoint timed out"),
            Self::Transport { details } => {
                write!(f, "token endpoint request failed: {details}")
            }
            Self::InvalidResponse { details } => {
                write!(f, "invalid token endpoint response: {details}")
            }
        }
    }
}

impl std::error::Error for ExchangeError {}

impl ExchangeError {
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport {
                details: err.to_string(),
            }
        }
    }
}

/// Errors from identity token validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The token could not be decoded or lacks a required header field.
    Malformed { reason: String },
    /// No key in the issuer's key set matches the token's key id.
    UnknownKey { kid: String },
    /// The issuer's key set could not be fetched or parsed.
    KeySetUnavailable { details: String },
    /// Signature, issuer or audience verification failed.
    Rejected { reason: String },
    /// The token's expiry is not in the future.
    Expired { exp: i64 },
    /// The token is not an identity token.
    WrongTokenUse { found: Option<String> },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed token: {reason}"),
            Self::UnknownKey { kid } => write!(f, "no signing key with id '{kid}'"),
            Self::KeySetUnavailable { details } => {
                write!(f, "signing key set unavailable: {details}")
            }
            Self::Rejected { reason } => write!(f, "token rejected: {reason}"),
            Self::Expired { exp } => write!(f, "token expired at {exp}"),
            Self::WrongTokenUse { found } => match found {
                Some(found) => write!(f, "expected an id token, got token_use '{found}'"),
                None => write!(f, "expected an id token, token_use claim is missing"),
            },
        }
    }
}

impl std::error::Error for ValidationError {}
