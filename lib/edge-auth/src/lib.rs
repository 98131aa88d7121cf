//! Stateless OIDC session gate for static sites.
//!
//! This crate decides, per request and without any server-side session
//! store, whether a request to a protected site may proceed. The session
//! lives entirely in three browser cookies:
//!
//! - `id_token`: verified on every request against the issuer's keys
//! - `access_token`: stored for the site's own use, never inspected here
//! - `refresh_token`: exchanged for new tokens when the identity token lapses
//!
//! # Example
//!
//! ```no_run
//! use axum::http::{HeaderMap, Uri};
//! use sitegate_auth::{AuthConfig, AuthRequest, Decision, Gatekeeper};
//!
//! # async fn run() {
//! let config = AuthConfig::new(
//!     "auth.example.com".to_string(),
//!     "client-id".to_string(),
//!     "client-secret".to_string(),
//!     "https://site.example/login".to_string(),
//!     "us-east-1_Pool".to_string(),
//!     "us-east-1".to_string(),
//! );
//! let gate = Gatekeeper::new(config).expect("valid configuration");
//!
//! let uri: Uri = "/index.html".parse().expect("valid uri");
//! let headers = HeaderMap::new();
//! match gate.decide(&AuthRequest::new(&uri, &headers)).await {
//!     Decision::Allow => { /* serve the file */ }
//!     Decision::RedirectWithCookies { .. } => { /* 307 with Set-Cookie */ }
//!     Decision::RedirectToProvider { location } => println!("303 to {location}"),
//! }
//! # }
//! ```

pub mod config;
pub mod cookies;
pub mod error;
pub mod exchange;
pub mod gate;
pub mod jwks;
pub mod validate;

// Re-export main types at crate root
pub use config::AuthConfig;
pub use cookies::{CookieIssuer, SessionCookies};
pub use error::{ConfigError, ExchangeError, ValidationError};
pub use exchange::{IssuedTokens, RefreshedTokens, TokenExchanger};
pub use gate::{AuthRequest, Decision, Gatekeeper};
pub use jwks::{JwksCache, SigningKeySource};
pub use validate::{IdTokenClaims, IdTokenValidator};
