//! Session cookie codec.
//!
//! The browser is the only store for the session: three cookies carrying
//! the identity, access and refresh tokens exactly as the token endpoint
//! issued them.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

/// Cookie holding the identity token (JWT).
pub const ID_TOKEN_COOKIE: &str = "id_token";

/// Cookie holding the access token (JWT).
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie holding the refresh token (opaque).
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Lifetime of the refresh token cookie. The other two are session cookies.
pub const REFRESH_TOKEN_MAX_AGE: Duration = Duration::days(30);

/// Token values read from the request's cookies.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionCookies {
    /// Reads the session cookies from every `Cookie` header on the request.
    ///
    /// All headers are merged into one map. When a name repeats, the last
    /// occurrence wins: later headers override earlier ones, and within a
    /// header later pairs override earlier ones.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = CookieJar::from_headers(headers);
        let value = |name: &str| {
            jar.get(name)
                .map(|cookie| cookie.value().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            id_token: value(ID_TOKEN_COOKIE),
            access_token: value(ACCESS_TOKEN_COOKIE),
            refresh_token: value(REFRESH_TOKEN_COOKIE),
        }
    }
}

/// Builds the `Set-Cookie` values for a session.
#[derive(Debug, Clone, Copy)]
pub struct CookieIssuer {
    secure: bool,
}

impl CookieIssuer {
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// Identity token cookie, scoped to the browser session.
    #[must_use]
    pub fn id_token(&self, value: String) -> Cookie<'static> {
        self.session_cookie(ID_TOKEN_COOKIE, value, true)
    }

    /// Access token cookie, scoped to the browser session. Left readable by
    /// scripts so the site can call APIs with it.
    #[must_use]
    pub fn access_token(&self, value: String) -> Cookie<'static> {
        self.session_cookie(ACCESS_TOKEN_COOKIE, value, false)
    }

    /// Refresh token cookie, kept for [`REFRESH_TOKEN_MAX_AGE`].
    #[must_use]
    pub fn refresh_token(&self, value: String) -> Cookie<'static> {
        Cookie::build((REFRESH_TOKEN_COOKIE, value))
            .path("/")
            .secure(self.secure)
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(REFRESH_TOKEN_MAX_AGE)
            .build()
    }

    fn session_cookie(
        &self,
        name: &'static str,
        value: String,
        http_only: bool,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .secure(self.secure)
            .http_only(http_only)
            .same_site(SameSite::Lax)
            .build()
    }
}
