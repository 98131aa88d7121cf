//! Session gate middleware for Axum.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use sitegate_auth::{AuthRequest, Decision, Gatekeeper};
use std::sync::Arc;

/// Runs every request through the gate before it reaches the site.
///
/// - `Allow`: the request continues unmodified.
/// - `RedirectWithCookies`: 307 with one `Set-Cookie` per issued cookie.
/// - `RedirectToProvider`: 303 to the hosted login.
pub async fn require_session(
    State(gate): State<Arc<Gatekeeper>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = gate
        .decide(&AuthRequest::new(request.uri(), request.headers()))
        .await;

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::RedirectWithCookies { location, cookies } => {
            let jar = cookies
                .into_iter()
                .fold(CookieJar::new(), |jar, cookie| jar.add(cookie));
            (jar, Redirect::temporary(&location)).into_response()
        }
        Decision::RedirectToProvider { location } => Redirect::to(&location).into_response(),
    }
}
