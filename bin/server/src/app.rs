//! Router for the protected site.

use axum::{Router, middleware};
use sitegate_auth::Gatekeeper;
use std::sync::Arc;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{config::SiteConfig, gate::require_session};

/// Builds the router: static files from the site root, all behind the gate.
///
/// The login page gets its own route so that the gate's login path resolves
/// to a file rather than a directory.
pub fn router(gate: Arc<Gatekeeper>, site: &SiteConfig) -> Router {
    let login_path = gate.config().login_path().to_string();

    Router::new()
        .route_service(&login_path, ServeFile::new(site.login_page_path()))
        .fallback_service(ServeDir::new(&site.site_root))
        .layer(middleware::from_fn_with_state(gate, require_session))
        .layer(TraceLayer::new_for_http())
}
