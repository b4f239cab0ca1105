use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Pages open to every signed-in principal regardless of role. No specific rule names these
/// paths; they are covered by the catch-all "authenticated only" rule at the end of the policy
/// table, so an anonymous request is redirected to the login page.
///
/// Handlers receive the principal through the `AuthUser` extractor. The gate has already
/// resolved it and stored it in the request extensions, so extraction never reads the store
/// a second time.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Index page with the principal summary.
        .route("/", get(handlers::index))
        // GET /home
        // Landing page after every successful login.
        .route("/home", get(handlers::home))
        // GET /403
        // Static access-denied page. Denials themselves render the same view with status 403.
        .route("/403", get(handlers::access_denied))
}
