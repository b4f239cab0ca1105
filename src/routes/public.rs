use crate::{AppState, handlers};
use axum::{Router, routing::get};
use tower_http::services::ServeDir;

/// Public Router Module
///
/// Defines the endpoints the policy table marks `Public`: anyone may reach them, signed in or
/// not. They cover the identity flow itself (registration, login and logout), a liveness probe
/// and the static assets the pages load.
///
/// Static assets are served by `tower-http`'s `ServeDir` from the `css/` and `js/`
/// directories below `AppConfig::static_dir`. A missing file is a plain 404 from `ServeDir`.
pub fn public_routes(static_dir: &str) -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring. Returns "ok" without touching
        // the credential store.
        .route("/health", get(|| async { "ok" }))
        // GET /register
        // Empty registration form.
        // POST /register
        // Invalid input and duplicate usernames or emails re-display the form.
        // Success redirects to /login with a one-time flash message.
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        // GET /login
        // Login form; shows a pending flash message and the logout indicator.
        // POST /login
        // Checks the credentials and opens a session cookie, or re-displays the form with
        // one generic error.
        .route("/login", get(handlers::login_form).post(handlers::login))
        // GET /logout
        // Clears the session cookie and redirects to /login?logout.
        .route("/logout", get(handlers::logout))
        // GET /css/*, /js/*
        .nest_service("/css", ServeDir::new(format!("{static_dir}/css")))
        .nest_service("/js", ServeDir::new(format!("{static_dir}/js")))
}
