use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Role Router Module
///
/// Pages restricted to particular roles. The handlers do not check roles themselves; the
/// `/admin/**`, `/employees/**` and `/leader/**` rules of the policy table do. Each rule covers
/// its whole subtree, so pages added below these prefixes inherit the same requirement.
///
/// A signed-in principal lacking every required role receives the access-denied view with
/// status 403; an anonymous request is redirected to the login page first.
pub fn role_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Requires: MANAGER
        .route("/admin", get(handlers::admin))
        // GET /employees
        // Requires any of: EMPLOYEE, MANAGER, LEADER
        .route("/employees", get(handlers::employees))
        // GET /leader
        // Requires any of: LEADER, MANAGER
        .route("/leader", get(handlers::leader))
}
