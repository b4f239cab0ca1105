use std::sync::Arc;

use axum::{Router, body::Body, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Identity: session tokens, principal lookup and the `AuthUser` extractor.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
// Ordered path-to-role rule table and the gate middleware evaluating it.
pub mod policy;
// Credential store contract with Postgres and in-memory implementations.
pub mod repository;
pub mod service;
pub mod views;

// Routes grouped by access level (public, authenticated, role-gated).
pub mod routes;
use routes::{authenticated, public, roles};

// --- Public Re-exports ---

// The types `main.rs` and the integration tests wire together.

pub use auth::{AuthUser, PrincipalLookup};
pub use config::AppConfig;
pub use password::{BcryptHasher, HasherState, PasswordHasher};
pub use policy::AuthorizationPolicy;
pub use repository::{
    AccountRepository, InMemoryAccountRepository, PostgresAccountRepository, RepositoryState,
};
pub use service::CredentialService;

/// ApiDoc
///
/// Generates the OpenAPI document for the service from every handler annotated with
/// `#[utoipa::path]` and every payload or view model deriving `ToSchema`.
/// The document is served at `/api-docs/openapi.json` and browsed through `/swagger-ui`.
/// Form endpoints are described with their `application/x-www-form-urlencoded` bodies.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_form, handlers::register, handlers::login_form, handlers::login,
        handlers::logout, handlers::index, handlers::home, handlers::employees, handlers::admin,
        handlers::leader, handlers::access_denied
    ),
    components(
        schemas(
            models::RegisterAccountRequest, models::LoginRequest, models::Role,
            models::PrincipalSummary, models::RegistrationFormValues, views::Page,
        )
    ),
    tags(
        (name = "access-control", description = "Account registration and role-gated pages")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single container of shared services, built once at startup and cloned into every
/// request (all members are reference counted or cheap to clone).
///
/// Collaborators are wired explicitly in [`AppState::new`]: the credential service and the
/// principal lookup share the same store and hasher, so a registration is visible to the
/// very next login.
#[derive(Clone)]
pub struct AppState {
    /// Credential store.
    pub repo: RepositoryState,
    /// Registration and account lookups.
    pub credentials: CredentialService,
    /// Login-side principal lookup and password check.
    pub principals: PrincipalLookup,
    /// Route-to-role rule table evaluated by the gate.
    pub policy: Arc<AuthorizationPolicy>,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires the services over one store and one hasher, with the default rule table.
    pub fn new(repo: RepositoryState, hasher: HasherState, config: AppConfig) -> Self {
        Self {
            credentials: CredentialService::new(repo.clone(), hasher.clone()),
            principals: PrincipalLookup::new(repo.clone(), hasher),
            policy: Arc::new(AuthorizationPolicy::default()),
            repo,
            config,
        }
    }

    /// State over an empty in-memory store, hashing at `config.bcrypt_cost`.
    pub fn in_memory(config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryAccountRepository::new()) as RepositoryState;
        let hasher = Arc::new(BcryptHasher::new(config.bcrypt_cost)) as HasherState;
        Self::new(repo, hasher, config)
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` pull single components out of `AppState` without
// depending on the whole state type.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the complete routing structure, puts every route behind the authorization gate
/// and wraps the result in the request correlation and tracing layers.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Swagger UI over the generated OpenAPI document.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public routes: registration, login, logout, health and static assets.
        .merge(public::public_routes(&state.config.static_dir))
        // Pages open to any signed-in principal.
        .merge(authenticated::authenticated_routes())
        // Role-gated pages. The roles are enforced by the gate, not by the handlers.
        .merge(roles::role_routes())
        // Anything unmatched renders the 404 view once the gate has let it through.
        .fallback(handlers::not_found)
        // 2. Authorization Gate
        // `layer` (not `route_layer`) so unmatched paths are gated too: an anonymous request
        // for a missing page is sent to login, not told the page does not exist.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            policy::authorize,
        ))
        // Apply the shared state to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (outermost)
    base_router.layer(
        ServiceBuilder::new()
            // 3a. Request ID generation: a fresh UUID for every incoming request.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            // 3b. Request tracing: one span per request, tagged with the request id.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // 3c. Request ID propagation: the id is echoed back on the response.
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the tracing span `TraceLayer` opens for each request. It carries the HTTP method,
/// the URI and the `x-request-id` set by `SetRequestIdLayer`, so every log line emitted while
/// handling one request (gate decisions, registrations, login outcomes) can be correlated.
fn trace_span_logger(request: &axum::http::Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
