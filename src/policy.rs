use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{AppState, auth::AuthUser, error::AppError, models::Role, views::Page};

/// Cookie remembering the path an unauthenticated request was heading for.
pub const SAVED_REQUEST_COOKIE: &str = "SAVED_REQUEST";

pub const LOGIN_PATH: &str = "/login";

/// PathPattern
///
/// `"/admin/**"` matches `/admin` and everything below it, `"**"` matches every path, any
/// other pattern must match the path exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(&'static str),
    Subtree(&'static str),
    Any,
}

impl PathPattern {
    pub fn parse(pattern: &'static str) -> Self {
        if pattern == "**" {
            return PathPattern::Any;
        }
        match pattern.strip_suffix("/**") {
            Some(base) => PathPattern::Subtree(base),
            None => PathPattern::Exact(pattern),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == *exact,
            PathPattern::Subtree(base) => match path.strip_prefix(base) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            PathPattern::Any => true,
        }
    }
}

/// What a matched rule demands from the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Public,
    AuthenticatedOnly,
    RequiresAnyOf(&'static [Role]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

impl Rule {
    pub fn new(pattern: &'static str, requirement: Requirement) -> Self {
        Self {
            pattern: PathPattern::parse(pattern),
            requirement,
        }
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Served,
    /// No principal on a protected path. Carries the requested path for post-login forwarding.
    RedirectToLogin { requested: String },
    Denied,
}

const MANAGER_ONLY: &[Role] = &[Role::Manager];
const EMPLOYEE_PAGES: &[Role] = &[Role::Employee, Role::Manager, Role::Leader];
const LEADER_PAGES: &[Role] = &[Role::Leader, Role::Manager];

/// AuthorizationPolicy
///
/// Ordered rule table; the first rule whose pattern matches decides. A path no rule matches
/// requires authentication.
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    rules: Vec<Rule>,
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::new(vec![
            Rule::new("/css/**", Requirement::Public),
            Rule::new("/js/**", Requirement::Public),
            Rule::new("/login", Requirement::Public),
            Rule::new("/register", Requirement::Public),
            Rule::new("/logout", Requirement::Public),
            Rule::new("/health", Requirement::Public),
            Rule::new("/swagger-ui/**", Requirement::Public),
            Rule::new("/api-docs/**", Requirement::Public),
            Rule::new("/admin/**", Requirement::RequiresAnyOf(MANAGER_ONLY)),
            Rule::new("/employees/**", Requirement::RequiresAnyOf(EMPLOYEE_PAGES)),
            Rule::new("/leader/**", Requirement::RequiresAnyOf(LEADER_PAGES)),
            Rule::new("**", Requirement::AuthenticatedOnly),
        ])
    }
}

impl AuthorizationPolicy {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn requirement_for(&self, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| &rule.requirement)
            .unwrap_or(&Requirement::AuthenticatedOnly)
    }

    pub fn evaluate(&self, path: &str, principal: Option<&AuthUser>) -> Decision {
        match (self.requirement_for(path), principal) {
            (Requirement::Public, _) => Decision::Served,
            (_, None) => Decision::RedirectToLogin {
                requested: path.to_string(),
            },
            (Requirement::AuthenticatedOnly, Some(_)) => Decision::Served,
            (Requirement::RequiresAnyOf(required), Some(user)) => {
                if user.has_any_authority(required) {
                    Decision::Served
                } else {
                    Decision::Denied
                }
            }
        }
    }
}

/// authorize
///
/// Gate in front of every route. Resolves the session principal, evaluates the policy and
/// either forwards the request (with the principal in its extensions), redirects to the login
/// page, or answers 403 with the access-denied view.
pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = AuthUser::resolve(request.headers(), &state.repo, &state.config).await?;
    let path = request.uri().path().to_owned();

    match state.policy.evaluate(&path, principal.as_ref()) {
        Decision::Served => {
            if let Some(user) = principal {
                request.extensions_mut().insert(user);
            }
            Ok(next.run(request).await)
        }
        Decision::RedirectToLogin { requested } => {
            tracing::debug!(path = %requested, "unauthenticated request redirected to login");
            // The jar percent-encodes the value, so any request path survives the round trip.
            let saved = Cookie::build((SAVED_REQUEST_COOKIE, requested))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            Ok((jar.add(saved), Redirect::to(LOGIN_PATH)).into_response())
        }
        Decision::Denied => {
            let user = principal.as_ref();
            tracing::info!(
                path = %path,
                username = user.map(|u| u.username.as_str()).unwrap_or_default(),
                "access denied"
            );
            Ok((StatusCode::FORBIDDEN, Page::access_denied(user.map(AuthUser::summary)))
                .into_response())
        }
    }
}
