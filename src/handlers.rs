use axum::{
    Form,
    extract::{Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use validator::Validate;

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    models::{LoginRequest, RegisterAccountRequest, RegistrationFormValues, Role},
    policy::{LOGIN_PATH, SAVED_REQUEST_COOKIE},
    views::{LOGIN_VIEW, Page, REGISTER_VIEW},
};

/// Cookie carrying a one-time message across a single redirect.
pub const FLASH_COOKIE: &str = "FLASH";

/// Fixed landing page after a successful login.
pub const DEFAULT_SUCCESS_PATH: &str = "/home";

const FLASH_REGISTERED: &str = "registered";
const REGISTERED_MESSAGE: &str = "Registration successful! Please log in.";
const LOGIN_FAILED_MESSAGE: &str = "Invalid username or password.";

/// LoginQuery
///
/// `/login?logout` marks the page shown right after signing out.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct LoginQuery {
    pub logout: Option<String>,
}

fn flash_cookie(code: &'static str) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, code))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

/// Reads and consumes the flash message, if any.
fn take_flash(jar: CookieJar) -> (CookieJar, Option<String>) {
    let message = match jar.get(FLASH_COOKIE).map(|c| c.value().to_owned()) {
        Some(code) if code == FLASH_REGISTERED => Some(REGISTERED_MESSAGE.to_string()),
        Some(_) | None => None,
    };

    if jar.get(FLASH_COOKIE).is_some() {
        (jar.remove(removal(FLASH_COOKIE)), message)
    } else {
        (jar, message)
    }
}

// --- Registration ---

/// register_form
///
/// [Public Route] Empty registration form.
#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Registration form", body = Page))
)]
pub async fn register_form() -> Page {
    Page::new(REGISTER_VIEW).with_form(RegistrationFormValues::default())
}

/// register
///
/// [Public Route] Validates the form and registers the account.
///
/// Field errors and duplicate conflicts both re-display the form (200); nothing is written in
/// either case. Success sets a one-time flash message and redirects to the login page.
/// Store and hashing failures are fatal (500).
#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterAccountRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Form re-displayed with errors", body = Page),
        (status = 303, description = "Registered; redirect to /login"),
        (status = 500, description = "Credential store failure")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<RegisterAccountRequest>,
) -> Result<Response, AppError> {
    let echo = RegistrationFormValues::from(&payload);

    if let Err(errors) = payload.validate() {
        tracing::debug!(username = %payload.username, "registration form rejected by validation");
        return Ok(Page::new(REGISTER_VIEW)
            .with_form(echo)
            .with_field_errors(&errors)
            .into_response());
    }

    // Validation already rejected unknown roles.
    let role: Role = payload
        .role
        .parse()
        .map_err(|e| AppError::internal(format!("validated role failed to parse: {e}")))?;

    match state
        .credentials
        .register(&payload.username, &payload.email, &payload.password, role)
        .await
    {
        Ok(_) => Ok((jar.add(flash_cookie(FLASH_REGISTERED)), Redirect::to(LOGIN_PATH))
            .into_response()),
        Err(e) if e.is_conflict() => Ok(Page::new(REGISTER_VIEW)
            .with_form(echo)
            .with_error(e.to_string())
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

// --- Login / Logout ---

/// login_form
///
/// [Public Route] Login form. Shows (and consumes) a pending flash message.
#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses((status = 200, description = "Login form", body = Page))
)]
pub async fn login_form(jar: CookieJar, Query(query): Query<LoginQuery>) -> impl IntoResponse {
    let (jar, flash) = take_flash(jar);
    let mut page = Page::new(LOGIN_VIEW).with_success(flash);
    page.logged_out = query.logout.is_some();
    (jar, page)
}

/// login
///
/// [Public Route] Checks the submitted credentials and opens a session.
///
/// Success always lands on `/home`, whatever the roles, unless forwarding to the saved request
/// is switched on in the configuration. Failure re-displays the form with one generic message
/// for unknown usernames and wrong passwords alike.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login failed; form re-displayed", body = Page),
        (status = 303, description = "Session opened; redirect to landing page")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, AppError> {
    let record = match state
        .principals
        .authenticate(&payload.username, &payload.password)
        .await
    {
        Ok(record) => record,
        Err(e) if e.is_authentication_failure() => {
            tracing::info!(username = %payload.username, "login failed");
            return Ok(Page::new(LOGIN_VIEW)
                .with_error(LOGIN_FAILED_MESSAGE)
                .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let token = auth::issue_session_token(&state.config, &record)?;
    tracing::info!(username = %record.username, authorities = ?record.authorities, "login succeeded");

    let destination = landing_path(&state, &jar);
    let jar = jar
        .remove(removal(SAVED_REQUEST_COOKIE))
        .add(auth::session_cookie(&state.config, token));

    Ok((jar, Redirect::to(&destination)).into_response())
}

fn landing_path(state: &AppState, jar: &CookieJar) -> String {
    if !state.config.forward_to_saved_request {
        return DEFAULT_SUCCESS_PATH.to_string();
    }

    jar.get(SAVED_REQUEST_COOKIE)
        .map(|c| c.value().to_owned())
        // Local paths only; "//host" would leave the site.
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| DEFAULT_SUCCESS_PATH.to_string())
}

/// logout
///
/// [Public Route] Ends the session and returns to the login page with the logout indicator.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Session closed; redirect to /login?logout"))
)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(auth::expired_session_cookie()),
        Redirect::to("/login?logout"),
    )
}

// --- Pages ---

fn page_for(view: &str, user: &AuthUser) -> Page {
    Page::new(view).with_principal(Some(user.summary()))
}

/// index
///
/// [Authenticated Route] Root page.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Index page", body = Page)))]
pub async fn index(user: AuthUser) -> Page {
    page_for("index", &user)
}

/// home
///
/// [Authenticated Route] Landing page after login.
#[utoipa::path(get, path = "/home", responses((status = 200, description = "Home page", body = Page)))]
pub async fn home(user: AuthUser) -> Page {
    page_for("home", &user)
}

/// employees
///
/// [Role Route] EMPLOYEE, MANAGER or LEADER.
#[utoipa::path(
    get,
    path = "/employees",
    responses(
        (status = 200, description = "Employees page", body = Page),
        (status = 403, description = "Access denied", body = Page)
    )
)]
pub async fn employees(user: AuthUser) -> Page {
    page_for("employees", &user)
}

/// admin
///
/// [Role Route] MANAGER only.
#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Admin page", body = Page),
        (status = 403, description = "Access denied", body = Page)
    )
)]
pub async fn admin(user: AuthUser) -> Page {
    page_for("admin", &user)
}

/// leader
///
/// [Role Route] LEADER or MANAGER.
#[utoipa::path(
    get,
    path = "/leader",
    responses(
        (status = 200, description = "Leader page", body = Page),
        (status = 403, description = "Access denied", body = Page)
    )
)]
pub async fn leader(user: AuthUser) -> Page {
    page_for("leader", &user)
}

/// access_denied
///
/// [Authenticated Route] Static access-denied page.
#[utoipa::path(get, path = "/403", responses((status = 200, description = "Access denied page", body = Page)))]
pub async fn access_denied(user: AuthUser) -> Page {
    Page::access_denied(Some(user.summary()))
}

/// Fallback for unknown paths. Only reached once the gate has let the request through.
pub async fn not_found(request: Request) -> impl IntoResponse {
    let principal = request.extensions().get::<AuthUser>().map(AuthUser::summary);
    (
        StatusCode::NOT_FOUND,
        Page::new("error/404").with_principal(principal),
    )
}
