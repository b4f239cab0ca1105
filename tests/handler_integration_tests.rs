use access_control::{
    AppConfig, AppState, auth,
    create_router, handlers,
    models::{LoginRequest, RegisterAccountRequest, Role},
    views::Page,
};
use axum::{
    Form, Router,
    body::{Body, to_bytes},
    extract::{Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tokio::test;
use tower::ServiceExt;

// --- Test Utilities ---

fn test_config() -> AppConfig {
    AppConfig {
        bcrypt_cost: 4,
        ..AppConfig::default()
    }
}

async fn seeded_state(config: AppConfig, accounts: &[(&str, Role)]) -> AppState {
    let state = AppState::in_memory(config);
    for (username, role) in accounts {
        state
            .credentials
            .register(username, &format!("{username}@example.com"), "s3cretpass", *role)
            .await
            .expect("seed account");
    }
    state
}

async fn read_page(response: Response) -> Page {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("response body should be a Page")
}

fn raw_set_cookies(response: &Response) -> impl Iterator<Item = &str> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
}

/// Decoded value of the named Set-Cookie; a removal shows up as an empty value.
fn cookie_value(response: &Response, name: &str) -> Option<String> {
    raw_set_cookies(response)
        .filter_map(|raw| Cookie::parse_encoded(raw.to_owned()).ok())
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

/// The `name=value` pair exactly as the server emitted it, ready to send back in `Cookie`.
fn echo_cookie(response: &Response, name: &str) -> Option<String> {
    raw_set_cookies(response)
        .filter_map(|raw| raw.split(';').next())
        .find(|pair| pair.split_once('=').is_some_and(|(n, _)| n.trim() == name))
        .map(|pair| pair.trim().to_owned())
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn session_for(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(form_request(
            "/login",
            &format!("username={username}&password=s3cretpass"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    echo_cookie(&response, auth::SESSION_COOKIE).expect("session cookie")
}

// --- Registration (direct handler calls) ---

#[test]
async fn test_register_success_redirects_with_flash() {
    let state = seeded_state(test_config(), &[]).await;
    let payload = RegisterAccountRequest {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "s3cretpass".to_string(),
        role: "employee".to_string(),
    };

    let response = handlers::register(State(state.clone()), CookieJar::new(), Form(payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(
        cookie_value(&response, handlers::FLASH_COOKIE).as_deref(),
        Some("registered")
    );

    let account = state
        .credentials
        .find_by_username("alice")
        .await
        .unwrap()
        .expect("account stored");
    assert_eq!(account.authorities(), vec!["ROLE_EMPLOYEE"]);
}

#[test]
async fn test_register_short_password_redisplays_form() {
    let state = seeded_state(test_config(), &[]).await;
    let payload = RegisterAccountRequest {
        username: "bob".to_string(),
        email: "bob@example.com".to_string(),
        password: "short".to_string(),
        role: "LEADER".to_string(),
    };

    let response = handlers::register(State(state.clone()), CookieJar::new(), Form(payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = read_page(response).await;
    assert_eq!(page.view, "register");
    assert_eq!(page.field_errors.keys().collect::<Vec<_>>(), vec!["password"]);
    let form = page.form.expect("form echoed back");
    assert_eq!(form.username, "bob");
    assert_eq!(form.role, "LEADER");

    assert!(state.credentials.find_by_username("bob").await.unwrap().is_none());
}

#[test]
async fn test_register_duplicate_username_redisplays_form() {
    let state = seeded_state(test_config(), &[("alice", Role::Employee)]).await;
    let payload = RegisterAccountRequest {
        username: "alice".to_string(),
        email: "new@example.com".to_string(),
        password: "anotherpass".to_string(),
        role: "MANAGER".to_string(),
    };

    let response = handlers::register(State(state.clone()), CookieJar::new(), Form(payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = read_page(response).await;
    assert_eq!(page.error_message.as_deref(), Some("Username is already taken!"));
    assert!(page.field_errors.is_empty());
    assert!(state.credentials.find_by_email("new@example.com").await.unwrap().is_none());
}

#[test]
async fn test_register_duplicate_email_redisplays_form() {
    let state = seeded_state(test_config(), &[("alice", Role::Employee)]).await;
    let payload = RegisterAccountRequest {
        username: "alice2".to_string(),
        email: "alice@example.com".to_string(),
        password: "anotherpass".to_string(),
        role: "EMPLOYEE".to_string(),
    };

    let response = handlers::register(State(state), CookieJar::new(), Form(payload))
        .await
        .unwrap();

    let page = read_page(response).await;
    assert_eq!(page.error_message.as_deref(), Some("Email is already in use!"));
}

#[test]
async fn test_register_form_is_empty() {
    let page = read_page(handlers::register_form().await.into_response()).await;
    assert_eq!(page.view, "register");
    assert_eq!(page.form, Some(Default::default()));
    assert!(page.error_message.is_none());
}

// --- Login (direct handler calls) ---

#[test]
async fn test_login_lands_on_home() {
    let state = seeded_state(test_config(), &[("leader1", Role::Leader)]).await;
    let payload = LoginRequest {
        username: "leader1".to_string(),
        password: "s3cretpass".to_string(),
    };

    let response = handlers::login(State(state.clone()), CookieJar::new(), Form(payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), handlers::DEFAULT_SUCCESS_PATH);

    let token = cookie_value(&response, auth::SESSION_COOKIE).expect("session cookie");
    let claims = auth::decode_session_token(&state.config, &token).unwrap();
    let account = state
        .credentials
        .find_by_username("leader1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claims.sub, account.id.to_string());
}

#[test]
async fn test_login_failures_share_one_message() {
    let state = seeded_state(test_config(), &[("leader1", Role::Leader)]).await;

    let mut messages = Vec::new();
    for (username, password) in [("leader1", "wrongpassword"), ("ghost", "s3cretpass")] {
        let payload = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = handlers::login(State(state.clone()), CookieJar::new(), Form(payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_value(&response, auth::SESSION_COOKIE).is_none());

        let page = read_page(response).await;
        assert_eq!(page.view, "login");
        messages.push(page.error_message);
    }

    assert!(messages[0].is_some());
    assert_eq!(messages[0], messages[1]);
}

#[test]
async fn test_login_form_flags_logout() {
    let response = handlers::login_form(
        CookieJar::new(),
        Query(handlers::LoginQuery {
            logout: Some(String::new()),
        }),
    )
    .await
    .into_response();

    let page = read_page(response).await;
    assert!(page.logged_out);
    assert!(page.success_message.is_none());
}

// --- Router (gate + handlers) ---

#[test]
async fn test_flash_message_is_shown_once() {
    let state = seeded_state(test_config(), &[]).await;
    let app = create_router(state);

    let first = app
        .clone()
        .oneshot(get_request("/login", Some("FLASH=registered")))
        .await
        .unwrap();
    assert_eq!(cookie_value(&first, handlers::FLASH_COOKIE).as_deref(), Some(""));
    let page = read_page(first).await;
    assert_eq!(
        page.success_message.as_deref(),
        Some("Registration successful! Please log in.")
    );

    // The browser has dropped the cookie.
    let second = app.oneshot(get_request("/login", None)).await.unwrap();
    assert!(read_page(second).await.success_message.is_none());
}

#[test]
async fn test_anonymous_request_is_redirected_and_remembered() {
    let app = create_router(seeded_state(test_config(), &[]).await);

    let response = app.oneshot(get_request("/leader", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(cookie_value(&response, "SAVED_REQUEST").as_deref(), Some("/leader"));
}

#[test]
async fn test_saved_request_keeps_paths_with_separators() {
    let app = create_router(seeded_state(test_config(), &[]).await);

    let response = app
        .oneshot(get_request("/leader/q1,q2", None))
        .await
        .unwrap();

    assert_eq!(location(&response), "/login");
    assert_eq!(
        cookie_value(&response, "SAVED_REQUEST").as_deref(),
        Some("/leader/q1,q2")
    );
}

#[test]
async fn test_role_gate_serves_and_denies() {
    let state = seeded_state(
        test_config(),
        &[("manager1", Role::Manager), ("emp1", Role::Employee)],
    )
    .await;
    let app = create_router(state);

    let manager = session_for(&app, "manager1").await;
    let employee = session_for(&app, "emp1").await;

    let served = app
        .clone()
        .oneshot(get_request("/admin", Some(&manager)))
        .await
        .unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    let page = read_page(served).await;
    assert_eq!(page.view, "admin");
    assert_eq!(page.principal.unwrap().authorities, vec!["ROLE_MANAGER"]);

    let denied = app
        .clone()
        .oneshot(get_request("/admin", Some(&employee)))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_page(denied).await.view, "error/403");

    let employees = app
        .oneshot(get_request("/employees", Some(&employee)))
        .await
        .unwrap();
    assert_eq!(employees.status(), StatusCode::OK);
}

#[test]
async fn test_unknown_path_is_404_for_signed_in_principal() {
    let state = seeded_state(test_config(), &[("emp1", Role::Employee)]).await;
    let app = create_router(state);
    let session = session_for(&app, "emp1").await;

    let response = app
        .clone()
        .oneshot(get_request("/no/such/page", Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_page(response).await.view, "error/404");

    let anonymous = app.oneshot(get_request("/no/such/page", None)).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
}

#[test]
async fn test_logout_clears_session() {
    let state = seeded_state(test_config(), &[("emp1", Role::Employee)]).await;
    let app = create_router(state);
    let session = session_for(&app, "emp1").await;

    let response = app
        .clone()
        .oneshot(get_request("/logout", Some(&session)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?logout");
    assert_eq!(
        cookie_value(&response, auth::SESSION_COOKIE).as_deref(),
        Some("")
    );
}

#[test]
async fn test_login_forwards_to_saved_request_when_enabled() {
    let config = AppConfig {
        forward_to_saved_request: true,
        ..test_config()
    };
    let app = create_router(seeded_state(config, &[("leader1", Role::Leader)]).await);

    // The gate remembers the path; the browser sends the cookie back unchanged.
    let redirected = app
        .clone()
        .oneshot(get_request("/leader", None))
        .await
        .unwrap();
    let saved = echo_cookie(&redirected, "SAVED_REQUEST").expect("saved request cookie");

    let mut request = form_request("/login", "username=leader1&password=s3cretpass");
    request
        .headers_mut()
        .insert(header::COOKIE, saved.parse().unwrap());

    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/leader");

    let session = echo_cookie(&response, auth::SESSION_COOKIE).expect("session cookie");
    let page = app
        .oneshot(get_request("/leader", Some(&session)))
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(read_page(page).await.view, "leader");
    assert_eq!(cookie_value(&response, "SAVED_REQUEST").as_deref(), Some(""));
}

#[test]
async fn test_saved_request_is_ignored_by_default() {
    let app = create_router(seeded_state(test_config(), &[("leader1", Role::Leader)]).await);

    let mut request = form_request("/login", "username=leader1&password=s3cretpass");
    request
        .headers_mut()
        .insert(header::COOKIE, "SAVED_REQUEST=/leader".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(location(&response), "/home");
}
