use std::collections::BTreeSet;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AuthError},
    models::{PrincipalSummary, Role},
    password::{self, HasherState},
    repository::RepositoryState,
};

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "SESSION";

/// Claims
///
/// Payload of a session token. `sub` is the account id, never the username: a name freed by a
/// deleted account can be registered again, and the old session must not follow it. The
/// account itself is re-read from the store on every request so role changes and deletions
/// apply immediately.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Username at login time. Informational only; never used for lookups.
    pub name: String,
    pub exp: usize,
    pub iat: usize,
}

/// PrincipalRecord
///
/// The authoritative identity the login mechanism checks a submitted password against.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalRecord {
    pub account_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub authorities: Vec<String>,
}

/// PrincipalLookup
///
/// Bridges the credential store to the login form: loads principals by username and checks
/// submitted passwords.
#[derive(Clone)]
pub struct PrincipalLookup {
    repo: RepositoryState,
    hasher: HasherState,
}

impl PrincipalLookup {
    pub fn new(repo: RepositoryState, hasher: HasherState) -> Self {
        Self { repo, hasher }
    }

    /// Returns the stored identity for `username`, one `ROLE_*` authority per role held.
    pub async fn load_by_username(&self, username: &str) -> Result<PrincipalRecord, AuthError> {
        let account = self
            .repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AuthError::PrincipalNotFound(username.to_string()))?;

        Ok(PrincipalRecord {
            account_id: account.id,
            authorities: account.authorities(),
            username: account.username,
            password_hash: account.password_hash,
        })
    }

    /// authenticate
    ///
    /// Verifies a login attempt. Callers must not tell `PrincipalNotFound` and
    /// `InvalidCredentials` apart in anything shown to the user.
    pub async fn authenticate(
        &self,
        username: &str,
        raw_password: &str,
    ) -> Result<PrincipalRecord, AuthError> {
        let record = self.load_by_username(username).await?;

        let matches =
            password::verify_blocking(&self.hasher, raw_password, &record.password_hash).await?;

        if matches {
            Ok(record)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

// --- Session Tokens ---

/// Signs a session token for the account, valid for the configured TTL.
pub fn issue_session_token(
    config: &AppConfig,
    principal: &PrincipalRecord,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: principal.account_id.to_string(),
        name: principal.username.clone(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::minutes(config.session_ttl_minutes)).timestamp() as usize,
    };

    let key = EncodingKey::from_secret(config.session_secret.as_bytes());
    Ok(encode(&Header::default(), &claims, &key)?)
}

/// Verifies signature and expiry of a session token.
pub fn decode_session_token(config: &AppConfig, token: &str) -> Result<Claims, AuthError> {
    let key = DecodingKey::from_secret(config.session_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    Ok(decode::<Claims>(token, &key, &validation)?.claims)
}

/// Browser-session cookie; the token's own `exp` bounds its lifetime.
pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.is_production())
        .build()
}

/// A removal cookie matching the attributes `session_cookie` sets.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

// --- Resolved Identity ---

/// AuthUser
///
/// The principal behind the current request.
///
/// The authorization gate resolves it once and stores it in the request extensions, so
/// handlers extracting `AuthUser` never hit the store a second time. Extraction outside the
/// gate falls back to resolving from the session cookie; without a valid session the request
/// is redirected to the login page.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub roles: BTreeSet<Role>,
}

impl AuthUser {
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(Role::authority).collect()
    }

    pub fn has_any_authority(&self, required: &[Role]) -> bool {
        let held = self.authorities();
        required
            .iter()
            .any(|role| held.iter().any(|authority| *authority == role.authority()))
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            username: self.username.clone(),
            authorities: self.authorities(),
        }
    }

    /// resolve
    ///
    /// Session cookie -> verified claims -> current account, looked up by id. Anything short
    /// of a valid session naming an existing account is `Ok(None)`; only store failures are
    /// errors.
    pub async fn resolve(
        headers: &HeaderMap,
        repo: &RepositoryState,
        config: &AppConfig,
    ) -> Result<Option<AuthUser>, AppError> {
        let jar = CookieJar::from_headers(headers);
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
            return Ok(None);
        };

        let claims = match decode_session_token(config, &token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("ignoring session cookie: {e}");
                return Ok(None);
            }
        };

        let Ok(account_id) = claims.sub.parse::<Uuid>() else {
            tracing::debug!("ignoring session cookie with malformed subject");
            return Ok(None);
        };

        let account = repo.find_by_id(account_id).await?;

        Ok(account.map(|account| AuthUser {
            id: account.id,
            username: account.username,
            roles: account.roles,
        }))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        match AuthUser::resolve(&parts.headers, &repo, &config).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(Redirect::to("/login").into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}
