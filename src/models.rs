use std::{borrow::Cow, collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- Roles ---

/// Role
///
/// Closed set of role tags an account can hold. Serialized and persisted upper-case.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Manager,
    Leader,
    Employee,
}

/// Prefix every authority token carries.
pub const AUTHORITY_PREFIX: &str = "ROLE_";

impl Role {
    pub const ALL: [Role; 3] = [Role::Manager, Role::Leader, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "MANAGER",
            Role::Leader => "LEADER",
            Role::Employee => "EMPLOYEE",
        }
    }

    /// The authority token this role grants, e.g. `ROLE_MANAGER`.
    pub fn authority(&self) -> String {
        format!("{AUTHORITY_PREFIX}{}", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role tag outside the closed set, from a form or from the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the role name in any case, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

// --- Accounts ---

/// Account
///
/// One registered principal. Accounts hold a set of roles; registration assigns exactly one,
/// but the store and the authorization gate work with any number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "email_address")]
    pub email: String,
    /// bcrypt hash of the password. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    /// Reserved for an email verification flow; nothing sets it yet.
    pub is_verified: bool,
    pub creation_date: DateTime<Utc>,
}

impl Account {
    /// Builds a fresh, unverified account. `id` and `creation_date` are fixed here and never
    /// change afterwards.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            roles: roles.into_iter().collect(),
            is_verified: false,
            creation_date: Utc::now(),
        }
    }

    /// Authority tokens derived from the account's roles, one per role.
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(Role::authority).collect()
    }
}

/// AccountRow
///
/// Raw `accounts` row. Roles are stored as a `TEXT[]` and parsed on the way out, so an
/// unrecognized tag in the database is a decode error rather than a silently dropped role.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub username: String,
    pub email_address: String,
    pub password: String,
    pub roles: Vec<String>,
    pub is_verified: bool,
    pub creation_date: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = UnknownRole;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|tag| tag.parse())
            .collect::<Result<BTreeSet<Role>, _>>()?;

        Ok(Account {
            id: row.id,
            username: row.username,
            email: row.email_address,
            password_hash: row.password,
            roles,
            is_verified: row.is_verified,
            creation_date: row.creation_date,
        })
    }
}

// --- Request Payloads ---

/// RegisterAccountRequest
///
/// Registration form body (POST /register, `application/x-www-form-urlencoded`).
/// Missing fields deserialize as empty strings so they are reported per field by validation
/// instead of rejecting the whole body.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct RegisterAccountRequest {
    #[validate(
        custom(function = "validate_not_blank"),
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters")
    )]
    pub username: String,

    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 50, message = "Email must be at most 50 characters"),
        email(message = "Email must be valid")
    )]
    pub email: String,

    #[validate(
        custom(function = "validate_not_blank"),
        length(min = 8, max = 20, message = "Password must be between 8 and 20 characters")
    )]
    pub password: String,

    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::from("This field is required")));
    }
    Ok(())
}

fn validate_role(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(
            ValidationError::new("blank").with_message(Cow::from("An access level must be specified")),
        );
    }
    value
        .parse::<Role>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("role").with_message(Cow::from("Unknown access level")))
}

/// LoginRequest
///
/// Login form body (POST /login).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// --- View Models ---

/// PrincipalSummary
///
/// What a page is allowed to know about the signed-in principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrincipalSummary {
    pub username: String,
    pub authorities: Vec<String>,
}

/// RegistrationFormValues
///
/// Echo of the submitted registration form. The password is never echoed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegistrationFormValues {
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<&RegisterAccountRequest> for RegistrationFormValues {
    fn from(req: &RegisterAccountRequest) -> Self {
        Self {
            username: req.username.clone(),
            email: req.email.clone(),
            role: req.role.clone(),
        }
    }
}
