use std::collections::BTreeMap;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::models::{PrincipalSummary, RegistrationFormValues};

pub const REGISTER_VIEW: &str = "register";
pub const LOGIN_VIEW: &str = "login";
pub const ACCESS_DENIED_VIEW: &str = "error/403";

/// Page
///
/// A view name plus the model a template needs to render it. Template rendering happens
/// outside this service; the page travels as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub view: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    /// Single top-level business error (duplicate username, failed login, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Validation messages keyed by form field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<RegistrationFormValues>,
    /// Set on the login page right after a logout.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub logged_out: bool,
}

impl Page {
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            ..Self::default()
        }
    }

    pub fn with_principal(mut self, principal: Option<PrincipalSummary>) -> Self {
        self.principal = principal;
        self
    }

    pub fn with_success(mut self, message: Option<String>) -> Self {
        self.success_message = message;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_field_errors(mut self, errors: &ValidationErrors) -> Self {
        self.field_errors = field_messages(errors);
        self
    }

    pub fn with_form(mut self, form: RegistrationFormValues) -> Self {
        self.form = Some(form);
        self
    }

    pub fn access_denied(principal: Option<PrincipalSummary>) -> Self {
        Page::new(ACCESS_DENIED_VIEW).with_principal(principal)
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Flattens `validator` output into `field -> messages`, falling back to the error code when a
/// rule carries no message.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{field} is invalid ({})", e.code),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}
