//! Account registration and sign-in.
//!
//! Forms are validated locally ([`RegisterForm::validate`],
//! [`SigninForm::validate`]) and only a valid request ever reaches the
//! [`AuthStore`]. The store follows the same watch/reducer pattern as
//! [`crate::store::DocsStore`]: one [`AuthState`], changed only by
//! [`reduce_auth`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::DocsBackend;
use crate::state::RequestState;
use crate::store::OperationError;

pub const REGISTER_FAILED: &str = "Failed to register. Please try again.";
pub const SIGNIN_FAILED: &str = "Invalid API key. Please try again.";

/// Characters that satisfy [`PasswordRule::Special`].
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    Special,
}

impl PasswordRule {
    pub fn message(self) -> &'static str {
        match self {
            PasswordRule::MinLength => "At least 8 characters long",
            PasswordRule::Uppercase => "At least one uppercase letter",
            PasswordRule::Lowercase => "At least one lowercase letter",
            PasswordRule::Digit => "At least one number",
            PasswordRule::Special => "At least one special character",
        }
    }
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The rules `password` does not meet, in display order. Empty means valid.
pub fn validate_password(password: &str) -> Vec<PasswordRule> {
    let mut unmet = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        unmet.push(PasswordRule::MinLength);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        unmet.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        unmet.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        unmet.push(PasswordRule::Digit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        unmet.push(PasswordRule::Special);
    }
    unmet
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Please fix password requirements before submitting")]
    WeakPassword(Vec<PasswordRule>),

    #[error("Passwords do not match")]
    PasswordMismatch,
}

// ============ Requests ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub project_name: String,
}

/// Body of `POST /autodoc/signin`. Serializes as either
/// `{"email","password"}` or `{"apiKey"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SigninRequest {
    Credentials { email: String, password: String },
    ApiKey {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
}

// ============ Forms ============

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub project_name: String,
}

impl RegisterForm {
    /// Check the form. Empty fields are reported first, then password
    /// strength, then confirmation.
    pub fn validate(&self) -> Result<RegisterRequest, FormError> {
        let email = self.email.trim();
        let project_name = self.project_name.trim();
        if email.is_empty() {
            return Err(FormError::MissingField("email"));
        }
        if project_name.is_empty() {
            return Err(FormError::MissingField("project name"));
        }

        let unmet = validate_password(&self.password);
        if !unmet.is_empty() {
            return Err(FormError::WeakPassword(unmet));
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }

        Ok(RegisterRequest {
            email: email.to_string(),
            password: self.password.clone(),
            project_name: project_name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SigninForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub api_key: String,
}

impl SigninForm {
    /// An API key, when given, takes precedence over email and password.
    pub fn validate(&self) -> Result<SigninRequest, FormError> {
        let api_key = self.api_key.trim();
        if !api_key.is_empty() {
            return Ok(SigninRequest::ApiKey {
                api_key: api_key.to_string(),
            });
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(FormError::MissingField("email"));
        }
        if self.password.is_empty() {
            return Err(FormError::MissingField("password"));
        }
        Ok(SigninRequest::Credentials {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

// ============ State ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub api_key: Option<String>,
    pub request: RequestState,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum AuthAction {
    Started,
    SignedIn { api_key: String },
    Failed { message: String },
    Logout,
}

pub fn reduce_auth(state: &mut AuthState, action: AuthAction) {
    match action {
        AuthAction::Started => {
            state.request = RequestState::Pending;
            state.error = None;
        }
        AuthAction::SignedIn { api_key } => {
            state.api_key = Some(api_key);
            state.request = RequestState::Idle;
        }
        AuthAction::Failed { message } => {
            state.request = RequestState::Failed(message.clone());
            state.error = Some(message);
        }
        AuthAction::Logout => {
            state.api_key = None;
            state.request = RequestState::Idle;
            state.error = None;
        }
    }
}

pub struct AuthStore {
    backend: Arc<dyn DocsBackend>,
    state: watch::Sender<AuthState>,
}

impl AuthStore {
    pub fn new(backend: Arc<dyn DocsBackend>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { backend, state }
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn dispatch(&self, action: AuthAction) {
        self.state.send_modify(|s| reduce_auth(s, action));
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<String, OperationError> {
        self.dispatch(AuthAction::Started);
        match self.backend.register(request).await {
            Ok(api_key) => {
                tracing::info!(email = %request.email, "registered");
                self.dispatch(AuthAction::SignedIn {
                    api_key: api_key.clone(),
                });
                Ok(api_key)
            }
            Err(e) => {
                let message = e.message_or(REGISTER_FAILED);
                tracing::debug!(error = %e, %message, "registration failed");
                self.dispatch(AuthAction::Failed {
                    message: message.clone(),
                });
                Err(OperationError::new(message))
            }
        }
    }

    pub async fn signin(&self, request: &SigninRequest) -> Result<String, OperationError> {
        self.dispatch(AuthAction::Started);
        match self.backend.signin(request).await {
            Ok(api_key) => {
                self.dispatch(AuthAction::SignedIn {
                    api_key: api_key.clone(),
                });
                Ok(api_key)
            }
            Err(e) => {
                let message = e.message_or(SIGNIN_FAILED);
                tracing::debug!(error = %e, %message, "sign-in failed");
                self.dispatch(AuthAction::Failed {
                    message: message.clone(),
                });
                Err(OperationError::new(message))
            }
        }
    }

    pub fn logout(&self) {
        self.dispatch(AuthAction::Logout);
    }
}
