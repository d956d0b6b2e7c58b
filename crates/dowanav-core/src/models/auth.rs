//! Request and response bodies of the `/api/auth/*` endpoints.

use serde::{Deserialize, Serialize};

use super::UserProfile;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Error body the auth server sends with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Result of a login attempt. Login never fails with an `Err`; every
/// problem is folded into a user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Success { user: UserProfile },
    Failure { error: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoginOutcome::Success { .. } => None,
            LoginOutcome::Failure { error } => Some(error),
        }
    }
}
