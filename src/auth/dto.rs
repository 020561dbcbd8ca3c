use serde::{Deserialize, Serialize};

use super::jwt::TokenPair;
use crate::{clients::repo_types::Client, users::repo_types::User, validation::nullable};

/// Request body for self-registration. Fields are optional so missing ones
/// surface as field errors rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Returned by register, login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub client: Option<Client>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    /// `null` clears the column; a missing key leaves it alone.
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar: Option<Option<String>>,
}

/// Opaque calendar credential; `null` clears it.
#[derive(Debug, Deserialize)]
pub struct CalendarTokenRequest {
    pub token: Option<serde_json::Value>,
}
