/// Account management system
///
/// Handles registration, authentication, sessions, and profile data.
/// The account lifecycle state itself is mutated only by the KYC manager
/// (owner submission) and the admin lifecycle manager.
mod manager;
pub mod state;

pub use manager::AccountManager;
pub use state::UserState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Denormalized profile record: identity plus lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub state: UserState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Validated session extracted from a request
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub user_id: String,
    pub session_id: String,
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub full_name: Option<String>,
}

/// Registration / login response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub state: UserState,
    pub access_token: String,
    pub refresh_token: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSessionRequest {
    pub refresh_token: String,
}

/// Profile update request (owner-editable fields only)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 120))]
    pub full_name: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}
