use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::subscription::SubscriptionSnapshot;
use crate::users::repo_types::{Account, Role};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login. Missing fields are answered with 400.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Response returned after login, register, refresh or password change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub refresh_token: String,
    pub data: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub subscription: SubscriptionSnapshot,
    /// Active and not yet past its end date.
    pub has_active_subscription: bool,
}

impl From<Account> for PublicUser {
    fn from(a: Account) -> Self {
        let has_active_subscription = a.subscription.is_current_at(OffsetDateTime::now_utc());
        Self {
            id: a.id,
            name: a.name,
            email: a.email,
            role: a.role,
            is_active: a.is_active,
            avatar: a.avatar,
            phone: a.phone,
            last_login: a.last_login,
            created_at: a.created_at,
            subscription: a.subscription,
            has_active_subscription,
        }
    }
}
