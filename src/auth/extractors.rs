use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{config::JwtConfig, error::ApiError, state::AppState, users::repo_types::Account};

/// Token from `Authorization: Bearer <t>`, else from the session cookie.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
        {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value_trimmed().to_string())
        .filter(|value| !value.is_empty())
}

fn build_cookie(cfg: &JwtConfig, value: String, max_age: Duration) -> Result<HeaderValue, ApiError> {
    let cookie = Cookie::build((cfg.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cfg.cookie_secure)
        .max_age(max_age)
        .build();
    HeaderValue::from_str(&cookie.to_string()).map_err(|e| ApiError::Internal(e.into()))
}

/// `Set-Cookie` value carrying the access token.
pub fn session_cookie(cfg: &JwtConfig, token: &str) -> Result<HeaderValue, ApiError> {
    build_cookie(cfg, token.to_string(), Duration::minutes(cfg.ttl_minutes.max(0)))
}

/// `Set-Cookie` value that expires the session cookie.
pub fn cleared_cookie(cfg: &JwtConfig) -> Result<HeaderValue, ApiError> {
    build_cookie(cfg, String::new(), Duration::ZERO)
}

/// Authenticated, active account behind a valid access token.
pub struct AuthUser(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers, &state.config.jwt.cookie_name)
            .ok_or_else(|| ApiError::Unauthorized("Not authorized, please log in".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        let account = state
            .accounts
            .find_account(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("No user found for this token".into()))?;

        if !account.is_active {
            warn!(user_id = %account.id, "inactive account rejected");
            return Err(ApiError::Unauthorized("Account has been deactivated".into()));
        }

        Ok(AuthUser(account))
    }
}

/// Authenticated account with the admin role.
pub struct AdminUser(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(account) = AuthUser::from_request_parts(parts, state).await?;
        if !account.is_admin() {
            warn!(user_id = %account.id, role = account.role.as_str(), "admin access denied");
            return Err(ApiError::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser(account))
    }
}
