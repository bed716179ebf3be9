use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{LoginRequest, PublicUser, RefreshRequest, RegisterRequest, UpdatePasswordRequest},
    extractors::{cleared_cookie, AuthUser},
    jwt::JwtKeys,
    password::{hash_password, is_strong_enough, verify_password, MIN_PASSWORD_LEN},
    services::{is_valid_email, normalize_email, token_reply, TokenReply},
};
use crate::{
    error::{is_unique_violation, ApiError, ApiResponse, ApiResult},
    state::AppState,
    users::{repo::NewAccount, repo_types::{Account, Role}},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/password", put(update_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, TokenReply)> {
    let email = normalize_email(&payload.email);
    let name = payload.name.trim();

    if name.is_empty() || name.chars().count() > 50 {
        warn!("invalid name");
        return Err(ApiError::BadRequest("Name must be 1 to 50 characters".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if !is_strong_enough(&payload.password) {
        warn!("password too short");
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if Account::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::BadRequest("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let account = Account::create(
        &state.db,
        NewAccount {
            name,
            email: &email,
            password_hash: &hash,
            role: Role::User,
            is_active: true,
            phone: None,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Email already registered".into())
        } else {
            error!(error = %e, "create user failed");
            ApiError::Internal(e)
        }
    })?;

    info!(user_id = %account.id, email = %account.email, "user registered");
    Ok((StatusCode::CREATED, token_reply(&state, account, "Registration successful")?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<TokenReply> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::BadRequest("Please provide email and password".into()));
    };
    let email = normalize_email(&email);

    let Some(mut account) = Account::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&password, &account.password_hash)? {
        warn!(email = %email, user_id = %account.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    Account::touch_last_login(&state.db, account.id).await?;
    account.last_login = Some(time::OffsetDateTime::now_utc());

    info!(user_id = %account.id, email = %account.email, "user logged in");
    token_reply(&state, account, "Login successful")
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<TokenReply> {
    let keys = JwtKeys::from(&state.config.jwt);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let account = state
        .accounts
        .find_account(claims.sub)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    token_reply(&state, account, "Token refreshed")
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let cookie = cleared_cookie(&state.config.jwt)?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::with_message("Logged out", ()),
    ))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(account): AuthUser) -> Json<ApiResponse<PublicUser>> {
    ApiResponse::ok(PublicUser::from(account))
}

#[instrument(skip_all)]
pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> ApiResult<TokenReply> {
    let (Some(current), Some(new)) = (payload.current_password, payload.new_password) else {
        return Err(ApiError::BadRequest(
            "Please provide current and new password".into(),
        ));
    };
    if !is_strong_enough(&new) {
        return Err(ApiError::BadRequest(format!(
            "New password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !verify_password(&current, &account.password_hash)? {
        warn!(user_id = %account.id, "wrong current password");
        return Err(ApiError::Unauthorized("Current password is incorrect".into()));
    }

    let hash = hash_password(&new)?;
    Account::update_password(&state.db, account.id, &hash).await?;

    info!(user_id = %account.id, "password updated");
    token_reply(&state, account, "Password updated")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::subscription::memory::{test_account, MemoryStore};

    #[test]
    fn me_response_serialization() {
        let json = serde_json::to_string(&ApiResponse::ok(PublicUser::from(test_account(
            "test@example.com",
        ))).0)
        .unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"isActive\":true"));
        assert!(!json.contains("passwordHash"));
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let err = login(
            State(state),
            Json(LoginRequest {
                email: Some("a@example.com".into()),
                password: None,
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_short_password_before_touching_db() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let err = register(
            State(state),
            Json(RegisterRequest {
                name: "Lan".into(),
                email: "lan@example.com".into(),
                password: "123".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("at least 6"));
    }

    #[tokio::test]
    async fn register_rejects_bad_email() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let err = register(
            State(state),
            Json(RegisterRequest {
                name: "Lan".into(),
                email: "not-an-email".into(),
                password: "long-enough".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "Invalid email");
    }

    #[tokio::test]
    async fn refresh_issues_new_pair_for_active_account() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("r@example.com")).await;
        let state = AppState::fake(store);
        let refresh_token = JwtKeys::from(&state.config.jwt)
            .sign_refresh(account.id, account.role)
            .unwrap();

        let (_, Json(body)) = refresh(State(state), Json(RefreshRequest { refresh_token }))
            .await
            .unwrap_or_else(|e| panic!("refresh failed: {e}"));
        assert_eq!(body.data.id, account.id);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("r@example.com")).await;
        let state = AppState::fake(store);
        let access = JwtKeys::from(&state.config.jwt)
            .sign_access(account.id, account.role)
            .unwrap();

        let err = refresh(State(state), Json(RefreshRequest { refresh_token: access }))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_password_rejects_wrong_current_password() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let mut account = test_account("p@example.com");
        account.password_hash = hash_password("old-secret").unwrap();

        let err = update_password(
            State(state),
            AuthUser(account),
            Json(UpdatePasswordRequest {
                current_password: Some("not-it".into()),
                new_password: Some("new-secret".into()),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
