use axum::{
    http::{header, HeaderValue},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::error;

use super::{
    dto::{AuthResponse, PublicUser},
    extractors::session_cookie,
    jwt::JwtKeys,
};
use crate::{error::ApiError, state::AppState, users::repo_types::Account};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) type TokenReply = ([(header::HeaderName, HeaderValue); 1], Json<AuthResponse>);

/// Signs a token pair for `account` and sets the session cookie.
pub(crate) fn token_reply(
    state: &AppState,
    account: Account,
    message: &str,
) -> Result<TokenReply, ApiError> {
    let pair = JwtKeys::from(&state.config.jwt)
        .sign_pair(account.id, account.role)
        .map_err(|e| {
            error!(error = %e, user_id = %account.id, "jwt sign failed");
            ApiError::Internal(e)
        })?;
    let cookie = session_cookie(&state.config.jwt, &pair.access)?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            success: true,
            message: message.to_string(),
            token: pair.access,
            refresh_token: pair.refresh,
            data: PublicUser::from(account),
        }),
    ))
}
