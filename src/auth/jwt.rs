use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState, users::repo_types::Role};

/// HS256 keys plus the issuer, audience and lifetimes tokens are minted with.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

/// Access and refresh token issued together at login.
#[derive(Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes.max(0)),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes.max(0)),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn issue(&self, user_id: Uuid, role: Role, kind: TokenKind) -> anyhow::Result<String> {
        let iat = OffsetDateTime::now_utc();
        let exp = iat
            + match kind {
                TokenKind::Access => self.access_ttl,
                TokenKind::Refresh => self.refresh_ttl,
            };
        let claims = Claims {
            sub: user_id,
            iat: iat.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            role,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(%user_id, ?kind, role = role.as_str(), "jwt issued");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid, role: Role) -> anyhow::Result<String> {
        self.issue(user_id, role, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid, role: Role) -> anyhow::Result<String> {
        self.issue(user_id, role, TokenKind::Refresh)
    }

    pub fn sign_pair(&self, user_id: Uuid, role: Role) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign_access(user_id, role)?,
            refresh: self.sign_refresh(user_id, role)?,
        })
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }

    fn verify_kind(&self, token: &str, expected: TokenKind) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != expected {
            anyhow::bail!("not {} token", expected.article_name());
        }
        debug!(user_id = %claims.sub, kind = ?claims.kind, "jwt verified");
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_kind(token, TokenKind::Refresh)
    }
}
