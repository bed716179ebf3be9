use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::Role;

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

impl TokenKind {
    pub fn article_name(&self) -> &'static str {
        match self {
            TokenKind::Access => "an access",
            TokenKind::Refresh => "a refresh",
        }
    }
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
    pub role: Role,      // role at signing time; re-checked against the store
}
