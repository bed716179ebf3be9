use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

/// Optional bootstrap administrator, created at startup when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub cors_origin: String,
    pub jwt: JwtConfig,
    pub admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "backoffice".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "backoffice-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
            cookie_name: std::env::var("JWT_COOKIE_NAME").unwrap_or_else(|_| "token".into()),
            cookie_secure: parse_or("COOKIE_SECURE", false),
        };

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                email: email.trim().to_lowercase(),
                password,
                name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin User".into()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            jwt,
            admin,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
