use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 6;

fn argon2_failure(op: &'static str) -> impl Fn(password_hash::Error) -> anyhow::Error {
    move |e| {
        error!(error = %e, op, "argon2 failure");
        anyhow::anyhow!("argon2 {op}: {e}")
    }
}

/// PHC-formatted Argon2id hash with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(argon2_failure("hash"))?;
    Ok(phc.to_string())
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unusable.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(argon2_failure("parse"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(argon2_failure("verify")(e)),
    }
}

/// Length is counted in characters, not bytes.
pub fn is_strong_enough(plain: &str) -> bool {
    plain.chars().count() >= MIN_PASSWORD_LEN
}
