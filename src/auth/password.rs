use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

use crate::validation::Validator;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    /// Verified against when the email is unknown so both login paths cost one argon2 run.
    static ref DECOY_HASH: Option<String> = hash_password("decoy-password-never-used").ok();
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Burns one verification for a login against an unknown email.
pub fn verify_decoy(plain: &str) {
    if let Some(hash) = DECOY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
}

/// Adds `password` errors for a missing or short password; returns it when usable.
pub fn check_password(v: &mut Validator, value: Option<&str>) -> Option<String> {
    match value {
        None | Some("") => {
            v.add("password", "The password field is required.");
            None
        }
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
            v.add(
                "password",
                format!("The password must be at least {MIN_PASSWORD_LEN} characters."),
            );
            None
        }
        Some(p) => Some(p.to_string()),
    }
}
