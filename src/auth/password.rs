use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::DeskError;
use crate::model::Pin;

pub fn hash_pin(pin: &Pin) -> Result<String, DeskError> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(pin.expose().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DeskError::Credential(e.to_string()))
}

/// False for a wrong PIN and for a hash that cannot be parsed.
pub fn verify_pin(pin: &Pin, hashed: &str) -> bool {
    let parsed = match PasswordHash::new(hashed) {
        Ok(p) => p,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(pin.expose().as_bytes(), &parsed)
        .is_ok()
}
