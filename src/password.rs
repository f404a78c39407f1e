//! Password hashing and generation

use argon2::Argon2;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;

/// Generate a new random password
///
/// Salt strings are 128 bits of OS randomness in base64, which doubles
/// nicely as a generated password.
pub fn generate() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Hash a password for storage
pub fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("Valid hashed password")
        .to_string()
}

/// Verify a password against a stored hash
///
/// A hash that does not parse counts as a failed verification, not a panic;
/// it only happens when the stored value was tampered with.
pub fn verify(hashed_password: &str, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hashed_password) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
