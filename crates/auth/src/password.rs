//! Argon2id password hashing.
//!
//! Parameters follow the OWASP recommendation: m=19456 (19 MiB), t=2, p=1.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is unreadable: {0}")]
    MalformedHash(String),
}

/// Turns plaintext passwords into PHC strings and checks them later.
pub trait PasswordHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> Result<String, PasswordError>;

    /// `Ok(false)` for a wrong password; `Err` only when the stored hash is unusable.
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}

#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(19456, 2, 1, None).unwrap_or_else(|_| Params::default());
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedHash(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_correct_password() -> Result<(), PasswordError> {
        let hasher = Argon2PasswordHasher::new();
        let hash = hasher.hash_password("correct horse")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("correct horse", &hash)?);
        Ok(())
    }

    #[test]
    fn wrong_password_is_false_not_an_error() -> Result<(), PasswordError> {
        let hasher = Argon2PasswordHasher::new();
        let hash = hasher.hash_password("correct horse")?;
        assert!(!hasher.verify_password("battery staple", &hash)?);
        Ok(())
    }

    #[test]
    fn same_password_hashes_differently() -> Result<(), PasswordError> {
        let hasher = Argon2PasswordHasher::new();
        assert_ne!(hasher.hash_password("pw-12345")?, hasher.hash_password("pw-12345")?);
        Ok(())
    }

    #[test]
    fn garbage_hash_is_reported() {
        let err = Argon2PasswordHasher::new()
            .verify_password("pw", "not-a-phc-string")
            .unwrap_err();
        assert!(matches!(err, PasswordError::MalformedHash(_)));
    }
}
