//! Password hashing with bcrypt.

use crate::auth::errors::AuthError;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Salted one-way password hashing.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash with a fresh random salt. Blocking; call from `spawn_blocking`
    /// when on the runtime.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| {
            error!(error = %e, "Password hashing failed");
            AuthError::HashingFailure
        })
    }

    /// Constant-time check. Malformed hashes simply don't match.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        bcrypt::verify(plaintext, hash).unwrap_or(false)
    }

    pub async fn hash_async(&self, plaintext: &str) -> Result<String, AuthError> {
        let hasher = *self;
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|_| AuthError::HashingFailure)?
    }

    pub async fn verify_async(&self, plaintext: &str, hash: &str) -> bool {
        let hasher = *self;
        let plaintext = plaintext.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &hash))
            .await
            .unwrap_or(false)
    }
}

/// Length policy shared by registration and password change.
pub fn check_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}
