use argon2::{
    Algorithm, Argon2, Params, PasswordHash, Version,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use crate::config::SecurityConfig;
use crate::error::GateError;

/// One-way password hashing with Argon2id.
///
/// Both operations run on the blocking pool; `verify` delegates to the
/// password-hash compare, which is constant time over the digest.
#[derive(Clone)]
pub struct PasswordHashing {
    argon2: Argon2<'static>,
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordHashing {
    pub fn new(cfg: &SecurityConfig) -> Result<Self, GateError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| GateError::PasswordHash(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash with a freshly generated salt, returning a PHC string.
    pub async fn hash(&self, password: String) -> Result<String, GateError> {
        let argon2 = self.argon2.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| GateError::PasswordHash(e.to_string()))
        })
        .await?
    }

    /// Check `password` against a stored PHC string.
    pub async fn verify(&self, password: String, stored: String) -> Result<bool, GateError> {
        let argon2 = self.argon2.clone();
        tokio::task::spawn_blocking(move || {
            let parsed =
                PasswordHash::new(&stored).map_err(|e| GateError::PasswordHash(e.to_string()))?;
            Ok(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await?
    }
}
