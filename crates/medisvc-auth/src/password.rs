//! Credential verification.
//!
//! Passwords are hashed with Argon2id into PHC strings. Verification reads the
//! parameters embedded in the stored digest, so digests produced under an
//! older work factor keep verifying after the configuration changes;
//! [`PasswordHasher::needs_rehash`] reports them.
//!
//! # Example
//!
//! ```
//! use medisvc_auth::config::PasswordConfig;
//! use medisvc_auth::password::PasswordHasher;
//!
//! let config = PasswordConfig { memory_kib: 1024, iterations: 1, ..Default::default() };
//! let hasher = PasswordHasher::new(&config).unwrap();
//!
//! let digest = hasher.hash("mySecretPass").unwrap();
//! assert!(digest.starts_with("$argon2id$"));
//! assert!(hasher.verify("mySecretPass", &digest).unwrap());
//! assert!(!hasher.verify("wrong", &digest).unwrap());
//! ```

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use rand::Rng;

use crate::config::PasswordConfig;

/// Errors from the credential verifier.
///
/// A wrong password is not an error; see [`PasswordHasher::verify`].
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// The configured Argon2 parameters are out of range.
    #[error("Invalid password hashing parameters: {0}")]
    InvalidParams(String),

    /// Hashing failed, or a stored digest could not be parsed.
    #[error("Password hash error: {0}")]
    Hash(#[from] password_hash::Error),
}

/// Argon2id hasher built from [`PasswordConfig`].
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    params: Params,
    dummy_digest: String,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("memory_kib", &self.params.m_cost())
            .field("iterations", &self.params.t_cost())
            .field("parallelism", &self.params.p_cost())
            .finish()
    }
}

impl PasswordHasher {
    /// Creates a hasher with the configured work factors.
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::InvalidParams` if Argon2 rejects the parameters.
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());

        // Digest of an unguessable value, verified when there is no real digest
        // to compare against.
        let salt = SaltString::generate(&mut OsRng);
        let dummy_digest = argon2
            .hash_password(generate_signing_secret().as_bytes(), &salt)?
            .to_string();

        Ok(Self {
            argon2,
            params,
            dummy_digest,
        })
    }

    /// Hashes a password into a PHC string with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::Hash` if hashing fails (rare).
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self.argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Verifies a password against a stored PHC digest.
    ///
    /// Returns `Ok(false)` on mismatch.
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::Hash` only if the digest is malformed.
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(digest)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs one verification against an internal digest and discards the result.
    ///
    /// Keeps a failed lookup as expensive as a wrong password.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_digest);
    }

    /// Returns `true` if `digest` was not produced with the current Argon2id parameters.
    ///
    /// Malformed digests also report `true`.
    #[must_use]
    pub fn needs_rehash(&self, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return true;
        };
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        match Params::try_from(&parsed) {
            Ok(params) => {
                params.m_cost() != self.params.m_cost()
                    || params.t_cost() != self.params.t_cost()
                    || params.p_cost() != self.params.p_cost()
            }
            Err(_) => true,
        }
    }
}

/// Generates a random 256-bit signing secret, hex encoded.
///
/// The 64-character result satisfies the HMAC secret length requirement.
pub fn generate_signing_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}
