//! Authentication configuration.
//!
//! Covers token lifetimes and rotation, signing keys, password hashing work
//! factors, and the revocation store. Every section deserializes with
//! `#[serde(default)]`, so a partial TOML file only has to name what it
//! overrides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Placeholder written in place of secret material when a config is displayed.
pub const REDACTED: &str = "<redacted>";

/// Minimum length of an HMAC signing secret, in bytes.
pub const MIN_HMAC_SECRET_LEN: usize = 32;

/// Root authentication configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "medisvc"
///
/// [auth.tokens]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "7d"
///
/// [auth.signing]
/// algorithm = "HS256"
/// secret = "change-me-to-at-least-32-bytes-of-entropy"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Value of the `iss` claim in issued tokens; required on decode.
    pub issuer: String,

    /// Token lifetime and rotation settings.
    pub tokens: TokenConfig,

    /// Token signing keys.
    pub signing: SigningConfig,

    /// Password hashing settings.
    pub password: PasswordConfig,

    /// Revocation store settings.
    pub revocation: RevocationConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "medisvc".to_string(),
            tokens: TokenConfig::default(),
            signing: SigningConfig::default(),
            password: PasswordConfig::default(),
            revocation: RevocationConfig::default(),
        }
    }
}

/// Token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime. Must be longer than the access token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Issue a new refresh token on every refresh and revoke the presented one.
    pub rotate_refresh_tokens: bool,

    /// Clock skew tolerated when checking `exp`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600), // 7 days
            rotate_refresh_tokens: true,
            leeway: Duration::ZERO,
        }
    }
}

/// Token signing configuration.
///
/// HMAC algorithms read `secret`; RSA and ECDSA algorithms read the PEM fields.
/// Keys listed in `previous_keys` are accepted when decoding but never used to
/// sign, which lets tokens issued before a key rotation stay valid until they
/// expire.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing algorithm: HS256, HS384, HS512, RS256, RS384, or ES384.
    pub algorithm: String,

    /// Key identifier written into the `kid` header of issued tokens.
    pub key_id: String,

    /// Shared secret for HMAC algorithms.
    pub secret: Option<String>,

    /// PEM-encoded private key for asymmetric algorithms.
    pub private_key_pem: Option<String>,

    /// PEM-encoded public key for asymmetric algorithms.
    pub public_key_pem: Option<String>,

    /// Retired keys still accepted for verification.
    pub previous_keys: Vec<VerificationKeyConfig>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            key_id: "primary".to_string(),
            secret: None,
            private_key_pem: None,
            public_key_pem: None,
            previous_keys: Vec::new(),
        }
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("secret", &self.secret.as_ref().map(|_| REDACTED))
            .field(
                "private_key_pem",
                &self.private_key_pem.as_ref().map(|_| REDACTED),
            )
            .field("public_key_pem", &self.public_key_pem.is_some())
            .field("previous_keys", &self.previous_keys)
            .finish()
    }
}

impl SigningConfig {
    /// Returns `true` for HS256/HS384/HS512.
    #[must_use]
    pub fn is_hmac(&self) -> bool {
        is_hmac_algorithm(&self.algorithm)
    }
}

/// A verification-only key kept around after rotation.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationKeyConfig {
    /// Key identifier matched against the token's `kid` header.
    pub key_id: String,

    /// Algorithm the key verifies.
    pub algorithm: String,

    /// Shared secret for HMAC algorithms.
    pub secret: Option<String>,

    /// PEM-encoded public key for asymmetric algorithms.
    pub public_key_pem: Option<String>,
}

impl fmt::Debug for VerificationKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKeyConfig")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| REDACTED))
            .field("public_key_pem", &self.public_key_pem.is_some())
            .finish()
    }
}

/// Argon2id work factors and password policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,

    /// Number of passes.
    pub iterations: u32,

    /// Degree of parallelism.
    pub parallelism: u32,

    /// Minimum accepted password length at registration, in characters.
    pub min_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
            min_length: 8,
        }
    }
}

/// Revocation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RevocationConfig {
    /// Upper bound on a single revocation store round-trip.
    /// A timeout is treated as a store failure.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,

    /// Maximum number of entries held by the in-memory store.
    pub max_entries: usize,

    /// Interval between sweeps of expired entries.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(2),
            max_entries: 100_000,
            cleanup_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

const SUPPORTED_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512", "RS256", "RS384", "ES384"];

fn is_hmac_algorithm(algorithm: &str) -> bool {
    matches!(algorithm, "HS256" | "HS384" | "HS512")
}

fn validate_algorithm(field: &str, algorithm: &str) -> Result<(), ConfigError> {
    if SUPPORTED_ALGORITHMS.contains(&algorithm) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "Invalid signing algorithm for {}: '{}'. Must be one of {}",
            field,
            algorithm,
            SUPPORTED_ALGORITHMS.join(", ")
        )))
    }
}

fn validate_secret(field: &str, secret: Option<&str>) -> Result<(), ConfigError> {
    match secret {
        None => Err(ConfigError::Missing(field.to_string())),
        Some(s) if s.len() < MIN_HMAC_SECRET_LEN => Err(ConfigError::InvalidValue(format!(
            "{} must be at least {} bytes",
            field, MIN_HMAC_SECRET_LEN
        ))),
        Some(_) => Ok(()),
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when key material required by the chosen
    /// algorithm is absent, and `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - A signing algorithm is not supported
    /// - An HMAC secret is shorter than 32 bytes
    /// - A lifetime is zero, or the access lifetime is not shorter than the refresh lifetime
    /// - An Argon2 parameter, `min_length`, `store_timeout` or `max_entries` is zero
    /// - Two signing keys share a `key_id`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        // Tokens
        if self.tokens.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.tokens.refresh_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.tokens.access_token_lifetime >= self.tokens.refresh_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be shorter than refresh_token_lifetime".to_string(),
            ));
        }

        // Signing
        let signing = &self.signing;
        if signing.key_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "signing.key_id cannot be empty".to_string(),
            ));
        }
        validate_algorithm("signing.algorithm", &signing.algorithm)?;
        if signing.is_hmac() {
            validate_secret("signing.secret", signing.secret.as_deref())?;
        } else {
            if signing.private_key_pem.is_none() {
                return Err(ConfigError::Missing("signing.private_key_pem".to_string()));
            }
            if signing.public_key_pem.is_none() {
                return Err(ConfigError::Missing("signing.public_key_pem".to_string()));
            }
        }

        let mut seen = vec![signing.key_id.as_str()];
        for key in &signing.previous_keys {
            if seen.contains(&key.key_id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate signing key_id: '{}'",
                    key.key_id
                )));
            }
            seen.push(key.key_id.as_str());

            validate_algorithm("signing.previous_keys.algorithm", &key.algorithm)?;
            if is_hmac_algorithm(&key.algorithm) {
                validate_secret("signing.previous_keys.secret", key.secret.as_deref())?;
            } else if key.public_key_pem.is_none() {
                return Err(ConfigError::Missing(format!(
                    "signing.previous_keys[{}].public_key_pem",
                    key.key_id
                )));
            }
        }

        // Password hashing
        if self.password.memory_kib == 0
            || self.password.iterations == 0
            || self.password.parallelism == 0
        {
            return Err(ConfigError::InvalidValue(
                "password memory_kib, iterations and parallelism must be > 0".to_string(),
            ));
        }
        if self.password.min_length == 0 {
            return Err(ConfigError::InvalidValue(
                "password.min_length must be > 0".to_string(),
            ));
        }

        // Revocation
        if self.revocation.store_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "revocation.store_timeout must be > 0".to_string(),
            ));
        }
        if self.revocation.max_entries == 0 {
            return Err(ConfigError::InvalidValue(
                "revocation.max_entries must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns a copy with every secret replaced by [`REDACTED`], for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        let signing = &mut config.signing;
        if signing.secret.is_some() {
            signing.secret = Some(REDACTED.to_string());
        }
        if signing.private_key_pem.is_some() {
            signing.private_key_pem = Some(REDACTED.to_string());
        }
        for key in &mut signing.previous_keys {
            if key.secret.is_some() {
                key.secret = Some(REDACTED.to_string());
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn valid_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.signing.secret = Some(SECRET.to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.issuer, "medisvc");
        assert!(config.tokens.rotate_refresh_tokens);
        assert_eq!(config.signing.algorithm, "HS256");
        assert_eq!(config.signing.key_id, "primary");
        assert_eq!(config.password.min_length, 8);
        assert_eq!(config.revocation.max_entries, 100_000);
    }

    #[test]
    fn test_default_config_requires_secret() {
        let err = AuthConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("signing.secret"));
    }

    #[test]
    fn test_valid_config_validates() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_issuer_fails_validation() {
        let mut config = valid_config();
        config.issuer = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn test_invalid_algorithm_fails_validation() {
        let mut config = valid_config();
        config.signing.algorithm = "none".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing algorithm"));
    }

    #[test]
    fn test_short_secret_fails_validation() {
        let mut config = valid_config();
        config.signing.secret = Some("too-short".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn test_asymmetric_requires_pem() {
        let mut config = valid_config();
        config.signing.algorithm = "RS256".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("private_key_pem"));
    }

    #[test]
    fn test_lifetime_ordering() {
        let mut config = valid_config();
        config.tokens.access_token_lifetime = Duration::from_secs(3600);
        config.tokens.refresh_token_lifetime = Duration::from_secs(3600);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shorter than"));

        config.tokens.access_token_lifetime = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("access_token_lifetime"));
    }

    #[test]
    fn test_zero_limits_fail_validation() {
        let mut config = valid_config();
        config.password.iterations = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.password.min_length = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.revocation.store_timeout = Duration::ZERO;
        assert!(config.validate().unwrap_err().to_string().contains("store_timeout"));

        let mut config = valid_config();
        config.revocation.max_entries = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_entries"));
    }

    #[test]
    fn test_duplicate_key_id_fails_validation() {
        let mut config = valid_config();
        config.signing.previous_keys.push(VerificationKeyConfig {
            key_id: "primary".to_string(),
            algorithm: "HS256".to_string(),
            secret: Some(SECRET.to_string()),
            public_key_pem: None,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_previous_key_validates() {
        let mut config = valid_config();
        config.signing.previous_keys.push(VerificationKeyConfig {
            key_id: "2023".to_string(),
            algorithm: "HS512".to_string(),
            secret: Some(SECRET.to_string()),
            public_key_pem: None,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = valid_config();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(SECRET));
        assert!(debug.contains(REDACTED));
    }

    #[test]
    fn test_redacted_copy() {
        let config = valid_config().redacted();
        assert_eq!(config.signing.secret.as_deref(), Some(REDACTED));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains(SECRET));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AuthConfig = toml::from_str(
            r#"
            issuer = "clinic"

            [tokens]
            access_token_lifetime = "5m"
            rotate_refresh_tokens = false

            [signing]
            secret = "0123456789abcdef0123456789abcdef"
            "#,
        )
        .unwrap();

        assert_eq!(config.issuer, "clinic");
        assert_eq!(config.tokens.access_token_lifetime, Duration::from_secs(300));
        assert_eq!(
            config.tokens.refresh_token_lifetime,
            Duration::from_secs(7 * 24 * 3600)
        );
        assert!(!config.tokens.rotate_refresh_tokens);
        assert_eq!(config.password.iterations, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue("test error".to_string());
        assert_eq!(err.to_string(), "Invalid configuration value: test error");

        let err = ConfigError::Missing("required_field".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required configuration: required_field"
        );
    }
}
