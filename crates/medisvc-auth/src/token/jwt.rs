//! JWT token issuance and validation.
//!
//! Every token carries a class tag (`typ`: `access` or `refresh`) and is only
//! accepted by operations expecting that class. Tokens are signed with the
//! active key of a [`KeyRing`]; retired keys stay in the ring for
//! verification until the tokens they signed have expired.
//!
//! ## Supported Algorithms
//!
//! - **HS256 / HS384 / HS512**: HMAC with a shared secret of at least 32 bytes
//! - **RS256 / RS384**: RSA, keys loaded from PEM
//! - **ES384**: ECDSA with the P-384 curve, keys loaded from PEM
//!
//! ## Wire format
//!
//! Header: `{"alg": ..., "kid": ..., "typ": "JWT"}`.
//! Payload: `{"iss", "sub", "typ", "iat", "exp", "jti"}`, where `sub` is the
//! decimal subject id and `iat`/`exp` are Unix seconds.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use medisvc_auth::clock::SystemClock;
//! use medisvc_auth::token::jwt::{
//!     JwtService, KeyRing, SigningAlgorithm, SigningKey, TokenClass, TokenLifetimes,
//! };
//!
//! let key = SigningKey::from_secret(
//!     "primary",
//!     SigningAlgorithm::HS256,
//!     b"0123456789abcdef0123456789abcdef",
//! )
//! .unwrap();
//! let jwt = JwtService::new(
//!     KeyRing::new(key).unwrap(),
//!     "medisvc",
//!     TokenLifetimes::default(),
//!     Arc::new(SystemClock),
//! );
//!
//! let issued = jwt.issue(10, TokenClass::Access).unwrap();
//! let claims = jwt.decode(&issued.token, TokenClass::Access).unwrap();
//! assert_eq!(claims.subject_id, 10);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{AuthConfig, ConfigError, MIN_HMAC_SECRET_LEN, SigningConfig, TokenConfig};
use crate::storage::user::UserId;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Signature, structure, issuer, or key selection failed.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of what failed.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token's class tag does not match the operation.
    #[error("Wrong token class: expected {expected}, found {found}")]
    WrongTokenClass {
        /// Class the operation requires.
        expected: TokenClass,
        /// Class carried by the token.
        found: TokenClass,
    },

    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// The specified key was not found.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was not found.
        kid: String,
    },

    /// The algorithm name is not one of the supported algorithms.
    #[error("Unsupported signing algorithm: {name}")]
    UnsupportedAlgorithm {
        /// The rejected algorithm name.
        name: String,
    },
}

impl JwtError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if the error concerns a presented token rather than local keys.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. } | Self::Expired | Self::WrongTokenClass { .. }
        )
    }

    /// Returns `true` if this is a key-related error.
    #[must_use]
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey { .. } | Self::KeyNotFound { .. } | Self::UnsupportedAlgorithm { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::invalid_token(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms for JWT tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384 curve.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an HMAC (shared secret) algorithm.
    #[must_use]
    pub fn is_hmac(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "ES384" => Ok(Self::ES384),
            other => Err(JwtError::UnsupportedAlgorithm {
                name: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Token Class
// ============================================================================

/// Class tag embedded in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    /// Short-lived credential for individual requests.
    Access,
    /// Long-lived credential used only to obtain new access tokens.
    Refresh,
}

impl TokenClass {
    /// Returns the wire value of the class tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenClass {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(JwtError::invalid_token(format!(
                "unknown token class '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims as they appear on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireClaims {
    iss: String,
    sub: String,
    typ: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Validated claims of a decoded token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    /// Subject user id.
    pub subject_id: UserId,

    /// Token class.
    pub class: TokenClass,

    /// Issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Expiry time.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Unique token id.
    pub jti: String,

    /// Id of the key that verified the signature.
    pub key_id: String,
}

impl TokenClaims {
    /// Key under which this token is recorded in a revocation store.
    ///
    /// Derived from signed claims only, so every encoding of the same token
    /// (for instance an ECDSA signature rewritten as `(r, n - s)`) maps to
    /// the same entry.
    #[must_use]
    pub fn revocation_key(&self) -> String {
        format!("{}:{}", self.key_id, self.jti)
    }

    fn from_wire(wire: WireClaims, key_id: String) -> Result<Self, JwtError> {
        let subject_id = wire
            .sub
            .parse::<UserId>()
            .map_err(|_| JwtError::invalid_token("subject is not a numeric id"))?;
        let class = wire.typ.parse::<TokenClass>()?;
        let issued_at = OffsetDateTime::from_unix_timestamp(wire.iat)
            .map_err(|e| JwtError::invalid_token(format!("iat out of range: {}", e)))?;
        let expires_at = OffsetDateTime::from_unix_timestamp(wire.exp)
            .map_err(|e| JwtError::invalid_token(format!("exp out of range: {}", e)))?;

        Ok(Self {
            subject_id,
            class,
            issued_at,
            expires_at,
            jti: wire.jti,
            key_id,
        })
    }
}

/// A freshly signed token.
#[derive(Clone)]
pub struct IssuedToken {
    /// Compact JWS string.
    pub token: String,
    /// Token class.
    pub class: TokenClass,
    /// Expiry time.
    pub expires_at: OffsetDateTime,
    /// Unique token id.
    pub jti: String,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("class", &self.class)
            .field("expires_at", &self.expires_at)
            .field("jti", &self.jti)
            .finish()
    }
}

// ============================================================================
// Keys
// ============================================================================

/// A key used to sign and/or verify tokens.
pub struct SigningKey {
    /// Key ID written into the `kid` header.
    pub kid: String,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    /// Present only for keys that can sign.
    encoding_key: Option<EncodingKey>,

    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl SigningKey {
    /// Creates an HMAC key from a shared secret.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the algorithm is not HMAC or the secret is shorter than 32 bytes.
    pub fn from_secret(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        secret: &[u8],
    ) -> Result<Self, JwtError> {
        if !algorithm.is_hmac() {
            return Err(JwtError::invalid_key(format!(
                "Algorithm {} does not use a shared secret",
                algorithm
            )));
        }
        if secret.len() < MIN_HMAC_SECRET_LEN {
            return Err(JwtError::invalid_key(format!(
                "HMAC secret must be at least {} bytes",
                MIN_HMAC_SECRET_LEN
            )));
        }

        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding_key: Some(EncodingKey::from_secret(secret)),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Loads an asymmetric key pair from PEM strings.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the algorithm is HMAC or the PEM data is invalid.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, JwtError> {
        let encoding_key = if algorithm.is_rsa() {
            EncodingKey::from_rsa_pem(private_pem.as_bytes())
        } else if algorithm == SigningAlgorithm::ES384 {
            EncodingKey::from_ec_pem(private_pem.as_bytes())
        } else {
            return Err(JwtError::invalid_key(format!(
                "Algorithm {} does not use PEM keys",
                algorithm
            )));
        }
        .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let mut key = Self::verification_only_pem(kid, algorithm, public_pem)?;
        key.encoding_key = Some(encoding_key);
        Ok(key)
    }

    /// Loads a verification-only asymmetric key from a PEM public key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the algorithm is HMAC or the PEM data is invalid.
    pub fn verification_only_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        public_pem: &str,
    ) -> Result<Self, JwtError> {
        let decoding_key = if algorithm.is_rsa() {
            DecodingKey::from_rsa_pem(public_pem.as_bytes())
        } else if algorithm == SigningAlgorithm::ES384 {
            DecodingKey::from_ec_pem(public_pem.as_bytes())
        } else {
            return Err(JwtError::invalid_key(format!(
                "Algorithm {} does not use PEM keys",
                algorithm
            )));
        }
        .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding_key: None,
            decoding_key,
        })
    }

    /// Drops the signing half of the key.
    #[must_use]
    pub fn into_verification_only(mut self) -> Self {
        self.encoding_key = None;
        self
    }

    /// Returns `true` if the key can sign tokens.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.encoding_key.is_some()
    }
}

/// The active signing key plus verification-only keys kept for rotation.
#[derive(Debug)]
pub struct KeyRing {
    active: SigningKey,
    verification: Vec<SigningKey>,
}

impl KeyRing {
    /// Creates a key ring with a single active key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the key cannot sign.
    pub fn new(active: SigningKey) -> Result<Self, JwtError> {
        if !active.can_sign() {
            return Err(JwtError::invalid_key(format!(
                "Active key '{}' has no private part",
                active.kid
            )));
        }
        Ok(Self {
            active,
            verification: Vec::new(),
        })
    }

    /// Adds a key accepted for verification only.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the key id is already in the ring.
    pub fn with_verification_key(mut self, key: SigningKey) -> Result<Self, JwtError> {
        if self.find(&key.kid).is_some() {
            return Err(JwtError::invalid_key(format!(
                "Duplicate key id '{}'",
                key.kid
            )));
        }
        self.verification.push(key.into_verification_only());
        Ok(self)
    }

    /// Builds the ring described by a [`SigningConfig`].
    ///
    /// # Errors
    /// Returns an error if an algorithm is unsupported or key material is missing or invalid.
    pub fn from_config(config: &SigningConfig) -> Result<Self, JwtError> {
        let algorithm = config.algorithm.parse::<SigningAlgorithm>()?;
        let active = if algorithm.is_hmac() {
            let secret = config
                .secret
                .as_deref()
                .ok_or_else(|| JwtError::invalid_key("signing.secret is not set"))?;
            SigningKey::from_secret(&config.key_id, algorithm, secret.as_bytes())?
        } else {
            let private_pem = config
                .private_key_pem
                .as_deref()
                .ok_or_else(|| JwtError::invalid_key("signing.private_key_pem is not set"))?;
            let public_pem = config
                .public_key_pem
                .as_deref()
                .ok_or_else(|| JwtError::invalid_key("signing.public_key_pem is not set"))?;
            SigningKey::from_pem(&config.key_id, algorithm, private_pem, public_pem)?
        };

        let mut ring = Self::new(active)?;
        for previous in &config.previous_keys {
            let algorithm = previous.algorithm.parse::<SigningAlgorithm>()?;
            let key = if algorithm.is_hmac() {
                let secret = previous.secret.as_deref().ok_or_else(|| {
                    JwtError::invalid_key(format!("key '{}' has no secret", previous.key_id))
                })?;
                SigningKey::from_secret(&previous.key_id, algorithm, secret.as_bytes())?
            } else {
                let public_pem = previous.public_key_pem.as_deref().ok_or_else(|| {
                    JwtError::invalid_key(format!("key '{}' has no public key", previous.key_id))
                })?;
                SigningKey::verification_only_pem(&previous.key_id, algorithm, public_pem)?
            };
            ring = ring.with_verification_key(key)?;
        }
        Ok(ring)
    }

    /// Returns the key used for signing.
    #[must_use]
    pub fn active(&self) -> &SigningKey {
        &self.active
    }

    /// Finds a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        std::iter::once(&self.active)
            .chain(self.verification.iter())
            .find(|key| key.kid == kid)
    }

    /// Ids of every key in the ring, active first.
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        std::iter::once(&self.active)
            .chain(self.verification.iter())
            .map(|key| key.kid.as_str())
            .collect()
    }
}

// ============================================================================
// Lifetimes
// ============================================================================

/// Class-specific token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    /// Access token lifetime.
    pub access: Duration,
    /// Refresh token lifetime.
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(15),
            refresh: Duration::days(7),
        }
    }
}

impl TokenLifetimes {
    /// Returns the lifetime for a token class.
    #[must_use]
    pub fn for_class(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access,
            TokenClass::Refresh => self.refresh,
        }
    }
}

impl TryFrom<&TokenConfig> for TokenLifetimes {
    type Error = ConfigError;

    fn try_from(config: &TokenConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            access: to_time_duration("access_token_lifetime", config.access_token_lifetime)?,
            refresh: to_time_duration("refresh_token_lifetime", config.refresh_token_lifetime)?,
        })
    }
}

fn to_time_duration(field: &str, value: std::time::Duration) -> Result<Duration, ConfigError> {
    Duration::try_from(value)
        .map_err(|_| ConfigError::InvalidValue(format!("{} is out of range", field)))
}

// ============================================================================
// JWT Service
// ============================================================================

/// Service for issuing and decoding class-tagged JWTs.
///
/// This service is thread-safe (`Send + Sync`) and can be shared across
/// async tasks.
pub struct JwtService {
    keys: KeyRing,
    issuer: String,
    lifetimes: TokenLifetimes,
    leeway: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("kid", &self.keys.active.kid)
            .field("lifetimes", &self.lifetimes)
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl JwtService {
    /// Creates a new JWT service.
    ///
    /// # Arguments
    /// * `keys` - Active signing key and verification keys
    /// * `issuer` - The `iss` claim written and required
    /// * `lifetimes` - Access and refresh lifetimes
    /// * `clock` - Time source for `iat` and expiry checks
    #[must_use]
    pub fn new(
        keys: KeyRing,
        issuer: impl Into<String>,
        lifetimes: TokenLifetimes,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            lifetimes,
            leeway: Duration::ZERO,
            clock,
        }
    }

    /// Sets the clock skew tolerated when checking expiry.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Builds the service from configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if lifetimes are out of range or the keys cannot be loaded.
    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let keys = KeyRing::from_config(&config.signing)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        let lifetimes = TokenLifetimes::try_from(&config.tokens)?;
        let leeway = to_time_duration("leeway", config.tokens.leeway)?;

        Ok(Self::new(keys, config.issuer.clone(), lifetimes, clock).with_leeway(leeway))
    }

    /// Issues a signed token for a subject.
    ///
    /// # Errors
    /// Returns `EncodingError` if signing fails.
    pub fn issue(&self, subject_id: UserId, class: TokenClass) -> Result<IssuedToken, JwtError> {
        let key = &self.keys.active;
        let encoding_key = key
            .encoding_key
            .as_ref()
            .ok_or_else(|| JwtError::invalid_key("active key cannot sign"))?;

        let iat = self.clock.now().unix_timestamp();
        let exp = iat
            .checked_add(self.lifetimes.for_class(class).whole_seconds())
            .ok_or_else(|| {
                JwtError::encoding_error(format!("{} token lifetime overflows exp", class))
            })?;
        let jti = Uuid::new_v4().to_string();
        let claims = WireClaims {
            iss: self.issuer.clone(),
            sub: subject_id.to_string(),
            typ: class.as_str().to_string(),
            iat,
            exp,
            jti: jti.clone(),
        };

        let mut header = Header::new(key.algorithm.to_jwt_algorithm());
        header.kid = Some(key.kid.clone());

        let token = encode(&header, &claims, encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))?;
        let expires_at = OffsetDateTime::from_unix_timestamp(exp)
            .map_err(|e| JwtError::encoding_error(e.to_string()))?;

        Ok(IssuedToken {
            token,
            class,
            expires_at,
            jti,
        })
    }

    /// Decodes a token, checking signature, issuer, class, and expiry.
    ///
    /// # Errors
    /// - `InvalidToken` on signature, structure, issuer, or key selection failure
    /// - `WrongTokenClass` if the class tag differs from `expected`
    /// - `Expired` if the token's `exp` has passed
    pub fn decode(&self, token: &str, expected: TokenClass) -> Result<TokenClaims, JwtError> {
        let claims = self.decode_allow_expired(token, expected)?;
        if self.is_expired(&claims) {
            return Err(JwtError::Expired);
        }
        Ok(claims)
    }

    /// Decodes a token without checking expiry. Every other check still applies.
    ///
    /// # Errors
    /// Same as [`JwtService::decode`], except `Expired` is never returned.
    pub fn decode_allow_expired(
        &self,
        token: &str,
        expected: TokenClass,
    ) -> Result<TokenClaims, JwtError> {
        let header = decode_header(token).map_err(|e| JwtError::invalid_token(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| JwtError::invalid_token("missing kid header"))?;
        let key = self
            .keys
            .find(&kid)
            .ok_or_else(|| JwtError::invalid_token(format!("unknown key id '{}'", kid)))?;

        // Expiry is checked against the injected clock, not here.
        let mut validation = Validation::new(key.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let data = decode::<WireClaims>(token, &key.decoding_key, &validation)
            .map_err(|e| JwtError::invalid_token(e.to_string()))?;
        let claims = TokenClaims::from_wire(data.claims, kid)?;

        if claims.class != expected {
            return Err(JwtError::WrongTokenClass {
                expected,
                found: claims.class,
            });
        }
        Ok(claims)
    }

    /// Returns `true` once `now >= exp + leeway`.
    #[must_use]
    pub fn is_expired(&self, claims: &TokenClaims) -> bool {
        self.clock.now() >= self.trusted_until(claims)
    }

    /// Instant after which `decode` rejects the token: `exp + leeway`,
    /// saturating at the largest representable date.
    #[must_use]
    pub fn trusted_until(&self, claims: &TokenClaims) -> OffsetDateTime {
        claims.expires_at.saturating_add(self.leeway)
    }

    /// Current time according to the service clock.
    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Returns the current signing key ID.
    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.keys.active.kid
    }

    /// Returns the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the configured lifetimes.
    #[must_use]
    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }
}

// ============================================================================
// Tests
// ============================================================================
