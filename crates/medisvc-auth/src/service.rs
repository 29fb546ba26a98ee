//! Authentication orchestrator.
//!
//! [`AuthService`] composes the credential verifier, the token codec, the
//! revocation store, and a user directory into the login, refresh, logout,
//! registration, and access token validation flows. It is the only place
//! where lower-level errors are collapsed into [`AuthError`].
//!
//! # Invariants
//!
//! - No flow ever returns a token alongside an error.
//! - Unknown identifiers and wrong passwords are indistinguishable to the caller.
//! - A revocation store that errors or exceeds `store_timeout` makes the
//!   token untrusted (fail closed).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::AuthResult;
use crate::clock::Clock;
use crate::config::{AuthConfig, ConfigError};
use crate::error::AuthError;
use crate::password::PasswordHasher;
use crate::storage::{
    NewUser, RevokedTokenStorage, StorageError, StorageResult, User, UserDirectory, UserId,
};
use crate::token::jwt::{IssuedToken, JwtError, JwtService, TokenClaims, TokenClass};
use crate::types::{AuthenticatedUser, LogoutOutcome, RegisterUser, TokenPair, UserInfo};

/// Policy knobs of the orchestrator.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Issue a new refresh token on refresh and revoke the presented one.
    pub rotate_refresh_tokens: bool,
    /// Upper bound on every revocation store call.
    pub store_timeout: Duration,
    /// Minimum password length accepted at registration.
    pub min_password_length: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            rotate_refresh_tokens: true,
            store_timeout: Duration::from_secs(2),
            min_password_length: 8,
        }
    }
}

impl From<&AuthConfig> for ServiceSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            rotate_refresh_tokens: config.tokens.rotate_refresh_tokens,
            store_timeout: config.revocation.store_timeout,
            min_password_length: config.password.min_length,
        }
    }
}

/// The authentication service.
///
/// Cheap to share behind an `Arc`; every collaborator is itself shared.
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    jwt: Arc<JwtService>,
    revoked_tokens: Arc<dyn RevokedTokenStorage>,
    hasher: Arc<PasswordHasher>,
    settings: ServiceSettings,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt", &self.jwt)
            .field("hasher", &self.hasher)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Creates a service from its collaborators.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        jwt: Arc<JwtService>,
        revoked_tokens: Arc<dyn RevokedTokenStorage>,
        hasher: Arc<PasswordHasher>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            users,
            jwt,
            revoked_tokens,
            hasher,
            settings,
        }
    }

    /// Validates `config` and builds the codec and hasher it describes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid or the keys cannot be loaded.
    pub fn from_config(
        config: &AuthConfig,
        users: Arc<dyn UserDirectory>,
        revoked_tokens: Arc<dyn RevokedTokenStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let jwt = JwtService::from_config(config, clock)?;
        let hasher = PasswordHasher::new(&config.password)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(Self::new(
            users,
            Arc::new(jwt),
            revoked_tokens,
            Arc::new(hasher),
            ServiceSettings::from(config),
        ))
    }

    /// Returns the token codec.
    #[must_use]
    pub fn jwt(&self) -> &Arc<JwtService> {
        &self.jwt
    }

    /// Returns the revocation store.
    #[must_use]
    pub fn revoked_tokens(&self) -> &Arc<dyn RevokedTokenStorage> {
        &self.revoked_tokens
    }

    /// Returns the active policy settings.
    #[must_use]
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Verifies credentials and issues an access/refresh token pair.
    ///
    /// `identifier` is a username or email address.
    ///
    /// # Errors
    ///
    /// - `Validation` if the identifier or password is empty
    /// - `NotAuthorized` for an unknown identifier or a wrong password
    /// - `Unknown` if the directory or token signing fails
    pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<AuthenticatedUser> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::validation("identifier and password are required"));
        }

        let user = self
            .users
            .find_by_identifier(identifier)
            .await
            .map_err(|e| {
                error!(error = %e, "User directory lookup failed");
                AuthError::Unknown
            })?
            .filter(|user| !user.is_absent());

        let digest = user.as_ref().and_then(|u| u.password_hash.clone());
        let verified = self.verify_password(password, digest.clone()).await?;

        let Some(user) = user.filter(|_| verified) else {
            warn!("Login failed");
            return Err(AuthError::NotAuthorized);
        };

        if digest.is_some_and(|d| self.hasher.needs_rehash(&d)) {
            debug!(user_id = user.id, "Password digest uses outdated parameters");
        }

        let security = self.issue_pair(user.id)?;
        info!(user_id = user.id, "User logged in");

        Ok(AuthenticatedUser {
            user: UserInfo::from(&user),
            security,
        })
    }

    /// Exchanges a refresh token for a new token pair.
    ///
    /// With rotation enabled the presented refresh token is revoked and a new
    /// one returned, so each refresh token can be exchanged once. Without
    /// rotation the presented refresh token is returned unchanged.
    ///
    /// # Errors
    ///
    /// - `NotAuthorized` if the token is invalid, expired, not a refresh token,
    ///   revoked, or its subject no longer exists
    /// - `Unknown` if the directory, revocation store, or token signing fails
    pub async fn access_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> AuthResult<AuthenticatedUser> {
        let claims = self
            .jwt
            .decode(refresh_token, TokenClass::Refresh)
            .map_err(|e| {
                debug!(error = %e, "Refresh token rejected");
                AuthError::NotAuthorized
            })?;

        let key = claims.revocation_key();
        if self.check_revoked(&key).await? {
            warn!(user_id = claims.subject_id, "Revoked refresh token presented");
            return Err(AuthError::NotAuthorized);
        }

        let user = self.load_subject(claims.subject_id).await?;

        let access = self.issue(user.id, TokenClass::Access)?;
        let security = if self.settings.rotate_refresh_tokens {
            let refresh = self.issue(user.id, TokenClass::Refresh)?;
            let claimed = self
                .store_call(
                    "revoke",
                    self.revoked_tokens
                        .revoke(&key, self.jwt.trusted_until(&claims)),
                )
                .await?;
            if !claimed {
                warn!(user_id = user.id, "Refresh token reused");
                return Err(AuthError::NotAuthorized);
            }
            TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
                access_expires_at: access.expires_at,
                refresh_expires_at: refresh.expires_at,
            }
        } else {
            TokenPair {
                access_token: access.token,
                refresh_token: refresh_token.to_string(),
                access_expires_at: access.expires_at,
                refresh_expires_at: claims.expires_at,
            }
        };

        info!(
            user_id = user.id,
            rotated = self.settings.rotate_refresh_tokens,
            "Access token refreshed"
        );

        Ok(AuthenticatedUser {
            user: UserInfo::from(&user),
            security,
        })
    }

    /// Revokes an access token.
    ///
    /// An access token that has already expired needs no revocation entry and
    /// is reported as [`LogoutOutcome::AlreadyExpired`].
    ///
    /// # Errors
    ///
    /// - `NotAuthorized` if the token is not a validly signed access token
    /// - `Unknown` if the revocation store fails or times out; the logout did
    ///   not happen and may be retried
    pub async fn logout(&self, access_token: &str) -> AuthResult<LogoutOutcome> {
        let claims = self
            .jwt
            .decode_allow_expired(access_token, TokenClass::Access)
            .map_err(|e| {
                debug!(error = %e, "Logout with invalid token");
                AuthError::NotAuthorized
            })?;

        if self.jwt.is_expired(&claims) {
            debug!(user_id = claims.subject_id, "Logout with expired token");
            return Ok(LogoutOutcome::AlreadyExpired);
        }

        let key = claims.revocation_key();
        self.store_call(
            "revoke",
            self.revoked_tokens
                .revoke(&key, self.jwt.trusted_until(&claims)),
        )
        .await?;

        info!(
            user_id = claims.subject_id,
            jti = %claims.jti,
            "User logged out"
        );
        Ok(LogoutOutcome::Revoked)
    }

    /// Registers a new user.
    ///
    /// Usernames and emails are trimmed; emails are lowercased.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty username, an invalid email, or a short password
    /// - `ResourceAlreadyExists` if the username or email is taken
    /// - `Unknown` if hashing or the directory fails
    pub async fn register(&self, request: RegisterUser) -> AuthResult<UserInfo> {
        let username = request.username.trim().to_string();
        let email = request.email.trim().to_lowercase();

        if username.is_empty() {
            return Err(AuthError::validation("username is required"));
        }
        if !is_plausible_email(&email) {
            return Err(AuthError::validation("email is invalid"));
        }
        if request.password.chars().count() < self.settings.min_password_length {
            return Err(AuthError::validation(format!(
                "password must be at least {} characters",
                self.settings.min_password_length
            )));
        }

        let password_hash = self.hash_password(request.password).await?;
        let new_user = NewUser {
            username,
            email,
            nick_name: non_empty(request.nick_name),
            phone: non_empty(request.phone),
            password_hash,
        };

        match self.users.create(new_user).await {
            Ok(user) => {
                info!(user_id = user.id, "User registered");
                Ok(UserInfo::from(&user))
            }
            Err(StorageError::Conflict(message)) => {
                debug!(%message, "Registration conflict");
                Err(AuthError::already_exists(message))
            }
            Err(e) => {
                error!(error = %e, "User directory create failed");
                Err(AuthError::Unknown)
            }
        }
    }

    /// Validates an access token presented on a protected request.
    ///
    /// # Errors
    ///
    /// - `TokenExpired` if the token has expired
    /// - `NotAuthorized` if it is invalid, not an access token, or revoked
    /// - `Unknown` if the revocation store fails or times out
    pub async fn validate_access_token(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims = self
            .jwt
            .decode(token, TokenClass::Access)
            .map_err(|e| match e {
                JwtError::Expired => {
                    debug!("Access token expired");
                    AuthError::TokenExpired
                }
                other => {
                    debug!(error = %other, "Access token rejected");
                    AuthError::NotAuthorized
                }
            })?;

        if self.check_revoked(&claims.revocation_key()).await? {
            debug!(user_id = claims.subject_id, "Access token revoked");
            return Err(AuthError::NotAuthorized);
        }

        debug!(
            user_id = claims.subject_id,
            kid = %claims.key_id,
            "Access token validated"
        );
        Ok(claims)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn load_subject(&self, id: UserId) -> AuthResult<User> {
        match self.users.find_by_id(id).await {
            Ok(Some(user)) if !user.is_absent() => Ok(user),
            Ok(_) => {
                warn!(user_id = id, "Token subject no longer exists");
                Err(AuthError::NotAuthorized)
            }
            Err(e) => {
                error!(user_id = id, error = %e, "User directory lookup failed");
                Err(AuthError::Unknown)
            }
        }
    }

    fn issue(&self, user_id: UserId, class: TokenClass) -> AuthResult<IssuedToken> {
        self.jwt.issue(user_id, class).map_err(|e| {
            error!(user_id, %class, error = %e, "Token signing failed");
            AuthError::Unknown
        })
    }

    fn issue_pair(&self, user_id: UserId) -> AuthResult<TokenPair> {
        let access = self.issue(user_id, TokenClass::Access)?;
        let refresh = self.issue(user_id, TokenClass::Refresh)?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Verifies off the async runtime. Without a digest, burns a dummy
    /// verification and reports a mismatch.
    async fn verify_password(&self, password: &str, digest: Option<String>) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();

        let result = tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&password, &digest),
            None => {
                hasher.verify_dummy(&password);
                Ok(false)
            }
        })
        .await;

        match result {
            Ok(Ok(matched)) => Ok(matched),
            Ok(Err(e)) => {
                warn!(error = %e, "Stored password digest is malformed");
                Ok(false)
            }
            Err(e) => {
                error!(error = %e, "Password verification task failed");
                Err(AuthError::Unknown)
            }
        }
    }

    async fn hash_password(&self, password: String) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
            Ok(Ok(digest)) => Ok(digest),
            Ok(Err(e)) => {
                error!(error = %e, "Password hashing failed");
                Err(AuthError::Unknown)
            }
            Err(e) => {
                error!(error = %e, "Password hashing task failed");
                Err(AuthError::Unknown)
            }
        }
    }

    async fn check_revoked(&self, key: &str) -> AuthResult<bool> {
        self.store_call("is_revoked", self.revoked_tokens.is_revoked(key))
            .await
    }

    /// Runs a revocation store call under `store_timeout`. Failures and
    /// timeouts both become `Unknown`.
    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StorageResult<T>>,
    ) -> AuthResult<T> {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(operation, error = %e, "Revocation store failed");
                Err(AuthError::Unknown)
            }
            Err(_) => {
                error!(
                    operation,
                    timeout = ?self.settings.store_timeout,
                    "Revocation store timed out"
                );
                Err(AuthError::Unknown)
            }
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::PasswordConfig;
    use crate::memory::{InMemoryRevokedTokenStorage, InMemoryUserDirectory};
    use crate::test_support::{EC384_PRIVATE_PEM, EC384_PUBLIC_PEM, negate_es384_signature};
    use crate::token::jwt::{KeyRing, SigningAlgorithm, SigningKey, TokenLifetimes};
    use async_trait::async_trait;
    use time::OffsetDateTime;
    use time::macros::datetime;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    // ------------------------------------------------------------------
    // Mock collaborators
    // ------------------------------------------------------------------

    struct FailingDirectory;

    #[async_trait]
    impl UserDirectory for FailingDirectory {
        async fn find_by_identifier(&self, _identifier: &str) -> StorageResult<Option<User>> {
            Err(StorageError::Unavailable("directory down".into()))
        }

        async fn find_by_id(&self, _id: UserId) -> StorageResult<Option<User>> {
            Err(StorageError::Unavailable("directory down".into()))
        }

        async fn create(&self, _user: NewUser) -> StorageResult<User> {
            Err(StorageError::Unavailable("directory down".into()))
        }
    }

    /// Returns the zero-id record for every lookup.
    struct SentinelDirectory;

    #[async_trait]
    impl UserDirectory for SentinelDirectory {
        async fn find_by_identifier(&self, _identifier: &str) -> StorageResult<Option<User>> {
            Ok(Some(User::new(0, "", "")))
        }

        async fn find_by_id(&self, _id: UserId) -> StorageResult<Option<User>> {
            Ok(Some(User::new(0, "", "")))
        }

        async fn create(&self, _user: NewUser) -> StorageResult<User> {
            Err(StorageError::Internal("read only".into()))
        }
    }

    enum StoreFault {
        Error,
        Hang,
    }

    struct FaultyRevocationStore(StoreFault);

    impl FaultyRevocationStore {
        async fn fail<T>(&self) -> StorageResult<T> {
            match self.0 {
                StoreFault::Error => Err(StorageError::Unavailable("store down".into())),
                StoreFault::Hang => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl RevokedTokenStorage for FaultyRevocationStore {
        async fn revoke(&self, _key: &str, _expires_at: OffsetDateTime) -> StorageResult<bool> {
            self.fail().await
        }

        async fn is_revoked(&self, _key: &str) -> StorageResult<bool> {
            self.fail().await
        }

        async fn cleanup_expired(&self) -> StorageResult<u64> {
            self.fail().await
        }

        async fn len(&self) -> StorageResult<usize> {
            self.fail().await
        }
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    fn hasher() -> Arc<PasswordHasher> {
        Arc::new(
            PasswordHasher::new(&PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
                min_length: 8,
            })
            .unwrap(),
        )
    }

    fn jwt(clock: Arc<ManualClock>) -> Arc<JwtService> {
        let key = SigningKey::from_secret("primary", SigningAlgorithm::HS256, SECRET).unwrap();
        Arc::new(JwtService::new(
            KeyRing::new(key).unwrap(),
            "medisvc",
            TokenLifetimes::default(),
            clock,
        ))
    }

    fn settings() -> ServiceSettings {
        ServiceSettings {
            store_timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    struct Fixture {
        service: AuthService,
        clock: Arc<ManualClock>,
        users: Arc<InMemoryUserDirectory>,
        revoked: Arc<InMemoryRevokedTokenStorage>,
    }

    async fn fixture_with(settings: ServiceSettings) -> Fixture {
        let key = SigningKey::from_secret("primary", SigningAlgorithm::HS256, SECRET).unwrap();
        fixture_with_key(settings, key).await
    }

    async fn fixture_with_key(settings: ServiceSettings, key: SigningKey) -> Fixture {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let users = Arc::new(InMemoryUserDirectory::new());
        let revoked = Arc::new(InMemoryRevokedTokenStorage::new(1000, clock.clone()));
        let hasher = hasher();

        users
            .insert(
                User::builder(10, "test", "test@example.com")
                    .password_hash(hasher.hash("mySecretPass").unwrap())
                    .build(),
            )
            .await;

        let jwt = JwtService::new(
            KeyRing::new(key).unwrap(),
            "medisvc",
            TokenLifetimes::default(),
            clock.clone(),
        );
        let service = AuthService::new(
            users.clone(),
            Arc::new(jwt),
            revoked.clone(),
            hasher,
            settings,
        );
        Fixture {
            service,
            clock,
            users,
            revoked,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(settings()).await
    }

    fn service_with(
        users: Arc<dyn UserDirectory>,
        revoked: Arc<dyn RevokedTokenStorage>,
        clock: Arc<ManualClock>,
    ) -> AuthService {
        AuthService::new(users, jwt(clock), revoked, hasher(), settings())
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_success() {
        let f = fixture().await;
        let result = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        assert_eq!(result.user.id, 10);
        assert_eq!(result.user.email, "test@example.com");
        assert!(!result.security.access_token.is_empty());
        assert!(!result.security.refresh_token.is_empty());
        assert_eq!(
            result.security.access_expires_at,
            datetime!(2024-05-01 12:15 UTC)
        );
        assert_eq!(
            result.security.refresh_expires_at,
            datetime!(2024-05-08 12:00 UTC)
        );

        let claims = f
            .service
            .jwt()
            .decode(&result.security.access_token, TokenClass::Access)
            .unwrap();
        assert_eq!(claims.subject_id, 10);
    }

    #[tokio::test]
    async fn test_login_by_username() {
        let f = fixture().await;
        let result = f.service.login("test", "mySecretPass").await.unwrap();
        assert_eq!(result.user.id, 10);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let f = fixture().await;
        let err = f
            .service
            .login("test@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
    }

    #[tokio::test]
    async fn test_login_unknown_identifier() {
        let f = fixture().await;
        let err = f
            .service
            .login("nobody@example.com", "mySecretPass")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
    }

    #[tokio::test]
    async fn test_login_empty_input() {
        let f = fixture().await;
        assert!(matches!(
            f.service.login("", "mySecretPass").await,
            Err(AuthError::Validation { .. })
        ));
        assert!(matches!(
            f.service.login("test@example.com", "").await,
            Err(AuthError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_directory_failure() {
        let clock = Arc::new(ManualClock::starting_now());
        let service = service_with(
            Arc::new(FailingDirectory),
            Arc::new(InMemoryRevokedTokenStorage::new(10, clock.clone())),
            clock,
        );
        let err = service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unknown);
    }

    #[tokio::test]
    async fn test_login_absent_sentinel() {
        let clock = Arc::new(ManualClock::starting_now());
        let service = service_with(
            Arc::new(SentinelDirectory),
            Arc::new(InMemoryRevokedTokenStorage::new(10, clock.clone())),
            clock,
        );
        let err = service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
    }

    #[tokio::test]
    async fn test_login_user_without_password() {
        let f = fixture().await;
        f.users
            .insert(User::new(20, "sso", "sso@example.com"))
            .await;
        let err = f.service.login("sso", "anything-at-all").await.unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
    }

    #[tokio::test]
    async fn test_login_malformed_digest() {
        let f = fixture().await;
        f.users
            .insert(
                User::builder(20, "broken", "broken@example.com")
                    .password_hash("not-a-phc-string")
                    .build(),
            )
            .await;
        let err = f.service.login("broken", "mySecretPass").await.unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        f.clock.advance(time::Duration::minutes(20));
        let refreshed = f
            .service
            .access_token_by_refresh_token(&login.security.refresh_token)
            .await
            .unwrap();

        assert_eq!(refreshed.user.id, 10);
        assert_ne!(
            refreshed.security.refresh_token,
            login.security.refresh_token
        );
        assert_eq!(
            refreshed.security.access_expires_at,
            datetime!(2024-05-01 12:35 UTC)
        );
        assert!(
            f.service
                .validate_access_token(&refreshed.security.access_token)
                .await
                .is_ok()
        );

        // The presented refresh token is single-use.
        let err = f
            .service
            .access_token_by_refresh_token(&login.security.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);

        // The rotated one works.
        assert!(
            f.service
                .access_token_by_refresh_token(&refreshed.security.refresh_token)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_refresh_without_rotation() {
        let f = fixture_with(ServiceSettings {
            rotate_refresh_tokens: false,
            ..settings()
        })
        .await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        let refreshed = f
            .service
            .access_token_by_refresh_token(&login.security.refresh_token)
            .await
            .unwrap();
        assert_eq!(
            refreshed.security.refresh_token,
            login.security.refresh_token
        );
        assert_eq!(
            refreshed.security.refresh_expires_at,
            login.security.refresh_expires_at
        );
        assert_eq!(f.revoked.len().await.unwrap(), 0);

        // Reusable until it expires.
        assert!(
            f.service
                .access_token_by_refresh_token(&login.security.refresh_token)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        let err = f
            .service
            .access_token_by_refresh_token(&login.security.access_token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        f.clock.advance(time::Duration::days(8));
        let err = f
            .service
            .access_token_by_refresh_token(&login.security.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
    }

    #[tokio::test]
    async fn test_refresh_subject_removed() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        f.users.remove(10).await;
        let err = f
            .service
            .access_token_by_refresh_token(&login.security.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);
        assert_eq!(f.revoked.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_directory_failure() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let refresh = jwt(clock.clone()).issue(10, TokenClass::Refresh).unwrap();

        let service = service_with(
            Arc::new(FailingDirectory),
            Arc::new(InMemoryRevokedTokenStorage::new(10, clock.clone())),
            clock,
        );
        let err = service
            .access_token_by_refresh_token(&refresh.token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unknown);
    }

    #[tokio::test]
    async fn test_refresh_store_failure_fails_closed() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let users = Arc::new(InMemoryUserDirectory::new());
        users.insert(User::new(10, "test", "test@example.com")).await;
        let refresh = jwt(clock.clone()).issue(10, TokenClass::Refresh).unwrap();

        let service = service_with(
            users,
            Arc::new(FaultyRevocationStore(StoreFault::Error)),
            clock,
        );
        let err = service
            .access_token_by_refresh_token(&refresh.token)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unknown);
    }

    // ------------------------------------------------------------------
    // Logout and validation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_logout_revokes_access_token() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();
        let token = &login.security.access_token;

        assert!(f.service.validate_access_token(token).await.is_ok());
        assert_eq!(
            f.service.logout(token).await.unwrap(),
            LogoutOutcome::Revoked
        );

        let err = f.service.validate_access_token(token).await.unwrap_err();
        assert_eq!(err, AuthError::NotAuthorized);

        // The codec alone still considers the token unexpired.
        assert!(f.service.jwt().decode(token, TokenClass::Access).is_ok());

        // Logging out twice is fine.
        assert_eq!(
            f.service.logout(token).await.unwrap(),
            LogoutOutcome::Revoked
        );
        assert_eq!(f.revoked.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revocation_entry_expires_with_token() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();
        f.service
            .logout(&login.security.access_token)
            .await
            .unwrap();

        f.clock.advance(time::Duration::minutes(14));
        assert_eq!(f.revoked.cleanup_expired().await.unwrap(), 0);

        f.clock.advance(time::Duration::minutes(1));
        assert_eq!(f.revoked.cleanup_expired().await.unwrap(), 1);
        assert_eq!(
            f.service
                .validate_access_token(&login.security.access_token)
                .await
                .unwrap_err(),
            AuthError::TokenExpired
        );
    }

    #[tokio::test]
    async fn test_logout_expired_token() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        f.clock.advance(time::Duration::minutes(16));
        assert_eq!(
            f.service
                .logout(&login.security.access_token)
                .await
                .unwrap(),
            LogoutOutcome::AlreadyExpired
        );
        assert_eq!(f.revoked.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_logout_rejects_invalid_tokens() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        assert_eq!(
            f.service.logout("not-a-token").await.unwrap_err(),
            AuthError::NotAuthorized
        );
        assert_eq!(
            f.service
                .logout(&login.security.refresh_token)
                .await
                .unwrap_err(),
            AuthError::NotAuthorized
        );
        assert_eq!(f.revoked.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_logout_store_failure() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let access = jwt(clock.clone()).issue(10, TokenClass::Access).unwrap();
        let service = service_with(
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(FaultyRevocationStore(StoreFault::Error)),
            clock,
        );

        assert_eq!(
            service.logout(&access.token).await.unwrap_err(),
            AuthError::Unknown
        );
    }

    #[tokio::test]
    async fn test_store_timeout_fails_closed() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let access = jwt(clock.clone()).issue(10, TokenClass::Access).unwrap();
        let service = service_with(
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(FaultyRevocationStore(StoreFault::Hang)),
            clock,
        );

        assert_eq!(
            service.logout(&access.token).await.unwrap_err(),
            AuthError::Unknown
        );
        assert_eq!(
            service
                .validate_access_token(&access.token)
                .await
                .unwrap_err(),
            AuthError::Unknown
        );
    }

    #[tokio::test]
    async fn test_validate_store_failure() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let access = jwt(clock.clone()).issue(10, TokenClass::Access).unwrap();
        let service = service_with(
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(FaultyRevocationStore(StoreFault::Error)),
            clock,
        );

        assert_eq!(
            service
                .validate_access_token(&access.token)
                .await
                .unwrap_err(),
            AuthError::Unknown
        );
    }

    #[tokio::test]
    async fn test_validate_expired_token() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        f.clock.advance(time::Duration::minutes(15));
        assert_eq!(
            f.service
                .validate_access_token(&login.security.access_token)
                .await
                .unwrap_err(),
            AuthError::TokenExpired
        );
    }

    #[tokio::test]
    async fn test_validate_rejects_refresh_token() {
        let f = fixture().await;
        let login = f
            .service
            .login("test@example.com", "mySecretPass")
            .await
            .unwrap();

        assert_eq!(
            f.service
                .validate_access_token(&login.security.refresh_token)
                .await
                .unwrap_err(),
            AuthError::NotAuthorized
        );
    }

    #[tokio::test]
    async fn test_validate_returns_claims() {
        let f = fixture().await;
        let login = f.service.login("test", "mySecretPass").await.unwrap();
        let claims = f
            .service
            .validate_access_token(&login.security.access_token)
            .await
            .unwrap();
        assert_eq!(claims.subject_id, 10);
        assert_eq!(claims.class, TokenClass::Access);
        assert_eq!(claims.key_id, "primary");
    }

    // ------------------------------------------------------------------
    // Register
    // ------------------------------------------------------------------

    fn register_request(username: &str, email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            nick_name: Some("  ".to_string()),
            phone: Some("555-0100".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let f = fixture().await;
        let info = f
            .service
            .register(register_request(" alice ", " Alice@Example.COM ", "correct horse"))
            .await
            .unwrap();

        assert_eq!(info.username, "alice");
        assert_eq!(info.email, "alice@example.com");
        assert!(info.status);
        assert!(info.nick_name.is_none());
        assert_eq!(info.phone.as_deref(), Some("555-0100"));

        let stored = f.users.find_by_id(info.id).await.unwrap().unwrap();
        assert!(
            stored
                .password_hash
                .as_deref()
                .is_some_and(|d| d.starts_with("$argon2id$"))
        );

        let login = f
            .service
            .login("alice@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(login.user.id, info.id);
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let f = fixture().await;
        let err = f
            .service
            .register(register_request("someone", "TEST@example.com", "mySecretPass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ResourceAlreadyExists { .. }));

        let err = f
            .service
            .register(register_request("test", "new@example.com", "mySecretPass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ResourceAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let f = fixture().await;
        for request in [
            register_request("   ", "a@example.com", "mySecretPass"),
            register_request("alice", "not-an-email", "mySecretPass"),
            register_request("alice", "@example.com", "mySecretPass"),
            register_request("alice", "a@example.com", "short"),
        ] {
            let err = f.service.register(request).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation { .. }), "{err}");
        }
        assert_eq!(f.users.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_directory_failure() {
        let clock = Arc::new(ManualClock::starting_now());
        let service = service_with(
            Arc::new(FailingDirectory),
            Arc::new(InMemoryRevokedTokenStorage::new(10, clock.clone())),
            clock,
        );
        let err = service
            .register(register_request("alice", "a@example.com", "mySecretPass"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unknown);
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_from_config() {
        let mut config = AuthConfig::default();
        config.signing.secret = Some(String::from_utf8(SECRET.to_vec()).unwrap());
        config.tokens.rotate_refresh_tokens = false;
        config.password.memory_kib = 1024;
        config.password.iterations = 1;

        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let service = AuthService::from_config(
            &config,
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(InMemoryRevokedTokenStorage::new(10, clock.clone())),
            clock,
        )
        .unwrap();

        assert!(!service.settings().rotate_refresh_tokens);
        assert_eq!(service.settings().min_password_length, 8);
        assert_eq!(service.jwt().issuer(), "medisvc");
    }

    #[tokio::test]
    async fn test_from_config_invalid() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let result = AuthService::from_config(
            &AuthConfig::default(),
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(InMemoryRevokedTokenStorage::new(10, clock.clone())),
            clock,
        );
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_is_plausible_email() {
        assert!(is_plausible_email("a@b"));
        assert!(!is_plausible_email("ab"));
        assert!(!is_plausible_email("a@"));
        assert!(!is_plausible_email("a@b@c"));
    }

    // ------------------------------------------------------------------
    // ECDSA keys
    // ------------------------------------------------------------------

    async fn es384_fixture() -> Fixture {
        let key = SigningKey::from_pem(
            "es-primary",
            SigningAlgorithm::ES384,
            EC384_PRIVATE_PEM,
            EC384_PUBLIC_PEM,
        )
        .unwrap();
        fixture_with_key(settings(), key).await
    }

    #[tokio::test]
    async fn test_es384_logout_covers_reencoded_signature() {
        let f = es384_fixture().await;
        let login = f.service.login("test", "mySecretPass").await.unwrap();
        let access = login.security.access_token;
        let copy = negate_es384_signature(&access);
        assert_ne!(copy, access);
        assert!(f.service.validate_access_token(&copy).await.is_ok());

        assert_eq!(
            f.service.logout(&access).await.unwrap(),
            LogoutOutcome::Revoked
        );

        assert_eq!(
            f.service.validate_access_token(&access).await.unwrap_err(),
            AuthError::NotAuthorized
        );
        assert_eq!(
            f.service.validate_access_token(&copy).await.unwrap_err(),
            AuthError::NotAuthorized
        );

        // Logging out the copy lands on the same entry.
        f.service.logout(&copy).await.unwrap();
        assert_eq!(f.revoked.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_es384_rotated_refresh_token_reencoded_is_rejected() {
        let f = es384_fixture().await;
        let login = f.service.login("test", "mySecretPass").await.unwrap();
        let refresh = login.security.refresh_token;
        let copy = negate_es384_signature(&refresh);

        f.service
            .access_token_by_refresh_token(&refresh)
            .await
            .unwrap();

        assert_eq!(
            f.service
                .access_token_by_refresh_token(&copy)
                .await
                .unwrap_err(),
            AuthError::NotAuthorized
        );
    }

    #[tokio::test]
    async fn test_es384_reencoded_refresh_token_is_claimed_once() {
        let f = es384_fixture().await;
        let login = f.service.login("test", "mySecretPass").await.unwrap();
        let refresh = login.security.refresh_token;
        let copy = negate_es384_signature(&refresh);

        let refreshed = f.service.access_token_by_refresh_token(&copy).await.unwrap();
        assert!(
            f.service
                .validate_access_token(&refreshed.security.access_token)
                .await
                .is_ok()
        );

        assert_eq!(
            f.service
                .access_token_by_refresh_token(&refresh)
                .await
                .unwrap_err(),
            AuthError::NotAuthorized
        );
    }
}
