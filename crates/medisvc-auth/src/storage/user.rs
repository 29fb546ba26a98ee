//! User model and directory trait.
//!
//! The directory owns identities; the authentication core only reads them to
//! verify credentials and writes them on registration.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::StorageResult;

/// Numeric subject id. `0` marks an absent record.
pub type UserId = i64;

/// An identity in the user directory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier. `0` is the "absent" sentinel.
    pub id: UserId,

    /// Login name.
    pub username: String,

    /// Email address, also accepted as a login identifier.
    pub email: String,

    /// Whether the account is active.
    pub status: bool,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,

    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_img: Option<String>,

    /// Argon2 PHC digest. Never serialized.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,

    /// When the user was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the user was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("status", &self.status)
            .field("nick_name", &self.nick_name)
            .field("phone", &self.phone)
            .field("header_img", &self.header_img)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl User {
    /// Creates an active user with no password.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>, email: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            username: username.into(),
            email: email.into(),
            status: true,
            nick_name: None,
            phone: None,
            header_img: None,
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a new user builder.
    #[must_use]
    pub fn builder(id: UserId, username: impl Into<String>, email: impl Into<String>) -> UserBuilder {
        UserBuilder {
            user: Self::new(id, username, email),
        }
    }

    /// Returns `true` for the zero-id sentinel some directories return instead of "not found".
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.id == 0
    }

    /// Returns `true` if the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status
    }

    /// Returns `true` if `identifier` matches the username or (case-insensitively) the email.
    #[must_use]
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.username == identifier || self.email.eq_ignore_ascii_case(identifier)
    }
}

/// Builder for [`User`].
#[derive(Debug)]
pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    /// Sets the account status.
    #[must_use]
    pub fn status(mut self, status: bool) -> Self {
        self.user.status = status;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn nick_name(mut self, nick_name: impl Into<String>) -> Self {
        self.user.nick_name = Some(nick_name.into());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.user.phone = Some(phone.into());
        self
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn header_img(mut self, header_img: impl Into<String>) -> Self {
        self.user.header_img = Some(header_img.into());
        self
    }

    /// Sets the stored password digest.
    #[must_use]
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.user.password_hash = Some(hash.into());
        self
    }

    /// Builds the user.
    #[must_use]
    pub fn build(self) -> User {
        self.user
    }
}

/// An identity to be created by [`UserDirectory::create`].
#[derive(Clone)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub nick_name: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Argon2 PHC digest of the password.
    pub password_hash: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("nick_name", &self.nick_name)
            .field("phone", &self.phone)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Directory of user identities.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds a user by login identifier (username or email).
    ///
    /// Returns `None` if no user matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<User>>;

    /// Finds a user by id.
    ///
    /// Returns `None` if the user doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: UserId) -> StorageResult<Option<User>>;

    /// Creates a user and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username or email is taken.
    async fn create(&self, user: NewUser) -> StorageResult<User>;
}
