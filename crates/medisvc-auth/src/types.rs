//! Request and response types of the authentication service.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::storage::{User, UserId};

/// Access and refresh tokens returned together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (compact JWS).
    pub access_token: String,

    /// Refresh token (compact JWS).
    pub refresh_token: String,

    /// Access token expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,

    /// Refresh token expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// User fields safe to return to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// User id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Whether the account is active.
    pub status: bool,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,
    /// Phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_img: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            status: user.status,
            nick_name: user.nick_name.clone(),
            phone: user.phone.clone(),
            header_img: user.header_img.clone(),
        }
    }
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Snapshot of the authenticated user.
    pub user: UserInfo,
    /// Issued tokens.
    pub security: TokenPair,
}

/// Registration request.
#[derive(Clone, Deserialize)]
pub struct RegisterUser {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Display name.
    #[serde(default)]
    pub nick_name: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
}

impl fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("nick_name", &self.nick_name)
            .field("phone", &self.phone)
            .finish()
    }
}

/// What a successful logout did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutOutcome {
    /// The token was added to the revocation store.
    Revoked,
    /// The token had already expired; nothing was stored.
    AlreadyExpired,
}
