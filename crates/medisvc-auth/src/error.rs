//! Authentication error taxonomy.
//!
//! Every operation exposed by [`AuthService`](crate::service::AuthService)
//! returns one of these variants. Lower-level failures (codec, password
//! hashing, storage) are logged where they happen and collapsed into this
//! taxonomy, so callers never see infrastructure detail.

use std::fmt;

/// Errors returned by the authentication core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Bad credentials, or a token that is invalid, of the wrong class, or revoked.
    ///
    /// Deliberately carries no detail: a caller must not be able to tell an
    /// unknown identifier from a wrong password.
    #[error("Not authorized")]
    NotAuthorized,

    /// The presented access token has passed its expiry.
    ///
    /// Distinct from [`AuthError::NotAuthorized`] so the caller can prompt a refresh.
    #[error("Token expired")]
    TokenExpired,

    /// The input is malformed.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// Registration collided with an existing identity.
    #[error("Resource already exists: {message}")]
    ResourceAlreadyExists {
        /// Description of the conflicting resource.
        message: String,
    },

    /// An infrastructure failure (signing, storage, directory).
    #[error("Unknown error")]
    Unknown,
}

impl AuthError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `ResourceAlreadyExists` error.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::ResourceAlreadyExists {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller can fix the failure (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is an infrastructure failure (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns `true` if the error concerns a presented token.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotAuthorized => ErrorCategory::Authentication,
            Self::TokenExpired => ErrorCategory::Token,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::ResourceAlreadyExists { .. } => ErrorCategory::Conflict,
            Self::Unknown => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "not_authorized",
            Self::TokenExpired => "token_expired",
            Self::Validation { .. } => "validation_error",
            Self::ResourceAlreadyExists { .. } => "resource_already_exists",
            Self::Unknown => "unknown_error",
        }
    }
}

/// Categories of authentication errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification failed.
    Authentication,
    /// Token lifetime errors.
    Token,
    /// Request validation errors.
    Validation,
    /// Uniqueness conflicts.
    Conflict,
    /// Infrastructure/storage errors.
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}
