use thiserror::Error;

use keyward_core::{ConfigError, StoreError};

use crate::RoleId;

/// Everything that can go wrong inside the engine.
///
/// The variants are precise so hosts can log and audit them. Callers outside
/// the host must only ever see [`AuthError::public`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("entity not found")]
    NotFound,

    #[error("entity is not active")]
    Inactive,

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid secret")]
    InvalidSecret,

    #[error("invalid PIN")]
    InvalidPin,

    #[error("enrollment token not found")]
    TokenNotFound,

    #[error("enrollment token expired")]
    TokenExpired,

    #[error("unknown role '{role}'{}", container_suffix(.contained_in))]
    UnknownRole {
        role: RoleId,
        contained_in: Option<RoleId>,
    },

    #[error("role '{0}' leads to a cycle")]
    RoleCycle(RoleId),

    #[error("no unused nick found")]
    NickSpaceExhausted,

    #[error("nick '{0}' already exists")]
    NickTaken(String),

    #[error("session token cache unavailable")]
    SessionUnavailable,

    #[error("invalid authorization value")]
    InvalidAuthorization,

    #[error("configuration: {0}")]
    Configuration(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    pub fn unknown_role(role: RoleId) -> Self {
        Self::UnknownRole {
            role,
            contained_in: None,
        }
    }

    /// Uniform, non-enumerating view for external callers.
    pub fn public(&self) -> PublicError {
        match self {
            AuthError::NotFound
            | AuthError::Inactive
            | AuthError::InvalidPassword
            | AuthError::InvalidSecret
            | AuthError::InvalidAuthorization => PublicError::Unauthenticated,
            AuthError::InvalidPin | AuthError::TokenNotFound | AuthError::TokenExpired => {
                PublicError::EnrollmentRejected
            }
            AuthError::UnknownRole { .. }
            | AuthError::RoleCycle(_)
            | AuthError::NickTaken(_)
            | AuthError::Configuration(_) => PublicError::Misconfigured,
            AuthError::NickSpaceExhausted
            | AuthError::SessionUnavailable
            | AuthError::Storage(_) => PublicError::Unavailable,
        }
    }

    /// True for the failures that must be reported identically to avoid
    /// leaking which nicks exist.
    pub fn is_authentication_failure(&self) -> bool {
        self.public() == PublicError::Unauthenticated
    }
}

impl From<ConfigError> for AuthError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

fn container_suffix(contained_in: &Option<RoleId>) -> String {
    contained_in
        .as_ref()
        .map(|r| format!(" (contained in '{r}')"))
        .unwrap_or_default()
}

/// What an external caller is allowed to learn about a failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PublicError {
    #[error("authentication failed")]
    Unauthenticated,

    #[error("enrollment rejected")]
    EnrollmentRejected,

    #[error("service misconfigured")]
    Misconfigured,

    #[error("service unavailable")]
    Unavailable,
}
