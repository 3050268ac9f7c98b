//! Engine configuration.
//!
//! The host owns where configuration comes from; this module only defines the
//! shape, the defaults and the validation rules.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lowest work factor bcrypt accepts.
pub const MIN_HASH_COST: u32 = 4;
/// Highest work factor bcrypt accepts.
pub const MAX_HASH_COST: u32 = 31;

/// Longest session token lifetime accepted (ten years).
pub const MAX_SESSION_TOKEN_VALIDITY_SECS: i64 = 10 * 365 * 24 * 60 * 60;
/// Longest enrollment token lifetime accepted (ten years).
pub const MAX_ENROLLMENT_TOKEN_VALIDITY_HOURS: i64 = 10 * 365 * 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Runtime parameters of an identity engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifier of this engine instance (for logs and audit).
    pub server_id: String,

    /// Consecutive wrong passwords tolerated; one more locks the entity.
    pub max_sign_in_attempts: u32,

    /// Lifetime of a session token.
    pub session_token_validity_secs: i64,

    /// Lifetime of an enrollment token.
    pub enrollment_token_validity_hours: i64,

    /// Scheme name used by the `Authorization` header convention.
    pub auth_scheme: String,

    /// bcrypt work factor for password and secret hashes.
    pub password_hash_cost: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_id: Uuid::now_v7().to_string(),
            max_sign_in_attempts: 5,
            session_token_validity_secs: 720,
            enrollment_token_validity_hours: 168,
            auth_scheme: "keyward".to_string(),
            password_hash_cost: 12,
        }
    }
}

impl EngineConfig {
    /// Session lifetime, clamped to the range [`Self::validate`] accepts.
    pub fn session_token_validity(&self) -> Duration {
        Duration::seconds(
            self.session_token_validity_secs
                .clamp(0, MAX_SESSION_TOKEN_VALIDITY_SECS),
        )
    }

    /// Enrollment token lifetime, clamped to the range [`Self::validate`] accepts.
    pub fn enrollment_token_validity(&self) -> Duration {
        Duration::hours(
            self.enrollment_token_validity_hours
                .clamp(0, MAX_ENROLLMENT_TOKEN_VALIDITY_HOURS),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sign_in_attempts == 0 {
            return Err(ConfigError::invalid(
                "max_sign_in_attempts",
                "must be at least 1",
            ));
        }
        if !(1..=MAX_SESSION_TOKEN_VALIDITY_SECS).contains(&self.session_token_validity_secs) {
            return Err(ConfigError::invalid(
                "session_token_validity_secs",
                format!("must be within 1..={MAX_SESSION_TOKEN_VALIDITY_SECS}"),
            ));
        }
        if !(1..=MAX_ENROLLMENT_TOKEN_VALIDITY_HOURS)
            .contains(&self.enrollment_token_validity_hours)
        {
            return Err(ConfigError::invalid(
                "enrollment_token_validity_hours",
                format!("must be within 1..={MAX_ENROLLMENT_TOKEN_VALIDITY_HOURS}"),
            ));
        }
        let scheme = self.auth_scheme.trim();
        if scheme.is_empty() || scheme.contains(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "auth_scheme",
                "must be a single non-empty word",
            ));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.password_hash_cost) {
            return Err(ConfigError::invalid(
                "password_hash_cost",
                format!("must be within {MIN_HASH_COST}..={MAX_HASH_COST}"),
            ));
        }
        Ok(())
    }
}
