//! The authenticated principal record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyward_core::Nick;

use crate::{AuthError, RoleId, secrets};

/// A person or device that authenticates against the engine.
///
/// # Invariants
/// - An inactive entity never authenticates, whatever password it presents.
/// - `roles` holds no duplicates and keeps assignment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub nick: Nick,
    pub password_hash: String,
    /// Hash of the long-lived secret used to recover a locked entity.
    pub secret_hash: String,
    pub active: bool,
    pub wrong_password_counter: u32,
    pub last_sign_in_attempt: Option<DateTime<Utc>>,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl Entity {
    /// Build an active entity from already-hashed credentials.
    pub fn new(
        nick: Nick,
        password_hash: String,
        secret_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            nick,
            password_hash,
            secret_hash,
            active: true,
            wrong_password_counter: 0,
            last_sign_in_attempt: None,
            last_sign_in: None,
            created_at: now,
            updated_at: now,
            roles: Vec::new(),
        }
    }

    /// Build an active entity, hashing the plaintext credentials.
    pub fn with_credentials(
        nick: Nick,
        password: &str,
        secret: &str,
        hash_cost: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        Ok(Self::new(
            nick,
            secrets::hash(password, hash_cost)?,
            secrets::hash(secret, hash_cost)?,
            now,
        ))
    }

    /// Append roles not already assigned, keeping order.
    pub fn assign_roles<'a>(&mut self, roles: impl IntoIterator<Item = &'a RoleId>) {
        for role in roles {
            if !self.roles.contains(role) {
                self.roles.push(role.clone());
            }
        }
    }

    pub fn with_roles<'a>(mut self, roles: impl IntoIterator<Item = &'a RoleId>) -> Self {
        self.assign_roles(roles);
        self
    }

    /// Record a wrong password; locks the entity once the counter exceeds
    /// `max_attempts`. Returns whether this attempt caused the lock.
    pub fn record_failed_sign_in(&mut self, max_attempts: u32, now: DateTime<Utc>) -> bool {
        self.wrong_password_counter = self.wrong_password_counter.saturating_add(1);
        self.last_sign_in_attempt = Some(now);
        self.updated_at = now;
        if self.active && self.wrong_password_counter > max_attempts {
            self.active = false;
            return true;
        }
        false
    }

    pub fn record_sign_in(&mut self, now: DateTime<Utc>) {
        self.wrong_password_counter = 0;
        self.last_sign_in_attempt = Some(now);
        self.last_sign_in = Some(now);
        self.updated_at = now;
    }

    pub fn to_public(&self) -> PublicEntity {
        PublicEntity {
            nick: self.nick.clone(),
            active: self.active,
            wrong_password_counter: self.wrong_password_counter,
            last_sign_in_attempt: self.last_sign_in_attempt,
            last_sign_in: self.last_sign_in,
            created_at: self.created_at,
            updated_at: self.updated_at,
            roles: self.roles.clone(),
        }
    }
}

/// An entity without its credential hashes, safe to hand to display/audit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicEntity {
    pub nick: Nick,
    pub active: bool,
    pub wrong_password_counter: u32,
    pub last_sign_in_attempt: Option<DateTime<Utc>>,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<RoleId>,
}

/// Result of a successful enrollment.
///
/// The plaintext credentials exist only here; they are never stored or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct NewEntity {
    pub entity: Entity,
    pub password: String,
    pub secret: String,
}

impl core::fmt::Debug for NewEntity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewEntity")
            .field("entity", &self.entity.to_public())
            .field("password", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}
