//! Provisioning of new entities through one-time enrollment tokens.
//!
//! An administrator issues a token + PIN out of band; whoever holds both can
//! create exactly one entity with generated credentials.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use keyward_core::{Clock, Nick, has_expired};

use crate::store::{EnrollmentTokenStore, EntityStore};
use crate::{AuthError, Entity, NewEntity, RoleId, secrets};

/// Nick generation attempts before giving up.
pub const MAX_NICK_ATTEMPTS: usize = 32;

/// Single-use credential for creating a new entity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentToken {
    pub token: String,
    pub pin: String,
    pub valid_until: DateTime<Utc>,
}

impl core::fmt::Debug for EnrollmentToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EnrollmentToken")
            .field("token", &"<redacted>")
            .field("pin", &"<redacted>")
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

impl EnrollmentToken {
    /// Fresh random token and PIN valid for `validity` from `now`.
    pub fn generate(now: DateTime<Utc>, validity: Duration) -> Result<Self, AuthError> {
        let valid_until = now.checked_add_signed(validity).ok_or_else(|| {
            AuthError::Configuration("enrollment token validity out of range".to_string())
        })?;
        Ok(Self {
            token: secrets::enrollment_token(),
            pin: secrets::pin(),
            valid_until,
        })
    }
}

/// Creates entities from enrollment tokens.
pub struct EnrollmentEngine {
    entities: Arc<dyn EntityStore>,
    tokens: Arc<dyn EnrollmentTokenStore>,
    clock: Arc<dyn Clock>,
    token_validity: Duration,
    hash_cost: u32,
    in_flight: Mutex<HashSet<String>>,
}

impl EnrollmentEngine {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        tokens: Arc<dyn EnrollmentTokenStore>,
        clock: Arc<dyn Clock>,
        token_validity: Duration,
        hash_cost: u32,
    ) -> Self {
        Self {
            entities,
            tokens,
            clock,
            token_validity,
            hash_cost,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Issue and persist a new enrollment token.
    pub fn new_enrollment_token(&self) -> Result<EnrollmentToken, AuthError> {
        let token = EnrollmentToken::generate(self.clock.now(), self.token_validity)?;
        self.tokens.save_enrollment_token(&token)?;
        tracing::info!(valid_until = %token.valid_until, "enrollment token issued");
        Ok(token)
    }

    /// Consume `token` + `pin` and create an entity holding `default_roles`.
    ///
    /// The token is deleted only after the entity has been persisted. Two
    /// concurrent calls with the same token never both succeed: while one call
    /// holds the token, any other call fails fast with `TokenNotFound`, even
    /// if the holder later fails (wrong PIN, expiry, storage). The token stays
    /// stored in that case and can be retried.
    pub fn new_entity(
        &self,
        token: &str,
        pin: &str,
        default_roles: &[RoleId],
    ) -> Result<NewEntity, AuthError> {
        let _claim = self.claim(token).ok_or(AuthError::TokenNotFound)?;

        let stored = self
            .tokens
            .read_enrollment_token(token)?
            .ok_or(AuthError::TokenNotFound)?;
        let now = self.clock.now();
        if has_expired(stored.valid_until, now) {
            tracing::warn!("enrollment rejected: token expired");
            return Err(AuthError::TokenExpired);
        }
        if !secrets::constant_time_eq(&stored.pin, pin) {
            tracing::warn!("enrollment rejected: PIN mismatch");
            return Err(AuthError::InvalidPin);
        }

        let password = secrets::password();
        let secret = secrets::secret();
        let nick = self.unused_nick()?;
        let entity = Entity::with_credentials(nick, &password, &secret, self.hash_cost, now)?
            .with_roles(default_roles);

        self.entities.save_entity(&entity)?;
        if let Err(err) = self.tokens.delete_enrollment_token(token) {
            tracing::error!(nick = %entity.nick, error = %err, "entity created but enrollment token not deleted");
            return Err(err.into());
        }

        tracing::info!(nick = %entity.nick, roles = entity.roles.len(), "entity enrolled");
        Ok(NewEntity {
            entity,
            password,
            secret,
        })
    }

    fn unused_nick(&self) -> Result<Nick, AuthError> {
        for _ in 0..MAX_NICK_ATTEMPTS {
            let nick = Nick::new(secrets::nick());
            if !self.entities.entity_exists(&nick)? {
                return Ok(nick);
            }
        }
        tracing::error!(attempts = MAX_NICK_ATTEMPTS, "no unused nick found");
        Err(AuthError::NickSpaceExhausted)
    }

    fn claim(&self, token: &str) -> Option<Claim<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(token.to_string()) {
            return None;
        }
        Some(Claim {
            in_flight: &self.in_flight,
            token: token.to_string(),
        })
    }
}

/// Marks a token as being consumed until dropped.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    token: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.token);
    }
}
