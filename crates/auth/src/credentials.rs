//! Credential verification, lockout and session issuance.

use std::sync::{Arc, OnceLock};

use chrono::Duration;

use keyward_core::{Clock, Nick};

use crate::store::EntityStore;
use crate::{AuthError, AuthorizationCache, RoleGraph, SessionToken, SessionTokenCache, header, secrets};

/// Token generation attempts before the session cache is considered unusable.
const MAX_TOKEN_ATTEMPTS: usize = 8;

/// Outcome of a header-based sign-in, with the nick that was tried (if the
/// header could be decoded) for the host's audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttempt {
    pub nick: Option<Nick>,
    pub result: Result<SessionToken, AuthError>,
}

/// Lockout and session policy applied by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignInPolicy {
    pub max_sign_in_attempts: u32,
    pub session_validity: Duration,
    pub hash_cost: u32,
}

pub struct CredentialVerifier {
    entities: Arc<dyn EntityStore>,
    sessions: Arc<SessionTokenCache>,
    authorizations: Arc<AuthorizationCache>,
    clock: Arc<dyn Clock>,
    policy: SignInPolicy,
    // Hash of a random password, verified against when the nick is unknown.
    decoy_hash: OnceLock<String>,
}

impl CredentialVerifier {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        sessions: Arc<SessionTokenCache>,
        authorizations: Arc<AuthorizationCache>,
        clock: Arc<dyn Clock>,
        policy: SignInPolicy,
    ) -> Self {
        Self {
            entities,
            sessions,
            authorizations,
            clock,
            policy,
            decoy_hash: OnceLock::new(),
        }
    }

    pub fn policy(&self) -> SignInPolicy {
        self.policy
    }

    /// Verify `nick` + `password` and issue a session token bound to `valid_for`.
    ///
    /// On success the entity's authorizations are re-materialized from `roles`.
    pub fn check_identity(
        &self,
        nick: &Nick,
        password: &str,
        valid_for: &str,
        roles: &RoleGraph,
    ) -> Result<SessionToken, AuthError> {
        let Some(mut entity) = self.entities.read_entity(nick)? else {
            // Spend the same bcrypt work as a wrong password would.
            self.decoy_verify(password);
            return Err(AuthError::NotFound);
        };

        // Never compare the password of a locked entity.
        if !entity.active {
            tracing::warn!(%nick, "sign-in refused: entity inactive");
            return Err(AuthError::Inactive);
        }

        let now = self.clock.now();
        if !secrets::verify(password, &entity.password_hash) {
            let locked = entity.record_failed_sign_in(self.policy.max_sign_in_attempts, now);
            // Losing this write would lose the lockout counter: surface it.
            self.entities.save_entity(&entity)?;
            if locked {
                tracing::warn!(%nick, attempts = entity.wrong_password_counter, "entity locked after repeated wrong passwords");
            } else {
                tracing::warn!(%nick, attempts = entity.wrong_password_counter, "sign-in failed: wrong password");
            }
            return Err(AuthError::InvalidPassword);
        }

        entity.record_sign_in(now);
        if let Err(err) = self.entities.save_entity(&entity) {
            tracing::warn!(%nick, error = %err, "sign-in bookkeeping not persisted");
        }

        let session = self.issue_session(nick, valid_for)?;

        if let Err(err) = self.authorizations.refresh(&entity, roles) {
            tracing::warn!(%nick, error = %err, "authorizations not resolved; access denied until next sign-in");
        }

        tracing::info!(%nick, valid_until = %session.valid_until, "signed in");
        Ok(session)
    }

    /// Sign in from an `Authorization` header value (`<scheme> base64(nick:password)`).
    pub fn check_auth_identity(
        &self,
        header_value: &str,
        scheme: &str,
        valid_for: &str,
        roles: &RoleGraph,
    ) -> AuthAttempt {
        match header::parse_credentials(header_value, scheme) {
            Ok((nick, password)) => {
                let result = self.check_identity(&nick, &password, valid_for, roles);
                AuthAttempt {
                    nick: Some(nick),
                    result,
                }
            }
            Err(err) => AuthAttempt {
                nick: None,
                result: Err(err),
            },
        }
    }

    /// Unlock an entity with its secret and give it a fresh generated password.
    ///
    /// Returns the new plaintext password; it is not stored anywhere.
    pub fn recover(&self, nick: &Nick, secret: &str) -> Result<String, AuthError> {
        let mut entity = self.entities.read_entity(nick)?.ok_or(AuthError::NotFound)?;
        if !secrets::verify(secret, &entity.secret_hash) {
            tracing::warn!(%nick, "recovery refused: wrong secret");
            return Err(AuthError::InvalidSecret);
        }

        let password = secrets::password();
        let now = self.clock.now();
        entity.password_hash = secrets::hash(&password, self.policy.hash_cost)?;
        entity.active = true;
        entity.wrong_password_counter = 0;
        entity.updated_at = now;
        self.entities.save_entity(&entity)?;

        tracing::info!(%nick, "entity recovered with secret");
        Ok(password)
    }

    fn decoy_verify(&self, password: &str) {
        let hash = self.decoy_hash.get_or_init(|| {
            secrets::hash(&secrets::password(), self.policy.hash_cost).unwrap_or_default()
        });
        if !hash.is_empty() {
            let _ = secrets::verify(password, hash);
        }
    }

    fn issue_session(&self, nick: &Nick, valid_for: &str) -> Result<SessionToken, AuthError> {
        let valid_until = self
            .clock
            .now()
            .checked_add_signed(self.policy.session_validity)
            .ok_or_else(|| {
                tracing::error!(%nick, "session lifetime overflows the clock");
                AuthError::Configuration("session token validity out of range".to_string())
            })?;
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = secrets::session_token();
            if self.sessions.add(&token, valid_until, valid_for, nick) {
                return Ok(SessionToken { token, valid_until });
            }
        }
        tracing::error!(%nick, "session token could not be stored");
        Err(AuthError::SessionUnavailable)
    }
}
