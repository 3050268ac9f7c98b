//! Public surface of the identity engine.
//!
//! One [`IdentityEngine`] owns its caches and role snapshot; several engines
//! can live side by side in one process. Store calls are never made while a
//! cache or snapshot lock is held.

use std::sync::{Arc, RwLock};

use keyward_core::{Clock, EngineConfig, Nick, SystemClock};

use crate::credentials::{AuthAttempt, CredentialVerifier, SignInPolicy};
use crate::enrollment::EnrollmentEngine;
use crate::roles::{builtin_default_roles, builtin_roles};
use crate::store::{EnrollmentTokenStore, EntityStore, RoleStore};
use crate::{
    AuthError, AuthorizationCache, EnrollmentToken, Entity, NewEntity, PublicEntity, RoleGraph,
    RoleId, RoleMap, SessionToken, SessionTokenCache, header,
};

/// Storage backends an engine runs against.
#[derive(Clone)]
pub struct Stores {
    pub entities: Arc<dyn EntityStore>,
    pub enrollment_tokens: Arc<dyn EnrollmentTokenStore>,
    pub roles: Arc<dyn RoleStore>,
}

impl Stores {
    /// Use one backend for every kind of record.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: EntityStore + EnrollmentTokenStore + RoleStore + 'static,
    {
        Self {
            entities: store.clone(),
            enrollment_tokens: store.clone(),
            roles: store,
        }
    }
}

/// Validated roles plus the defaults handed to newly enrolled entities.
#[derive(Debug, Clone)]
pub struct RoleSnapshot {
    pub graph: RoleGraph,
    pub default_roles: Vec<RoleId>,
}

impl RoleSnapshot {
    pub fn new(graph: RoleGraph, default_roles: Vec<RoleId>) -> Result<Self, AuthError> {
        graph.ensure_defined(&default_roles)?;
        Ok(Self {
            graph,
            default_roles,
        })
    }
}

pub struct IdentityEngine {
    config: EngineConfig,
    stores: Stores,
    sessions: Arc<SessionTokenCache>,
    authorizations: Arc<AuthorizationCache>,
    roles: RwLock<Arc<RoleSnapshot>>,
    verifier: CredentialVerifier,
    enrollment: EnrollmentEngine,
    clock: Arc<dyn Clock>,
}

impl IdentityEngine {
    /// Build an engine on the wall clock.
    pub fn new(config: EngineConfig, stores: Stores) -> Result<Self, AuthError> {
        Self::with_clock(config, stores, Arc::new(SystemClock))
    }

    /// Build an engine reading time from `clock`. Loads and validates roles.
    pub fn with_clock(
        config: EngineConfig,
        stores: Stores,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        config.validate()?;

        let snapshot = load_snapshot(stores.roles.as_ref())?;
        let sessions = Arc::new(SessionTokenCache::new(clock.clone()));
        let authorizations = Arc::new(AuthorizationCache::new());
        let verifier = CredentialVerifier::new(
            stores.entities.clone(),
            sessions.clone(),
            authorizations.clone(),
            clock.clone(),
            SignInPolicy {
                max_sign_in_attempts: config.max_sign_in_attempts,
                session_validity: config.session_token_validity(),
                hash_cost: config.password_hash_cost,
            },
        );
        let enrollment = EnrollmentEngine::new(
            stores.entities.clone(),
            stores.enrollment_tokens.clone(),
            clock.clone(),
            config.enrollment_token_validity(),
            config.password_hash_cost,
        );

        tracing::info!(
            server_id = %config.server_id,
            roles = snapshot.graph.len(),
            "identity engine initialized"
        );

        Ok(Self {
            config,
            stores,
            sessions,
            authorizations,
            roles: RwLock::new(Arc::new(snapshot)),
            verifier,
            enrollment,
            clock,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Authentication ──────────────────────────────────────────────────────

    pub fn check_identity(
        &self,
        nick: &str,
        password: &str,
        valid_for: &str,
    ) -> Result<SessionToken, AuthError> {
        let roles = self.role_snapshot();
        self.verifier
            .check_identity(&Nick::new(nick), password, valid_for, &roles.graph)
    }

    pub fn check_auth_identity(&self, header_value: &str, valid_for: &str) -> AuthAttempt {
        let roles = self.role_snapshot();
        self.verifier
            .check_auth_identity(header_value, &self.config.auth_scheme, valid_for, &roles.graph)
    }

    pub fn is_session_token_valid(&self, token: &str, valid_for: &str) -> bool {
        self.sessions.is_valid(token, valid_for)
    }

    /// Like [`Self::is_session_token_valid`] for an `Authorization` header value.
    pub fn is_auth_session_token_valid(&self, header_value: &str, valid_for: &str) -> bool {
        header::parse_token(header_value, &self.config.auth_scheme)
            .is_some_and(|token| self.sessions.is_valid(&token, valid_for))
    }

    /// Nick behind a session token, ignoring expiry.
    pub fn nick_of(&self, token: &str) -> Option<Nick> {
        self.sessions.get_nick(token)
    }

    /// End a session early.
    pub fn sign_out(&self, token: &str) -> bool {
        self.sessions.revoke(token)
    }

    pub fn sweep_expired_sessions(&self) -> usize {
        let swept = self.sessions.sweep_expired();
        tracing::debug!(swept, "session sweep finished");
        swept
    }

    // ── Authorization ───────────────────────────────────────────────────────

    /// Whether the holder of `token` may perform `action` on `resource`.
    /// Expired tokens are denied.
    pub fn is_authorized(&self, token: &str, resource: &str, action: &str) -> bool {
        self.authorizations
            .is_authorized(&self.sessions, token, resource, action)
    }

    /// Like [`Self::is_authorized`], additionally requiring the token to be
    /// presented from the context it was issued for.
    pub fn is_authorized_for(
        &self,
        token: &str,
        valid_for: &str,
        resource: &str,
        action: &str,
    ) -> bool {
        match self.sessions.nick_for(token, valid_for) {
            Some(nick) => self.authorizations.is_permitted(&nick, resource, action),
            None => false,
        }
    }

    // ── Provisioning ────────────────────────────────────────────────────────

    pub fn new_enrollment_token(&self) -> Result<EnrollmentToken, AuthError> {
        self.enrollment.new_enrollment_token()
    }

    pub fn new_entity(&self, enrollment_token: &str, pin: &str) -> Result<NewEntity, AuthError> {
        let roles = self.role_snapshot();
        self.enrollment
            .new_entity(enrollment_token, pin, &roles.default_roles)
    }

    /// Administrative creation of an entity with chosen credentials.
    pub fn create_entity(
        &self,
        nick: &str,
        password: &str,
        secret: &str,
        roles: &[RoleId],
    ) -> Result<Entity, AuthError> {
        let nick: Nick = nick.parse()?;
        self.role_snapshot().graph.ensure_defined(roles)?;
        if self.stores.entities.entity_exists(&nick)? {
            return Err(AuthError::NickTaken(nick.into_inner()));
        }

        let entity = Entity::with_credentials(
            nick,
            password,
            secret,
            self.config.password_hash_cost,
            self.clock.now(),
        )?
        .with_roles(roles);
        self.stores.entities.save_entity(&entity)?;
        tracing::info!(nick = %entity.nick, "entity created by administrator");
        Ok(entity)
    }

    pub fn public_entity(&self, nick: &str) -> Result<PublicEntity, AuthError> {
        self.stores
            .entities
            .read_entity(&Nick::new(nick))?
            .map(|e| e.to_public())
            .ok_or(AuthError::NotFound)
    }

    pub fn recover_entity(&self, nick: &str, secret: &str) -> Result<String, AuthError> {
        self.verifier.recover(&Nick::new(nick), secret)
    }

    // ── Role administration ─────────────────────────────────────────────────

    /// Current validated role snapshot.
    pub fn role_snapshot(&self) -> Arc<RoleSnapshot> {
        match self.roles.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn default_roles(&self) -> Vec<RoleId> {
        self.role_snapshot().default_roles.clone()
    }

    /// Re-read roles from the store. On failure the current snapshot stays.
    pub fn reload_roles(&self) -> Result<(), AuthError> {
        let snapshot = load_snapshot(self.stores.roles.as_ref()).inspect_err(|err| {
            tracing::error!(error = %err, "role reload rejected; keeping previous roles");
        })?;
        self.install(snapshot);
        Ok(())
    }

    /// Validate, persist and activate a new role set.
    pub fn save_roles(&self, roles: RoleMap) -> Result<(), AuthError> {
        let defaults = self.default_roles();
        let snapshot = RoleGraph::new(roles)
            .and_then(|graph| RoleSnapshot::new(graph, defaults))
            .inspect_err(|err| tracing::error!(error = %err, "role set rejected"))?;
        self.stores.roles.save_roles(snapshot.graph.roles())?;
        self.install(snapshot);
        Ok(())
    }

    /// Validate, persist and activate the roles given to new entities.
    pub fn save_default_roles(&self, default_roles: Vec<RoleId>) -> Result<(), AuthError> {
        let graph = self.role_snapshot().graph.clone();
        let snapshot = RoleSnapshot::new(graph, default_roles)?;
        self.stores.roles.save_default_roles(&snapshot.default_roles)?;
        self.install(snapshot);
        Ok(())
    }

    fn install(&self, snapshot: RoleSnapshot) {
        let count = snapshot.graph.len();
        match self.roles.write() {
            Ok(mut current) => *current = Arc::new(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(snapshot),
        }
        tracing::info!(roles = count, "role set activated");
    }
}

/// Read roles and defaults, falling back to the built-in set when empty.
fn load_snapshot(store: &dyn RoleStore) -> Result<RoleSnapshot, AuthError> {
    let mut roles = store.read_roles()?;
    if roles.is_empty() {
        tracing::info!("no roles stored; using built-in roles");
        roles = builtin_roles();
    }
    let graph = RoleGraph::new(roles)?;

    let mut defaults = store.read_default_roles()?;
    if defaults.is_empty() {
        defaults = builtin_default_roles();
    }
    RoleSnapshot::new(graph, defaults)
}
