//! Per-principal materialized authorizations.
//!
//! The role graph is resolved once per sign-in so every authorization check
//! is a scan over a flat, merged list.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use keyward_core::Nick;

use crate::{AuthError, Authorization, Entity, RoleGraph, SessionTokenCache};

#[derive(Debug, Default)]
pub struct AuthorizationCache {
    entries: RwLock<HashMap<Nick, Arc<Vec<Authorization>>>>,
}

impl AuthorizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the entity's roles against `graph` and overwrite whatever was
    /// cached for its nick. Returns the number of merged entries.
    ///
    /// On failure the nick's previous entry is removed, so a principal whose
    /// roles no longer resolve is denied everything.
    pub fn refresh(&self, entity: &Entity, graph: &RoleGraph) -> Result<usize, AuthError> {
        // Resolve before taking the lock; resolution may walk a large graph.
        match graph.resolve(&entity.roles) {
            Ok(authorizations) => {
                let count = authorizations.len();
                self.replace(&entity.nick, authorizations);
                tracing::debug!(nick = %entity.nick, entries = count, "authorizations refreshed");
                Ok(count)
            }
            Err(err) => {
                self.forget(&entity.nick);
                Err(err)
            }
        }
    }

    pub fn replace(&self, nick: &Nick, authorizations: Vec<Authorization>) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(nick.clone(), Arc::new(authorizations));
            }
            Err(_) => tracing::error!(%nick, "authorization cache lock poisoned; entry not stored"),
        }
    }

    pub fn forget(&self, nick: &Nick) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(nick);
        }
    }

    /// Cached merged authorizations of `nick`.
    pub fn authorizations(&self, nick: &Nick) -> Option<Arc<Vec<Authorization>>> {
        let entries = self.entries.read().ok()?;
        entries.get(nick).cloned()
    }

    /// Whether `nick` may perform `action` on `resource`.
    ///
    /// Linear scan: permit on the first entry whose pattern contains the
    /// resource and whose actions include the action or the wildcard.
    pub fn is_permitted(&self, nick: &Nick, resource: &str, action: &str) -> bool {
        let Some(authorizations) = self.authorizations(nick) else {
            return false;
        };
        authorizations.iter().any(|a| a.permits(resource, action))
    }

    /// Resolve `token` to a nick through the session cache (expired tokens
    /// resolve to nothing) and check its cached authorizations.
    pub fn is_authorized(
        &self,
        sessions: &SessionTokenCache,
        token: &str,
        resource: &str,
        action: &str,
    ) -> bool {
        match sessions.live_nick(token) {
            Some(nick) => self.is_permitted(&nick, resource, action),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
