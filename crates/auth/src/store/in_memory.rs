use std::collections::HashMap;
use std::sync::RwLock;

use keyward_core::{Nick, StoreError, StoreResult};

use super::r#trait::{EnrollmentTokenStore, EntityStore, RoleStore};
use crate::{EnrollmentToken, Entity, RoleId, RoleMap};

/// Non-persistent store for tests and demonstrations.
///
/// Implements every storage trait so one instance can back a whole engine.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entities: RwLock<HashMap<Nick, Entity>>,
    enrollment_tokens: RwLock<HashMap<String, EnrollmentToken>>,
    roles: RwLock<RoleMap>,
    default_roles: RwLock<Vec<RoleId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn enrollment_token_count(&self) -> usize {
        self.enrollment_tokens.read().map(|m| m.len()).unwrap_or(0)
    }
}

impl EntityStore for InMemoryStore {
    fn read_entity(&self, nick: &Nick) -> StoreResult<Option<Entity>> {
        let map = self.entities.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(nick).cloned())
    }

    fn entity_exists(&self, nick: &Nick) -> StoreResult<bool> {
        let map = self.entities.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.contains_key(nick))
    }

    fn save_entity(&self, entity: &Entity) -> StoreResult<()> {
        let mut map = self.entities.write().map_err(|_| StoreError::LockPoisoned)?;
        map.insert(entity.nick.clone(), entity.clone());
        Ok(())
    }
}

impl EnrollmentTokenStore for InMemoryStore {
    fn save_enrollment_token(&self, token: &EnrollmentToken) -> StoreResult<()> {
        let mut map = self
            .enrollment_tokens
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        map.insert(token.token.clone(), token.clone());
        Ok(())
    }

    fn read_enrollment_token(&self, token: &str) -> StoreResult<Option<EnrollmentToken>> {
        let map = self
            .enrollment_tokens
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(token).cloned())
    }

    fn delete_enrollment_token(&self, token: &str) -> StoreResult<()> {
        let mut map = self
            .enrollment_tokens
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        map.remove(token);
        Ok(())
    }
}

impl RoleStore for InMemoryStore {
    fn read_roles(&self) -> StoreResult<RoleMap> {
        let roles = self.roles.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(roles.clone())
    }

    fn read_default_roles(&self) -> StoreResult<Vec<RoleId>> {
        let roles = self
            .default_roles
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(roles.clone())
    }

    fn save_roles(&self, roles: &RoleMap) -> StoreResult<()> {
        let mut current = self.roles.write().map_err(|_| StoreError::LockPoisoned)?;
        *current = roles.clone();
        Ok(())
    }

    fn save_default_roles(&self, roles: &[RoleId]) -> StoreResult<()> {
        let mut current = self
            .default_roles
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        *current = roles.to_vec();
        Ok(())
    }
}
