use std::sync::Arc;

use keyward_core::{Nick, StoreResult};

use crate::{EnrollmentToken, Entity, RoleId, RoleMap};

/// Persistence of entity records.
pub trait EntityStore: Send + Sync {
    /// `Ok(None)` when no entity has this nick.
    fn read_entity(&self, nick: &Nick) -> StoreResult<Option<Entity>>;
    fn entity_exists(&self, nick: &Nick) -> StoreResult<bool>;
    /// Insert or overwrite the entity keyed by its nick.
    fn save_entity(&self, entity: &Entity) -> StoreResult<()>;
}

/// Persistence of one-time enrollment tokens.
pub trait EnrollmentTokenStore: Send + Sync {
    fn save_enrollment_token(&self, token: &EnrollmentToken) -> StoreResult<()>;
    fn read_enrollment_token(&self, token: &str) -> StoreResult<Option<EnrollmentToken>>;
    fn delete_enrollment_token(&self, token: &str) -> StoreResult<()>;
}

/// Persistence of role definitions and of the default role assignment.
pub trait RoleStore: Send + Sync {
    fn read_roles(&self) -> StoreResult<RoleMap>;
    fn read_default_roles(&self) -> StoreResult<Vec<RoleId>>;
    fn save_roles(&self, roles: &RoleMap) -> StoreResult<()>;
    fn save_default_roles(&self, roles: &[RoleId]) -> StoreResult<()>;
}

impl<S> EntityStore for Arc<S>
where
    S: EntityStore + ?Sized,
{
    fn read_entity(&self, nick: &Nick) -> StoreResult<Option<Entity>> {
        (**self).read_entity(nick)
    }

    fn entity_exists(&self, nick: &Nick) -> StoreResult<bool> {
        (**self).entity_exists(nick)
    }

    fn save_entity(&self, entity: &Entity) -> StoreResult<()> {
        (**self).save_entity(entity)
    }
}

impl<S> EnrollmentTokenStore for Arc<S>
where
    S: EnrollmentTokenStore + ?Sized,
{
    fn save_enrollment_token(&self, token: &EnrollmentToken) -> StoreResult<()> {
        (**self).save_enrollment_token(token)
    }

    fn read_enrollment_token(&self, token: &str) -> StoreResult<Option<EnrollmentToken>> {
        (**self).read_enrollment_token(token)
    }

    fn delete_enrollment_token(&self, token: &str) -> StoreResult<()> {
        (**self).delete_enrollment_token(token)
    }
}

impl<S> RoleStore for Arc<S>
where
    S: RoleStore + ?Sized,
{
    fn read_roles(&self) -> StoreResult<RoleMap> {
        (**self).read_roles()
    }

    fn read_default_roles(&self) -> StoreResult<Vec<RoleId>> {
        (**self).read_default_roles()
    }

    fn save_roles(&self, roles: &RoleMap) -> StoreResult<()> {
        (**self).save_roles(roles)
    }

    fn save_default_roles(&self, roles: &[RoleId]) -> StoreResult<()> {
        (**self).save_default_roles(roles)
    }
}
