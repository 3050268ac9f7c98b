//! `keyward-auth`: identity and access engine.
//!
//! Enrollment, credential checks, session tokens and role-based authorization.
//! Storage is reached only through the traits in [`store`]; nothing here
//! knows about HTTP.

pub mod authz_cache;
pub mod credentials;
pub mod engine;
pub mod enrollment;
pub mod entity;
pub mod error;
pub mod header;
pub mod resource;
pub mod roles;
pub mod secrets;
pub mod session;
pub mod store;

pub use authz_cache::AuthorizationCache;
pub use credentials::{AuthAttempt, CredentialVerifier, SignInPolicy};
pub use engine::{IdentityEngine, RoleSnapshot, Stores};
pub use enrollment::{EnrollmentEngine, EnrollmentToken};
pub use entity::{Entity, NewEntity, PublicEntity};
pub use error::{AuthError, PublicError};
pub use resource::{Action, ActionSet, Authorization, ResourcePattern, contains};
pub use roles::{RoleBody, RoleGraph, RoleId, RoleMap};
pub use session::{SessionToken, SessionTokenCache};
