//! Storage boundary.
//!
//! The engine only depends on these capability traits. Durable backends live
//! outside this crate; an in-memory double is provided for tests and demos.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use r#trait::{EnrollmentTokenStore, EntityStore, RoleStore};
