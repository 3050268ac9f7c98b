//! `keyward-core`: identity primitives shared by every layer.
//!
//! This crate contains **pure** building blocks (no storage, no transport).

pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock, has_expired};
pub use config::{ConfigError, EngineConfig};
pub use error::{StoreError, StoreResult};
pub use id::Nick;
