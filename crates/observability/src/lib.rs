//! Process-wide logging setup for hosts embedding the identity engine.

/// Tracing subscriber configuration.
pub mod tracing;

pub use crate::tracing::{DEFAULT_FILTER, LogFormat};

/// Install JSON logging filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() -> bool {
    tracing::install(tracing::env_filter(DEFAULT_FILTER), LogFormat::Json)
}

/// Install JSON logging with an explicit filter directive, ignoring `RUST_LOG`.
pub fn init_with_filter(directives: &str) -> bool {
    tracing::install(tracing::parse_filter(directives), LogFormat::Json)
}
