//! Infrastructure layer: durable storage and configuration loading.

pub mod config;
pub mod file_store;

mod integration_tests;

pub use file_store::FileStore;
