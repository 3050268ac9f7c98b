//! Loading [`EngineConfig`] from disk and the environment.
//!
//! Sources, later wins:
//! 1. built-in defaults
//! 2. the JSON file (missing fields keep their default)
//! 3. `KEYWARD_*` environment variables

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

use keyward_core::EngineConfig;

pub const ENV_PREFIX: &str = "KEYWARD_";

/// Read `path`, apply environment overrides, validate.
pub fn load(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read engine config at {:?}", path))?;
    let config: EngineConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse engine config at {:?}", path))?;
    finish(config, |key| std::env::var(key).ok())
}

/// Defaults plus environment overrides, for hosts without a config file.
pub fn from_env() -> Result<EngineConfig> {
    finish(EngineConfig::default(), |key| std::env::var(key).ok())
}

fn finish(
    mut config: EngineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EngineConfig> {
    apply_overrides(&mut config, lookup)?;
    config.validate().context("engine config rejected")?;
    tracing::info!(
        server_id = %config.server_id,
        max_sign_in_attempts = config.max_sign_in_attempts,
        session_token_validity_secs = config.session_token_validity_secs,
        "engine config loaded"
    );
    Ok(config)
}

/// Overwrite fields whose `KEYWARD_<FIELD>` variable is set.
pub fn apply_overrides(
    config: &mut EngineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let var = |field: &str| lookup(&format!("{ENV_PREFIX}{}", field.to_ascii_uppercase()));

    if let Some(v) = var("server_id") {
        config.server_id = v;
    }
    if let Some(v) = var("auth_scheme") {
        config.auth_scheme = v;
    }
    if let Some(v) = var("max_sign_in_attempts") {
        config.max_sign_in_attempts = parse("max_sign_in_attempts", &v)?;
    }
    if let Some(v) = var("session_token_validity_secs") {
        config.session_token_validity_secs = parse("session_token_validity_secs", &v)?;
    }
    if let Some(v) = var("enrollment_token_validity_hours") {
        config.enrollment_token_validity_hours = parse("enrollment_token_validity_hours", &v)?;
    }
    if let Some(v) = var("password_hash_cost") {
        config.password_hash_cost = parse("password_hash_cost", &v)?;
    }
    Ok(())
}

fn parse<T>(field: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().with_context(|| {
        format!(
            "invalid value {value:?} for {ENV_PREFIX}{}",
            field.to_ascii_uppercase()
        )
    })
}
