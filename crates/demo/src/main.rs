//! Walks one entity through enrollment, sign-in and authorization.
//!
//! `KEYWARD_CONFIG` points at a JSON config file; `KEYWARD_DATA_DIR` switches
//! from the in-memory store to the file store.

use std::sync::Arc;

use anyhow::Context;
use keyward_auth::store::InMemoryStore;
use keyward_auth::{IdentityEngine, Stores, header};
use keyward_infra::{FileStore, config};

const CLIENT: &str = "127.0.0.1";

fn main() -> anyhow::Result<()> {
    keyward_observability::init();

    let engine_config = match std::env::var("KEYWARD_CONFIG") {
        Ok(path) => config::load(&path)?,
        Err(_) => config::from_env()?,
    };

    let stores = match std::env::var("KEYWARD_DATA_DIR") {
        Ok(dir) => Stores::shared(Arc::new(
            FileStore::open(&dir).with_context(|| format!("failed to open store at {dir}"))?,
        )),
        Err(_) => {
            tracing::warn!("KEYWARD_DATA_DIR not set; using in-memory store");
            Stores::shared(Arc::new(InMemoryStore::new()))
        }
    };

    let scheme = engine_config.auth_scheme.clone();
    let engine = IdentityEngine::new(engine_config, stores)?;

    // An operator hands token and PIN to the new client out of band.
    let enrollment = engine.new_enrollment_token()?;
    let created = engine.new_entity(&enrollment.token, &enrollment.pin)?;
    tracing::info!(nick = %created.entity.nick, roles = ?created.entity.roles, "entity enrolled");

    // The client signs in through the Authorization header convention.
    let login = header::encode_credentials(&scheme, &created.entity.nick, &created.password);
    let session = engine.check_auth_identity(&login, CLIENT).result?;

    for (resource, action) in [("application", "use"), ("keyward", "delete")] {
        let allowed = engine.is_authorized_for(&session.token, CLIENT, resource, action);
        tracing::info!(resource, action, allowed, "authorization decision");
    }

    engine.sign_out(&session.token);
    Ok(())
}
