//! Durable store backed by JSON files in one directory.
//!
//! Layout under the root:
//!
//! ```text
//! entities/<name>.json           one Entity per file
//! enrollment_tokens/<name>.json  one EnrollmentToken per file
//! roles.json                     RoleMap
//! default_roles.json             [RoleId]
//! ```
//!
//! `<name>` is the URL-safe base64 of the nick or token, so arbitrary nicks
//! cannot escape the directory. Writes go to a temporary file that is then
//! renamed over the target, so readers never observe a half-written record.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use keyward_auth::store::{EnrollmentTokenStore, EntityStore, RoleStore};
use keyward_auth::{EnrollmentToken, Entity, RoleId, RoleMap};
use keyward_core::{Nick, StoreError, StoreResult};

const ENTITY_DIR: &str = "entities";
const ENROLLMENT_TOKEN_DIR: &str = "enrollment_tokens";
const ROLES_FILE: &str = "roles.json";
const DEFAULT_ROLES_FILE: &str = "default_roles.json";

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serializes writers within this process; readers rely on atomic rename.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for dir in [ENTITY_DIR, ENROLLMENT_TOKEN_DIR] {
            fs::create_dir_all(root.join(dir)).map_err(|e| io_error(&root.join(dir), e))?;
        }
        tracing::debug!(root = %root.display(), "file store opened");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, dir: &str, key: &str) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(key)))
    }

    fn write<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
        file.write_all(&bytes).map_err(|e| io_error(&tmp, e))?;
        file.sync_all().map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| io_error(path, e))
    }

    fn remove(&self, path: &Path) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(path, e)),
        }
    }
}

/// `Ok(None)` when the file does not exist.
fn read<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::serialization(format!("{}: {e}", path.display())))
}

fn io_error(path: &Path, err: io::Error) -> StoreError {
    StoreError::io(format!("{}: {err}", path.display()))
}

impl EntityStore for FileStore {
    fn read_entity(&self, nick: &Nick) -> StoreResult<Option<Entity>> {
        read(&self.record_path(ENTITY_DIR, nick.as_str()))
    }

    fn entity_exists(&self, nick: &Nick) -> StoreResult<bool> {
        Ok(self.record_path(ENTITY_DIR, nick.as_str()).is_file())
    }

    fn save_entity(&self, entity: &Entity) -> StoreResult<()> {
        self.write(&self.record_path(ENTITY_DIR, entity.nick.as_str()), entity)
    }
}

impl EnrollmentTokenStore for FileStore {
    fn save_enrollment_token(&self, token: &EnrollmentToken) -> StoreResult<()> {
        self.write(&self.record_path(ENROLLMENT_TOKEN_DIR, &token.token), token)
    }

    fn read_enrollment_token(&self, token: &str) -> StoreResult<Option<EnrollmentToken>> {
        read(&self.record_path(ENROLLMENT_TOKEN_DIR, token))
    }

    fn delete_enrollment_token(&self, token: &str) -> StoreResult<()> {
        self.remove(&self.record_path(ENROLLMENT_TOKEN_DIR, token))
    }
}

impl RoleStore for FileStore {
    fn read_roles(&self) -> StoreResult<RoleMap> {
        Ok(read(&self.root.join(ROLES_FILE))?.unwrap_or_default())
    }

    fn read_default_roles(&self) -> StoreResult<Vec<RoleId>> {
        Ok(read(&self.root.join(DEFAULT_ROLES_FILE))?.unwrap_or_default())
    }

    fn save_roles(&self, roles: &RoleMap) -> StoreResult<()> {
        self.write(&self.root.join(ROLES_FILE), roles)
    }

    fn save_default_roles(&self, roles: &[RoleId]) -> StoreResult<()> {
        self.write(&self.root.join(DEFAULT_ROLES_FILE), roles)
    }
}
