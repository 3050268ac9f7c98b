//! Session token cache.
//!
//! Session tokens live only in memory. Each one is bound to the nick that
//! earned it and to a "valid-for" context (typically the caller's network
//! address) that must match on every later check.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyward_core::{Clock, Nick, has_expired};

/// Token handed to a caller after a successful sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub valid_until: DateTime<Utc>,
}

impl core::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct SessionEntry {
    valid_until: DateTime<Utc>,
    valid_for: String,
    nick: Nick,
}

/// Thread-safe map from session token to its binding.
///
/// Expiry is lazy: entries are checked on access and swept on insert or by an
/// explicit [`SessionTokenCache::sweep_expired`] pass.
pub struct SessionTokenCache {
    entries: RwLock<HashMap<String, SessionEntry>>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for SessionTokenCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionTokenCache")
            .field("len", &self.len())
            .finish()
    }
}

impl SessionTokenCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Insert a live token. Expired entries are dropped in the same pass.
    ///
    /// Returns `false` (and changes nothing) if `token` is already held by a
    /// live entry, so one token never maps to two sessions.
    pub fn add(&self, token: &str, valid_until: DateTime<Utc>, valid_for: &str, nick: &Nick) -> bool {
        let now = self.clock.now();
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => {
                tracing::error!("session token cache lock poisoned; token not stored");
                return false;
            }
        };

        let before = entries.len();
        entries.retain(|_, e| !has_expired(e.valid_until, now));
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, "expired session tokens removed");
        }

        if entries.contains_key(token) {
            return false;
        }
        entries.insert(
            token.to_string(),
            SessionEntry {
                valid_until,
                valid_for: valid_for.to_string(),
                nick: nick.clone(),
            },
        );
        true
    }

    /// True iff `token` is known, unexpired and was issued for `valid_for`.
    pub fn is_valid(&self, token: &str, valid_for: &str) -> bool {
        self.nick_for(token, valid_for).is_some()
    }

    /// Nick behind `token`, without any expiry or binding check.
    pub fn get_nick(&self, token: &str) -> Option<Nick> {
        let entries = self.entries.read().ok()?;
        entries.get(token).map(|e| e.nick.clone())
    }

    /// Nick behind `token` if it has not expired.
    pub fn live_nick(&self, token: &str) -> Option<Nick> {
        self.lookup(token, None)
    }

    /// Nick behind `token` if it has not expired and is bound to `valid_for`.
    pub fn nick_for(&self, token: &str, valid_for: &str) -> Option<Nick> {
        self.lookup(token, Some(valid_for))
    }

    fn lookup(&self, token: &str, valid_for: Option<&str>) -> Option<Nick> {
        if token.is_empty() {
            return None;
        }
        let now = self.clock.now();
        let entries = self.entries.read().ok()?;
        let entry = entries.get(token)?;
        if has_expired(entry.valid_until, now) {
            return None;
        }
        match valid_for {
            Some(context) if entry.valid_for != context => None,
            _ => Some(entry.nick.clone()),
        }
    }

    /// Forget a token before it expires (sign-out). Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        match self.entries.write() {
            Ok(mut entries) => entries.remove(token).is_some(),
            Err(_) => false,
        }
    }

    /// Drop every expired entry and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, e| !has_expired(e.valid_until, now));
        before - entries.len()
    }

    /// Number of stored entries, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
