//! Strongly-typed identifiers used across the engine.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Unique, human-facing handle of an entity (analogous to a username).
///
/// Nicks are opaque: the engine never parses them, it only compares them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nick(String);

impl Nick {
    pub fn new(nick: impl Into<String>) -> Self {
        Self(nick.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for Nick {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Nick {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Nick {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Nick {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Nick {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid("nick", "must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}
