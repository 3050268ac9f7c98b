use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Marker that, as the last character of a pattern, extends it to every
/// resource sharing the preceding prefix.
pub const WILDCARD: &str = "*";

/// Resource pattern a grant applies to (e.g. `"billing.invoice"` or `"billing.*"`).
///
/// Only a trailing `*` is special. Matching is plain prefix comparison, with no
/// notion of path segments: `"a.*"` covers `"a.b"` and also `"a."`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePattern(Cow<'static, str>);

impl ResourcePattern {
    pub fn new(pattern: impl Into<Cow<'static, str>>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this (granted) pattern covers the `requested` resource.
    pub fn contains(&self, requested: &str) -> bool {
        contains(self.as_str(), requested)
    }
}

impl core::fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decide whether the `granted` pattern covers the `requested` resource.
///
/// The relation is directional: `contains("a.*", "a.b")` holds while
/// `contains("a.b", "a.*")` does not.
pub fn contains(granted: &str, requested: &str) -> bool {
    if granted == requested {
        return true;
    }
    match granted.strip_suffix(WILDCARD) {
        Some(prefix) => requested.starts_with(prefix),
        None => false,
    }
}

/// Something that can be done to a resource (e.g. `"read"`).
///
/// The reserved action `"*"` stands for any action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn any() -> Self {
        Self(Cow::Borrowed(WILDCARD))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of actions granted on one resource pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(BTreeSet<Action>);

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, action: Action) -> bool {
        self.0.insert(action)
    }

    pub fn extend(&mut self, other: &ActionSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// True if `action` is granted explicitly or through the wildcard action.
    pub fn permits(&self, action: &str) -> bool {
        self.0
            .iter()
            .any(|a| a.as_str() == action || a.is_wildcard())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.0.iter()
    }
}

impl<A: Into<Cow<'static, str>>> FromIterator<A> for ActionSet {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        Self(iter.into_iter().map(|a| Action::new(a)).collect())
    }
}

/// A resource pattern together with the actions granted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub resource: ResourcePattern,
    pub actions: ActionSet,
}

impl Authorization {
    pub fn new<I, A>(resource: impl Into<Cow<'static, str>>, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Cow<'static, str>>,
    {
        Self {
            resource: ResourcePattern::new(resource),
            actions: actions.into_iter().collect(),
        }
    }

    /// Whether this grant allows `action` on `resource`.
    pub fn permits(&self, resource: &str, action: &str) -> bool {
        self.resource.contains(resource) && self.actions.permits(action)
    }
}
