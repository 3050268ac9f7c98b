use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{ActionSet, AuthError, Authorization, ResourcePattern};

/// Deepest containment chain accepted; longer chains are reported as cycles.
pub const MAX_ROLE_DEPTH: usize = 64;

/// Role granting full access to the engine's own administrative resources.
pub const ADMIN_ROLE: &str = "keyward";

/// Role assigned to newly enrolled entities when no defaults are configured.
pub const APPLICATION_ROLE: &str = "application";

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Cow<'static, str>);

impl RoleId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Definition of a role: its own grants plus the roles it contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleBody {
    pub authorizations: Vec<Authorization>,
    pub contained_roles: Vec<RoleId>,
}

impl RoleBody {
    pub fn new(authorizations: Vec<Authorization>) -> Self {
        Self {
            authorizations,
            contained_roles: Vec::new(),
        }
    }

    pub fn containing(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.contained_roles.extend(roles);
        self
    }
}

/// All roles known to the engine, keyed by id.
pub type RoleMap = HashMap<RoleId, RoleBody>;

/// Roles installed when the role store is empty.
pub fn builtin_roles() -> RoleMap {
    HashMap::from([
        (
            RoleId::new(ADMIN_ROLE),
            RoleBody::new(vec![Authorization::new(ADMIN_ROLE, ["*"])]),
        ),
        (
            RoleId::new(APPLICATION_ROLE),
            RoleBody::new(vec![Authorization::new(APPLICATION_ROLE, ["*"])]),
        ),
    ])
}

/// Default roles used when none are stored.
pub fn builtin_default_roles() -> Vec<RoleId> {
    vec![RoleId::new(APPLICATION_ROLE)]
}

/// A role set proven free of dangling references and cycles.
///
/// The only way to obtain a `RoleGraph` is through [`RoleGraph::new`], so
/// resolution never has to guard against malformed graphs at request time.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    roles: RoleMap,
}

impl RoleGraph {
    pub fn new(roles: RoleMap) -> Result<Self, AuthError> {
        validate(&roles)?;
        Ok(Self { roles })
    }

    pub fn builtin() -> Self {
        Self {
            roles: builtin_roles(),
        }
    }

    pub fn roles(&self) -> &RoleMap {
        &self.roles
    }

    pub fn get(&self, id: &RoleId) -> Option<&RoleBody> {
        self.roles.get(id)
    }

    pub fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Fail with `UnknownRole` unless every id is defined.
    pub fn ensure_defined<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a RoleId>,
    ) -> Result<(), AuthError> {
        for id in ids {
            if !self.contains(id) {
                return Err(AuthError::unknown_role(id.clone()));
            }
        }
        Ok(())
    }

    /// Collect the direct and inherited authorizations of `role_ids` and merge
    /// them into one entry per resource pattern.
    ///
    /// Containment depth was bounded by [`validate`], so only the role ids
    /// handed in here can fail to resolve.
    pub fn resolve(&self, role_ids: &[RoleId]) -> Result<Vec<Authorization>, AuthError> {
        let mut collected = Vec::new();
        let mut seen = HashSet::new();
        for id in role_ids {
            self.collect(id, None, &mut seen, &mut collected)?;
        }
        Ok(merge(collected))
    }

    fn collect<'a>(
        &'a self,
        id: &'a RoleId,
        contained_in: Option<&RoleId>,
        seen: &mut HashSet<&'a RoleId>,
        out: &mut Vec<Authorization>,
    ) -> Result<(), AuthError> {
        let body = self.roles.get(id).ok_or_else(|| AuthError::UnknownRole {
            role: id.clone(),
            contained_in: contained_in.cloned(),
        })?;
        // A role reached twice (diamond) contributes nothing new.
        if !seen.insert(id) {
            return Ok(());
        }
        out.extend(body.authorizations.iter().cloned());
        for child in &body.contained_roles {
            self.collect(child, Some(id), seen, out)?;
        }
        Ok(())
    }
}

/// Check referential integrity and acyclicity of a role set.
///
/// Roots are visited in id order so the reported role is deterministic.
pub fn validate(roles: &RoleMap) -> Result<(), AuthError> {
    let mut ids: Vec<&RoleId> = roles.keys().collect();
    ids.sort();

    for id in &ids {
        for child in &roles[*id].contained_roles {
            if !roles.contains_key(child) {
                return Err(AuthError::UnknownRole {
                    role: child.clone(),
                    contained_in: Some((*id).clone()),
                });
            }
        }
    }

    let mut heights: HashMap<&RoleId, usize> = HashMap::new();
    let mut path: Vec<&RoleId> = Vec::new();
    for id in ids {
        visit(id, roles, &mut path, &mut heights)?;
    }
    Ok(())
}

/// Length of the longest containment chain starting at `id`, counting `id`.
///
/// Heights are memoized, and a memoized role still counts its full height
/// against the current path, so the outcome does not depend on visit order.
fn visit<'a>(
    id: &'a RoleId,
    roles: &'a RoleMap,
    path: &mut Vec<&'a RoleId>,
    heights: &mut HashMap<&'a RoleId, usize>,
) -> Result<usize, AuthError> {
    if let Some(&height) = heights.get(id) {
        if path.len() + height > MAX_ROLE_DEPTH {
            return Err(AuthError::RoleCycle(id.clone()));
        }
        return Ok(height);
    }
    if path.contains(&id) || path.len() >= MAX_ROLE_DEPTH {
        return Err(AuthError::RoleCycle(id.clone()));
    }
    let body = roles
        .get(id)
        .ok_or_else(|| AuthError::unknown_role(id.clone()))?;

    path.push(id);
    let mut below = 0;
    for child in &body.contained_roles {
        below = below.max(visit(child, roles, path, heights)?);
    }
    path.pop();

    let height = below + 1;
    heights.insert(id, height);
    Ok(height)
}

/// Combine authorizations sharing a resource pattern into one entry whose
/// action set is the union of the contributions.
pub fn merge(authorizations: impl IntoIterator<Item = Authorization>) -> Vec<Authorization> {
    let mut merged: BTreeMap<ResourcePattern, ActionSet> = BTreeMap::new();
    for auth in authorizations {
        merged.entry(auth.resource).or_default().extend(&auth.actions);
    }
    merged
        .into_iter()
        .map(|(resource, actions)| Authorization { resource, actions })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn role(id: &'static str, grants: Vec<Authorization>, contains: &[&'static str]) -> (RoleId, RoleBody) {
        (
            RoleId::new(id),
            RoleBody::new(grants).containing(contains.iter().map(|c| RoleId::new(*c))),
        )
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let roles = RoleMap::from([role("a", vec![], &["a"])]);
        assert_eq!(
            RoleGraph::new(roles).unwrap_err(),
            AuthError::RoleCycle(RoleId::new("a"))
        );
    }

    #[test]
    fn two_role_loop_is_a_cycle() {
        let roles = RoleMap::from([role("a", vec![], &["b"]), role("b", vec![], &["a"])]);
        assert!(matches!(RoleGraph::new(roles), Err(AuthError::RoleCycle(_))));
    }

    #[test]
    fn chain_without_repeats_is_accepted() {
        let roles = RoleMap::from([
            role("a", vec![], &["b"]),
            role("b", vec![], &["c"]),
            role("c", vec![], &[]),
        ]);
        assert!(RoleGraph::new(roles).is_ok());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let roles = RoleMap::from([
            role("a", vec![], &["b", "c"]),
            role("b", vec![], &["d"]),
            role("c", vec![], &["d"]),
            role("d", vec![Authorization::new("r", ["read"])], &[]),
        ]);
        let graph = RoleGraph::new(roles).unwrap();

        let resolved = graph.resolve(&[RoleId::new("a")]).unwrap();
        assert_eq!(resolved, vec![Authorization::new("r", ["read"])]);
    }

    #[test]
    fn dangling_contained_role_is_rejected_at_load() {
        let roles = RoleMap::from([role("admin", vec![], &["ghost"])]);
        assert_eq!(
            RoleGraph::new(roles).unwrap_err(),
            AuthError::UnknownRole {
                role: RoleId::new("ghost"),
                contained_in: Some(RoleId::new("admin")),
            }
        );
    }

    #[test]
    fn overly_deep_chain_is_rejected() {
        let mut roles = RoleMap::new();
        let last = MAX_ROLE_DEPTH + 1;
        for i in 0..last {
            roles.insert(
                RoleId::new(format!("r{i:03}")),
                RoleBody::default().containing([RoleId::new(format!("r{:03}", i + 1))]),
            );
        }
        roles.insert(RoleId::new(format!("r{last:03}")), RoleBody::default());
        assert!(matches!(RoleGraph::new(roles), Err(AuthError::RoleCycle(_))));
    }

    /// `len` roles where `name(i)` contains `name(i + 1)`.
    fn chain(len: usize, name: impl Fn(usize) -> String) -> RoleMap {
        (0..len)
            .map(|i| {
                let mut body = RoleBody::default();
                if i + 1 < len {
                    body = body.containing([RoleId::new(name(i + 1))]);
                }
                (RoleId::new(name(i)), body)
            })
            .collect()
    }

    #[test]
    fn chain_depth_limit_ignores_name_order() {
        // Root sorts first, then last: leaves are validated before the root.
        let root_first = |i: usize| format!("r{i:03}");
        let root_last = |i: usize| format!("r{:03}", 200 - i);

        for name in [&root_first as &dyn Fn(usize) -> String, &root_last] {
            let at_limit = RoleGraph::new(chain(MAX_ROLE_DEPTH, name)).unwrap();
            assert!(at_limit.resolve(&[RoleId::new(name(0))]).is_ok());

            assert!(matches!(
                RoleGraph::new(chain(MAX_ROLE_DEPTH + 1, name)),
                Err(AuthError::RoleCycle(_))
            ));
            assert!(matches!(
                RoleGraph::new(chain(101, name)),
                Err(AuthError::RoleCycle(_))
            ));
        }
    }

    #[test]
    fn shared_role_reached_by_short_path_first_still_counts_its_height() {
        // "a" contains "d" directly and through a long "x" chain; "d" sorts
        // before "x01" so it is first validated on the short path.
        fn graph(long: usize) -> RoleMap {
            let mut roles = chain(long, |i| format!("x{:02}", i + 1));
            roles
                .get_mut(&RoleId::new(format!("x{long:02}")))
                .unwrap()
                .contained_roles
                .push(RoleId::new("d"));
            roles.insert(
                RoleId::new("a"),
                RoleBody::default().containing([RoleId::new("d"), RoleId::new("x01")]),
            );
            roles.insert(RoleId::new("d"), RoleBody::default().containing([RoleId::new("e")]));
            roles.insert(
                RoleId::new("e"),
                RoleBody::new(vec![Authorization::new("r", ["read"])]),
            );
            roles
        }

        // a + x01..x61 + d + e = 64 roles on the longest path.
        let graph_ok = RoleGraph::new(graph(MAX_ROLE_DEPTH - 3)).unwrap();
        assert_eq!(
            graph_ok.resolve(&[RoleId::new("a")]).unwrap(),
            vec![Authorization::new("r", ["read"])]
        );

        // One more link makes the long path 65 roles.
        assert!(matches!(
            RoleGraph::new(graph(MAX_ROLE_DEPTH - 2)),
            Err(AuthError::RoleCycle(_))
        ));
    }

    #[test]
    fn resolving_unknown_top_level_role_fails() {
        let graph = RoleGraph::builtin();
        assert_eq!(
            graph.resolve(&[RoleId::new("nope")]).unwrap_err(),
            AuthError::unknown_role(RoleId::new("nope"))
        );
    }

    #[test]
    fn inherited_grants_are_collected() {
        let roles = RoleMap::from([
            role("editor", vec![Authorization::new("doc.*", ["write"])], &["viewer"]),
            role("viewer", vec![Authorization::new("doc.*", ["read"])], &[]),
        ]);
        let graph = RoleGraph::new(roles).unwrap();

        let resolved = graph.resolve(&[RoleId::new("editor")]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].actions.permits("read"));
        assert!(resolved[0].actions.permits("write"));
    }

    #[test]
    fn grants_on_the_same_resource_merge() {
        let roles = RoleMap::from([
            role("role.read", vec![Authorization::new("R", ["read"])], &[]),
            role("role.write", vec![Authorization::new("R", ["write"])], &[]),
        ]);
        let graph = RoleGraph::new(roles).unwrap();

        let resolved = graph
            .resolve(&[RoleId::new("role.read"), RoleId::new("role.write")])
            .unwrap();
        assert_eq!(resolved, vec![Authorization::new("R", ["read", "write"])]);
    }

    #[test]
    fn builtin_roles_are_valid() {
        assert!(validate(&builtin_roles()).is_ok());
        let graph = RoleGraph::builtin();
        assert!(graph.ensure_defined(&builtin_default_roles()).is_ok());
        assert!(graph.ensure_defined(&[RoleId::new("ghost")]).is_err());
    }

    #[test]
    fn role_body_reads_partial_json() {
        let body: RoleBody = serde_json::from_str(
            r#"{"authorizations":[{"resource":"app.*","actions":["use"]}]}"#,
        )
        .unwrap();
        assert!(body.contained_roles.is_empty());
        assert!(body.authorizations[0].permits("app.x", "use"));
    }

    proptest! {
        /// Merging leaves exactly one entry per resource and loses no action.
        #[test]
        fn merge_is_one_entry_per_resource(
            grants in prop::collection::vec(("[a-c]", "[r-w]"), 0..24)
        ) {
            let input: Vec<Authorization> = grants
                .iter()
                .map(|(r, a)| Authorization::new(r.clone(), [a.clone()]))
                .collect();
            let merged = merge(input);

            let distinct: HashSet<&String> = grants.iter().map(|(r, _)| r).collect();
            prop_assert_eq!(merged.len(), distinct.len());
            for (r, a) in &grants {
                let entry = merged.iter().find(|m| m.resource.as_str() == r).unwrap();
                prop_assert!(entry.actions.permits(a));
            }
        }
    }
}
