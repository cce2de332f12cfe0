use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Scope a policy grants resources in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RolePolicyScope {
    #[default]
    #[serde(rename = "")]
    Unset,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "S")]
    Subordinate,
    #[serde(rename = "I")]
    Inherit,
    #[serde(rename = "G")]
    Global,
}

impl RolePolicyScope {
    fn as_str(self) -> &'static str {
        match self {
            RolePolicyScope::Unset => "",
            RolePolicyScope::Private => "P",
            RolePolicyScope::Subordinate => "S",
            RolePolicyScope::Inherit => "I",
            RolePolicyScope::Global => "G",
        }
    }

    fn is_unset(&self) -> bool {
        *self == RolePolicyScope::Unset
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePolicy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Only meaningful when `actions` is `["*"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_excludes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Only meaningful when `resources` is `["*"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_excludes: Vec<String>,
    /// Only meaningful for a single concrete resource kind.
    #[serde(default, rename = "objectIDs", skip_serializing_if = "Vec::is_empty")]
    pub object_ids: Vec<String>,
    #[serde(default, rename = "objectIDExcludes", skip_serializing_if = "Vec::is_empty")]
    pub object_id_excludes: Vec<String>,
    #[serde(default, skip_serializing_if = "RolePolicyScope::is_unset")]
    pub scope: RolePolicyScope,
    /// Route paths, only when no resources are given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

fn is_wildcard(l: &[String]) -> bool {
    l.len() == 1 && l[0] == "*"
}

/// Collapses a list containing "*" into `["*"]`, otherwise sorts and dedups it.
fn aggregate(l: Vec<String>) -> Vec<String> {
    if l.len() < 2 {
        return l;
    }
    if l.iter().any(|s| s == "*") {
        return vec!["*".to_string()];
    }
    l.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

impl RolePolicy {
    pub fn resource_admin_for(resources: &[&str]) -> Self {
        RolePolicy {
            actions: vec!["*".into()],
            resources: resources.iter().map(|s| s.to_string()).collect(),
            scope: RolePolicyScope::Global,
            ..Default::default()
        }
    }

    pub fn resource_edit_for(resources: &[&str]) -> Self {
        RolePolicy {
            actions: vec!["*".into()],
            resources: resources.iter().map(|s| s.to_string()).collect(),
            scope: RolePolicyScope::Subordinate,
            ..Default::default()
        }
    }

    pub fn resource_view_for(resources: &[&str]) -> Self {
        RolePolicy {
            actions: vec!["GET".into()],
            resources: resources.iter().map(|s| s.to_string()).collect(),
            scope: RolePolicyScope::Subordinate,
            ..Default::default()
        }
    }

    /// Drops fields that have no effect given the others.
    pub fn normalize(mut self) -> Self {
        self.actions = aggregate(self.actions);
        if !is_wildcard(&self.actions) {
            self.action_excludes.clear();
        }
        self.resources = aggregate(self.resources);
        if !is_wildcard(&self.resources) {
            self.resource_excludes.clear();
        }
        if self.resources.len() != 1 || self.resources[0] == "*" {
            self.object_ids.clear();
        }
        self.object_ids = aggregate(self.object_ids);
        if !is_wildcard(&self.object_ids) {
            self.object_id_excludes.clear();
        }
        if !self.object_ids.is_empty() {
            self.scope = RolePolicyScope::Global;
        }
        if !self.resources.is_empty() {
            self.paths.clear();
        }
        if !self.paths.is_empty() {
            self.scope = RolePolicyScope::Unset;
        }
        self
    }

    /// A policy without actions, or without resources and paths, grants nothing.
    pub fn is_zero(&self) -> bool {
        self.actions.is_empty() || (self.resources.is_empty() && self.paths.is_empty())
    }

    /// Canonical text used for ordering and deduplication.
    pub fn key(&self) -> String {
        fn push(out: &mut String, prefix: &str, items: &[String]) {
            if items.is_empty() {
                return;
            }
            let mut sorted: Vec<&str> = items.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            out.push_str(prefix);
            out.push_str(": ");
            out.push_str(&sorted.join(", "));
            out.push(';');
        }
        let mut out = String::new();
        push(&mut out, "actions", &self.actions);
        push(&mut out, "actionExcludes", &self.action_excludes);
        push(&mut out, "resources", &self.resources);
        push(&mut out, "resourceExcludes", &self.resource_excludes);
        push(&mut out, "objectIDs", &self.object_ids);
        push(&mut out, "objectIDExcludes", &self.object_id_excludes);
        push(&mut out, "scope", &[self.scope.as_str().to_string()]);
        push(&mut out, "paths", &self.paths);
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolePolicies(pub Vec<RolePolicy>);

impl RolePolicies {
    pub fn normalize(self) -> Self {
        RolePolicies(self.0.into_iter().map(RolePolicy::normalize).collect())
    }

    /// Removes zero policies and repeats, keeping first occurrences in order.
    pub fn deduplicate(self) -> Self {
        let mut seen = HashSet::new();
        RolePolicies(
            self.0
                .into_iter()
                .filter(|p| !p.is_zero() && seen.insert(p.key()))
                .collect(),
        )
    }

    pub fn sort(mut self) -> Self {
        self.0.sort_by_cached_key(RolePolicy::key);
        self
    }

    /// Removes every policy equal (by key) to one of `rs`.
    pub fn delete(self, rs: &[RolePolicy]) -> Self {
        let drop: HashSet<String> = rs.iter().map(RolePolicy::key).collect();
        RolePolicies(self.0.into_iter().filter(|p| !drop.contains(&p.key())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_collapses_wildcards_and_drops_ineffective_fields() {
        let p = RolePolicy {
            actions: strings(&["GET", "*", "POST"]),
            action_excludes: strings(&["DELETE"]),
            resources: strings(&["projects", "environments"]),
            resource_excludes: strings(&["roles"]),
            object_ids: strings(&["a"]),
            paths: strings(&["/x"]),
            ..Default::default()
        }
        .normalize();
        assert_eq!(p.actions, strings(&["*"]));
        assert_eq!(p.action_excludes, strings(&["DELETE"]));
        assert_eq!(p.resources, strings(&["environments", "projects"]));
        assert!(p.resource_excludes.is_empty());
        assert!(p.object_ids.is_empty());
        assert!(p.paths.is_empty());
    }

    #[test]
    fn object_ids_force_global_scope() {
        let p = RolePolicy {
            actions: strings(&["GET"]),
            resources: strings(&["projects"]),
            object_ids: strings(&["p1"]),
            scope: RolePolicyScope::Private,
            ..Default::default()
        }
        .normalize();
        assert_eq!(p.scope, RolePolicyScope::Global);
    }

    #[test]
    fn deduplicate_keeps_first_and_drops_zero_policies() {
        let a = RolePolicy::resource_view_for(&["projects"]);
        let mut b = a.clone();
        b.resources = strings(&["projects"]);
        let zero = RolePolicy::default();
        let edit = RolePolicy::resource_edit_for(&["projects"]);
        let out = RolePolicies(vec![a.clone(), zero, b, edit.clone()]).deduplicate();
        assert_eq!(out, RolePolicies(vec![a, edit]));
    }

    #[test]
    fn delete_removes_matching_policies() {
        let view = RolePolicy::resource_view_for(&["projects"]);
        let admin = RolePolicy::resource_admin_for(&["settings"]);
        let out = RolePolicies(vec![view.clone(), admin.clone()]).delete(&[admin]);
        assert_eq!(out, RolePolicies(vec![view]));
    }

    #[test]
    fn scope_serializes_as_letter() {
        let p = RolePolicy::resource_admin_for(&["*"]);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["scope"], "G");
        assert!(v.get("paths").is_none());
    }
}
