use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of one object in a cluster: (group, kind, namespace, name).
/// Immutable once constructed; the unique key in inventories and plans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub group: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceId {
    pub fn cluster_scoped(group: &str, kind: &str, name: &str) -> Self {
        Self { group: group.to_string(), kind: kind.to_string(), namespace: None, name: name.to_string() }
    }

    pub fn namespaced(group: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            group: group.to_string(),
            kind: kind.to_string(),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Ordering category, resolved once and used purely as a precedence key.
    pub fn category(&self) -> KindCategory {
        if self.kind == "CustomResourceDefinition" && self.group == "apiextensions.k8s.io" {
            return KindCategory::CrdDefinition;
        }
        if self.kind == "Namespace" && self.group.is_empty() {
            return KindCategory::Namespace;
        }
        match self.namespace {
            None => KindCategory::ClusterScoped,
            Some(_) => KindCategory::Namespaced,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gk = if self.group.is_empty() {
            self.kind.clone()
        } else {
            format!("{}/{}", self.group, self.kind)
        };
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", gk, ns, self.name),
            None => write!(f, "{} {}", gk, self.name),
        }
    }
}

/// Closed kind classification driving apply precedence. CRDs come before the
/// custom resources they define, namespaces before the objects inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindCategory {
    CrdDefinition,
    Namespace,
    ClusterScoped,
    Namespaced,
}

impl KindCategory {
    /// Rank in apply order; prune mirrors this in reverse.
    pub fn apply_rank(self) -> u8 {
        match self {
            KindCategory::CrdDefinition => 0,
            KindCategory::Namespace => 1,
            KindCategory::ClusterScoped => 2,
            KindCategory::Namespaced => 3,
        }
    }

    pub fn prune_rank(self) -> u8 {
        3 - self.apply_rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_resolution() {
        let crd = ResourceId::cluster_scoped("apiextensions.k8s.io", "CustomResourceDefinition", "widgets.example.com");
        assert_eq!(crd.category(), KindCategory::CrdDefinition);
        let ns = ResourceId::cluster_scoped("", "Namespace", "prod");
        assert_eq!(ns.category(), KindCategory::Namespace);
        let role = ResourceId::cluster_scoped("rbac.authorization.k8s.io", "ClusterRole", "admin");
        assert_eq!(role.category(), KindCategory::ClusterScoped);
        let cm = ResourceId::namespaced("", "ConfigMap", "prod", "settings");
        assert_eq!(cm.category(), KindCategory::Namespaced);
    }

    #[test]
    fn prune_rank_mirrors_apply_rank() {
        for cat in [
            KindCategory::CrdDefinition,
            KindCategory::Namespace,
            KindCategory::ClusterScoped,
            KindCategory::Namespaced,
        ] {
            assert_eq!(cat.apply_rank() + cat.prune_rank(), 3);
        }
    }

    #[test]
    fn display_forms() {
        let cm = ResourceId::namespaced("", "ConfigMap", "prod", "settings");
        assert_eq!(cm.to_string(), "ConfigMap prod/settings");
        let dep = ResourceId::namespaced("apps", "Deployment", "prod", "web");
        assert_eq!(dep.to_string(), "apps/Deployment prod/web");
        let ns = ResourceId::cluster_scoped("", "Namespace", "prod");
        assert_eq!(ns.to_string(), "Namespace prod");
    }
}
