//! Flotilla dependency grapher: orders a desired set into apply phases and
//! mirrors that order for prune.
//!
//! Edges come from three sources: explicit depends-on annotations, namespace
//! containment (a namespaced object waits for its Namespace manifest when one
//! is in the set), and CRD precedence (a custom resource waits for the
//! CustomResourceDefinition that defines it). Within a phase there is no
//! ordering constraint; phases are safe to apply in parallel internally.

#![forbid(unsafe_code)]

use flotilla_core::{EngineError, ResourceId, ResourceManifest};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

/// Order a desired set into apply phases. Every dependency edge crosses from
/// an earlier phase into a strictly later one; the concatenation of all
/// phases is a permutation of the input. Fails with `EngineError::Cycle`
/// when the relation is not a DAG.
pub fn plan(manifests: Vec<ResourceManifest>) -> Result<Vec<Vec<ResourceManifest>>, EngineError> {
    let n = manifests.len();
    let mut index: FxHashMap<ResourceId, usize> = FxHashMap::default();
    for (i, m) in manifests.iter().enumerate() {
        if index.insert(m.id.clone(), i).is_some() {
            return Err(EngineError::InvalidManifest(format!("duplicate resource in desired set: {}", m.id)));
        }
    }

    // deps[i] = indices i must wait for
    let mut deps: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); n];

    // CRD manifests in the set, keyed by the (group, kind) they define.
    let mut crd_defs: FxHashMap<(String, String), usize> = FxHashMap::default();
    for (i, m) in manifests.iter().enumerate() {
        if m.id.kind == "CustomResourceDefinition" && m.id.group == "apiextensions.k8s.io" {
            let spec = m.raw.get("spec");
            let group = spec.and_then(|s| s.get("group")).and_then(|v| v.as_str());
            let kind = spec
                .and_then(|s| s.get("names"))
                .and_then(|s| s.get("kind"))
                .and_then(|v| v.as_str());
            if let (Some(g), Some(k)) = (group, kind) {
                crd_defs.insert((g.to_string(), k.to_string()), i);
            }
        }
    }

    for (i, m) in manifests.iter().enumerate() {
        for want in &m.depends_on {
            match index.get(want) {
                Some(&j) if j != i => {
                    deps[i].insert(j);
                }
                Some(_) => {}
                None => {
                    warn!(id = %m.id, wants = %want, "depends-on reference not in desired set; ignoring");
                }
            }
        }
        if let Some(ns) = &m.id.namespace {
            let ns_id = ResourceId::cluster_scoped("", "Namespace", ns);
            if let Some(&j) = index.get(&ns_id) {
                deps[i].insert(j);
            }
        }
        if let Some(&j) = crd_defs.get(&(m.id.group.clone(), m.id.kind.clone())) {
            if j != i {
                deps[i].insert(j);
            }
        }
    }

    // Kahn layering: phase(i) = 1 + max(phase(dep)).
    let mut indegree: Vec<usize> = deps.iter().map(|d| d.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, d) in deps.iter().enumerate() {
        for &j in d {
            dependents[j].push(i);
        }
    }

    let mut level = vec![0usize; n];
    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut placed = 0usize;
    while let Some(i) = ready.pop() {
        placed += 1;
        for &k in &dependents[i] {
            level[k] = level[k].max(level[i] + 1);
            indegree[k] -= 1;
            if indegree[k] == 0 {
                ready.push(k);
            }
        }
    }

    if placed != n {
        // Leftover nodes are cycle members plus everything blocked behind
        // them; peel off the blocked tail so only true members are reported.
        let mut leftover: FxHashSet<usize> = (0..n).filter(|&i| indegree[i] > 0).collect();
        loop {
            let tail: Vec<usize> = leftover
                .iter()
                .copied()
                .filter(|&i| !dependents[i].iter().any(|d| leftover.contains(d)))
                .collect();
            if tail.is_empty() {
                break;
            }
            for i in tail {
                leftover.remove(&i);
            }
        }
        let mut members: Vec<ResourceId> = leftover.into_iter().map(|i| manifests[i].id.clone()).collect();
        members.sort();
        return Err(EngineError::Cycle { members });
    }

    let phase_count = level.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    let mut phases: Vec<Vec<ResourceManifest>> = (0..phase_count).map(|_| Vec::new()).collect();
    for (m, lvl) in manifests.into_iter().zip(level.into_iter()) {
        phases[lvl].push(m);
    }
    // Deterministic order within a phase (unconstrained semantically).
    for phase in &mut phases {
        phase.sort_by(|a, b| a.id.category().apply_rank().cmp(&b.id.category().apply_rank()).then(a.id.cmp(&b.id)));
    }
    Ok(phases)
}

/// Group ids to delete into phases mirroring apply precedence in reverse:
/// namespaced objects first, their namespaces after, CRDs last.
pub fn prune_order(mut ids: Vec<ResourceId>) -> Vec<Vec<ResourceId>> {
    ids.sort();
    let mut phases: Vec<Vec<ResourceId>> = vec![Vec::new(); 4];
    for id in ids {
        phases[id.category().prune_rank() as usize].push(id);
    }
    phases.into_iter().filter(|p| !p.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::DEPENDS_ON_ANNOTATION;

    fn manifest(json: serde_json::Value) -> ResourceManifest {
        ResourceManifest::from_json(json).expect("manifest")
    }

    fn namespace(name: &str) -> ResourceManifest {
        manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "Namespace",
            "metadata": { "name": name }
        }))
    }

    fn configmap(ns: &str, name: &str) -> ResourceManifest {
        manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": { "name": name, "namespace": ns }
        }))
    }

    fn crd(name: &str, group: &str, kind: &str) -> ResourceManifest {
        manifest(serde_json::json!({
            "apiVersion": "apiextensions.k8s.io/v1", "kind": "CustomResourceDefinition",
            "metadata": { "name": name },
            "spec": { "group": group, "names": { "kind": kind, "plural": format!("{}s", kind.to_lowercase()) } }
        }))
    }

    fn ids(phases: &[Vec<ResourceManifest>]) -> Vec<Vec<ResourceId>> {
        phases.iter().map(|p| p.iter().map(|m| m.id.clone()).collect()).collect()
    }

    #[test]
    fn independent_objects_share_one_phase() {
        let phases = plan(vec![configmap("a", "one"), configmap("b", "two")]).expect("plan");
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].len(), 2);
    }

    #[test]
    fn namespace_precedes_its_objects() {
        let phases = plan(vec![configmap("prod", "cm"), namespace("prod"), configmap("other", "loose")]).expect("plan");
        let got = ids(&phases);
        assert_eq!(got.len(), 2);
        // phase 0: the namespace plus the configmap whose namespace is absent from the set
        assert!(got[0].contains(&ResourceId::cluster_scoped("", "Namespace", "prod")));
        assert!(got[0].contains(&ResourceId::namespaced("", "ConfigMap", "other", "loose")));
        assert_eq!(got[1], vec![ResourceId::namespaced("", "ConfigMap", "prod", "cm")]);
    }

    #[test]
    fn crd_precedes_its_instances() {
        let instance = manifest(serde_json::json!({
            "apiVersion": "example.com/v1", "kind": "Widget",
            "metadata": { "name": "w", "namespace": "prod" }
        }));
        let phases = plan(vec![instance, crd("widgets.example.com", "example.com", "Widget")]).expect("plan");
        let got = ids(&phases);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0][0].kind, "CustomResourceDefinition");
        assert_eq!(got[1][0].kind, "Widget");
    }

    #[test]
    fn explicit_depends_on_orders_phases() {
        let first = configmap("ns", "first");
        let second = manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {
                "name": "second", "namespace": "ns",
                "annotations": { DEPENDS_ON_ANNOTATION: "/namespaces/ns/ConfigMap/first" }
            }
        }));
        let phases = plan(vec![second, first]).expect("plan");
        let got = ids(&phases);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0][0].name, "first");
        assert_eq!(got[1][0].name, "second");
    }

    #[test]
    fn phases_are_a_permutation_and_edges_point_forward() {
        let set = vec![
            namespace("prod"),
            configmap("prod", "a"),
            configmap("prod", "b"),
            crd("widgets.example.com", "example.com", "Widget"),
            manifest(serde_json::json!({
                "apiVersion": "example.com/v1", "kind": "Widget",
                "metadata": { "name": "w", "namespace": "prod" }
            })),
        ];
        let want: std::collections::BTreeSet<ResourceId> = set.iter().map(|m| m.id.clone()).collect();
        let phases = plan(set).expect("plan");
        let mut got = std::collections::BTreeSet::new();
        let mut phase_of = std::collections::HashMap::new();
        for (i, phase) in phases.iter().enumerate() {
            for m in phase {
                got.insert(m.id.clone());
                phase_of.insert(m.id.clone(), i);
            }
        }
        assert_eq!(want, got);
        // edges forward: Widget after both its CRD and its namespace
        let widget = ResourceId::namespaced("example.com", "Widget", "prod", "w");
        assert!(phase_of[&widget] > phase_of[&ResourceId::cluster_scoped("", "Namespace", "prod")]);
        assert!(
            phase_of[&widget]
                > phase_of[&ResourceId::cluster_scoped("apiextensions.k8s.io", "CustomResourceDefinition", "widgets.example.com")]
        );
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let a = manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {
                "name": "a", "namespace": "ns",
                "annotations": { DEPENDS_ON_ANNOTATION: "/namespaces/ns/ConfigMap/b" }
            }
        }));
        let b = manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {
                "name": "b", "namespace": "ns",
                "annotations": { DEPENDS_ON_ANNOTATION: "/namespaces/ns/ConfigMap/a" }
            }
        }));
        match plan(vec![a, b]) {
            Err(EngineError::Cycle { members }) => {
                assert_eq!(members.len(), 2);
                assert!(members.iter().any(|m| m.name == "a"));
                assert!(members.iter().any(|m| m.name == "b"));
            }
            other => panic!("expected cycle error, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn unknown_depends_on_reference_is_ignored() {
        let m = manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {
                "name": "solo", "namespace": "ns",
                "annotations": { DEPENDS_ON_ANNOTATION: "/namespaces/ns/Secret/absent" }
            }
        }));
        let phases = plan(vec![m]).expect("plan");
        assert_eq!(phases.len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = plan(vec![configmap("ns", "dup"), configmap("ns", "dup")]).unwrap_err();
        assert!(err.to_string().contains("duplicate resource"), "err={}", err);
    }

    #[test]
    fn prune_order_mirrors_apply_precedence() {
        let phases = prune_order(vec![
            ResourceId::cluster_scoped("apiextensions.k8s.io", "CustomResourceDefinition", "widgets.example.com"),
            ResourceId::cluster_scoped("", "Namespace", "prod"),
            ResourceId::namespaced("", "ConfigMap", "prod", "cm"),
            ResourceId::cluster_scoped("rbac.authorization.k8s.io", "ClusterRole", "admin"),
        ]);
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0][0].kind, "ConfigMap");
        assert_eq!(phases[1][0].kind, "ClusterRole");
        assert_eq!(phases[2][0].kind, "Namespace");
        assert_eq!(phases[3][0].kind, "CustomResourceDefinition");
    }
}
