//! Flotilla inventory store: the persisted set of resource identities an
//! applier run owns, replaced atomically under optimistic concurrency.

#![forbid(unsafe_code)]

mod configmap;
mod memory;

pub use configmap::ConfigMapStore;
pub use memory::MemoryStore;

use std::collections::BTreeSet;

use async_trait::async_trait;
use flotilla_core::{ApiError, ResourceId};
use serde::{Deserialize, Serialize};

/// Opaque record version for compare-and-swap; None until first create.
pub type Generation = Option<String>;

/// Named set of ResourceIds. Set semantics: an id appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    ids: BTreeSet<ResourceId>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }

    pub fn insert(&mut self, id: ResourceId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceId> {
        self.ids.iter()
    }

    pub fn to_vec(&self) -> Vec<ResourceId> {
        self.ids.iter().cloned().collect()
    }

    /// Ids owned by `self` but absent from `other`; the prune set when
    /// `self` is the old record and `other` the new desired set.
    pub fn difference(&self, other: &Inventory) -> Vec<ResourceId> {
        self.ids.difference(&other.ids).cloned().collect()
    }
}

/// External persistence for inventory records. `write` is the only
/// cluster-shared mutation the engine performs outside the object store and
/// follows update-if-unchanged: a mismatched generation is `ApiError::Conflict`.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Absent records read as an empty inventory with a None generation.
    async fn read(&self, inventory_id: &str) -> Result<(Inventory, Generation), ApiError>;

    /// Replace the record wholesale; succeeds only when the stored
    /// generation still equals `expected`. Returns the new generation.
    async fn write(&self, inventory_id: &str, inventory: &Inventory, expected: Generation) -> Result<Generation, ApiError>;

    /// Remove the record. Absence is not an error.
    async fn delete(&self, inventory_id: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_is_old_minus_new() {
        let old = Inventory::from_ids([
            ResourceId::namespaced("", "ConfigMap", "ns", "a"),
            ResourceId::namespaced("", "ConfigMap", "ns", "b"),
        ]);
        let new = Inventory::from_ids([ResourceId::namespaced("", "ConfigMap", "ns", "b")]);
        assert_eq!(old.difference(&new), vec![ResourceId::namespaced("", "ConfigMap", "ns", "a")]);
        assert!(new.difference(&old).is_empty());
    }

    #[test]
    fn set_semantics_deduplicate() {
        let mut inv = Inventory::new();
        let id = ResourceId::namespaced("", "ConfigMap", "ns", "a");
        assert!(inv.insert(id.clone()));
        assert!(!inv.insert(id));
        assert_eq!(inv.len(), 1);
    }
}
