use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use flotilla_core::ApiError;

use crate::{Generation, Inventory, InventoryStore};

/// In-process store with the same compare-and-swap semantics as the
/// ConfigMap-backed one. Used by tests and offline runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, (Inventory, u64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn read(&self, inventory_id: &str) -> Result<(Inventory, Generation), ApiError> {
        let records = self.records.lock().unwrap();
        match records.get(inventory_id) {
            Some((inv, gen)) => Ok((inv.clone(), Some(gen.to_string()))),
            None => Ok((Inventory::new(), None)),
        }
    }

    async fn write(&self, inventory_id: &str, inventory: &Inventory, expected: Generation) -> Result<Generation, ApiError> {
        let mut records = self.records.lock().unwrap();
        let next = match (records.get(inventory_id), &expected) {
            (None, None) => 1,
            (Some((_, gen)), Some(want)) if gen.to_string() == *want => gen + 1,
            _ => return Err(ApiError::Conflict),
        };
        records.insert(inventory_id.to_string(), (inventory.clone(), next));
        Ok(Some(next.to_string()))
    }

    async fn delete(&self, inventory_id: &str) -> Result<(), ApiError> {
        self.records.lock().unwrap().remove(inventory_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::ResourceId;

    #[tokio::test]
    async fn absent_reads_as_empty() {
        let store = MemoryStore::new();
        let (inv, gen) = store.read("nope").await.expect("read");
        assert!(inv.is_empty());
        assert!(gen.is_none());
    }

    #[tokio::test]
    async fn cas_rejects_stale_generation() {
        let store = MemoryStore::new();
        let inv = Inventory::from_ids([ResourceId::namespaced("", "ConfigMap", "ns", "a")]);
        let gen1 = store.write("inv", &inv, None).await.expect("create");
        assert!(gen1.is_some());

        // create-over-existing and stale-generation writes both conflict
        assert_eq!(store.write("inv", &inv, None).await.unwrap_err(), ApiError::Conflict);
        assert_eq!(
            store.write("inv", &inv, Some("999".into())).await.unwrap_err(),
            ApiError::Conflict
        );

        let gen2 = store.write("inv", &inv, gen1).await.expect("replace");
        let (read, gen) = store.read("inv").await.expect("read");
        assert_eq!(read, inv);
        assert_eq!(gen, gen2);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        let inv = Inventory::new();
        store.write("inv", &inv, None).await.expect("create");
        store.delete("inv").await.expect("delete");
        store.delete("inv").await.expect("delete again");
        let (_, gen) = store.read("inv").await.expect("read");
        assert!(gen.is_none());
    }
}
