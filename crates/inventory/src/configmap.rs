use std::collections::BTreeMap;

use async_trait::async_trait;
use flotilla_core::{ApiError, ResourceId};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{Api, DeleteParams, ObjectMeta, PostParams},
    Client,
};
use tracing::{debug, warn};

use crate::{Generation, Inventory, InventoryStore};

/// ConfigMap-backed inventory record. One ConfigMap per inventory id in a
/// fixed namespace; one data key per owned ResourceId; the ConfigMap's
/// resourceVersion is the generation, so replace-with-stale-version comes
/// back as a 409 and maps to `ApiError::Conflict`.
pub struct ConfigMapStore {
    client: Client,
    namespace: String,
}

impl ConfigMapStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self { client, namespace: namespace.into() }
    }

    fn api(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn render(&self, inventory_id: &str, inventory: &Inventory, resource_version: Option<String>) -> ConfigMap {
        let data: BTreeMap<String, String> = inventory.iter().map(|id| (encode_key(id), String::new())).collect();
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(inventory_id.to_string()),
                namespace: Some(self.namespace.clone()),
                resource_version,
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }
}

#[async_trait]
impl InventoryStore for ConfigMapStore {
    async fn read(&self, inventory_id: &str) -> Result<(Inventory, Generation), ApiError> {
        let cm = match self.api().get_opt(inventory_id).await.map_err(map_kube_err)? {
            Some(cm) => cm,
            None => return Ok((Inventory::new(), None)),
        };
        let mut inventory = Inventory::new();
        for key in cm.data.unwrap_or_default().keys() {
            match decode_key(key) {
                Some(id) => {
                    inventory.insert(id);
                }
                None => warn!(inventory = inventory_id, key = %key, "unparseable inventory entry; skipping"),
            }
        }
        Ok((inventory, cm.metadata.resource_version))
    }

    async fn write(&self, inventory_id: &str, inventory: &Inventory, expected: Generation) -> Result<Generation, ApiError> {
        let api = self.api();
        let written = match expected {
            None => {
                debug!(inventory = inventory_id, entries = inventory.len(), "creating inventory record");
                let cm = self.render(inventory_id, inventory, None);
                // 409 here means someone else created the record first.
                api.create(&PostParams::default(), &cm).await.map_err(map_kube_err)?
            }
            Some(rv) => {
                debug!(inventory = inventory_id, entries = inventory.len(), rv = %rv, "replacing inventory record");
                let cm = self.render(inventory_id, inventory, Some(rv));
                api.replace(inventory_id, &PostParams::default(), &cm).await.map_err(map_kube_err)?
            }
        };
        Ok(written.metadata.resource_version)
    }

    async fn delete(&self, inventory_id: &str) -> Result<(), ApiError> {
        match self.api().delete(inventory_id, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(map_kube_err(e)),
        }
    }
}

/// Data key for one owned id: `<ns>_<name>_<group>_<Kind>`. Namespace and
/// name are DNS-1123 (never contain `_`), so a single separator is
/// unambiguous; empty namespace/group segments mark cluster scope / core API.
fn encode_key(id: &ResourceId) -> String {
    format!(
        "{}_{}_{}_{}",
        id.namespace.as_deref().unwrap_or(""),
        id.name,
        id.group,
        id.kind
    )
}

fn decode_key(key: &str) -> Option<ResourceId> {
    let parts: Vec<&str> = key.split('_').collect();
    let [ns, name, group, kind] = parts.as_slice() else { return None };
    if name.is_empty() || kind.is_empty() {
        return None;
    }
    Some(ResourceId {
        group: group.to_string(),
        kind: kind.to_string(),
        namespace: if ns.is_empty() { None } else { Some(ns.to_string()) },
        name: name.to_string(),
    })
}

fn map_kube_err(e: kube::Error) -> ApiError {
    match e {
        kube::Error::Api(ae) => match ae.code {
            404 => ApiError::NotFound,
            409 => ApiError::Conflict,
            403 => ApiError::Forbidden(ae.message),
            429 => ApiError::Transient(ae.message),
            c if c >= 500 => ApiError::Transient(ae.message),
            _ => ApiError::Fatal(ae.message),
        },
        other => ApiError::Transient(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_round_trips() {
        let cases = [
            ResourceId::namespaced("", "ConfigMap", "prod", "settings"),
            ResourceId::namespaced("apps", "Deployment", "prod", "web"),
            ResourceId::cluster_scoped("", "Namespace", "prod"),
            ResourceId::cluster_scoped("apiextensions.k8s.io", "CustomResourceDefinition", "widgets.example.com"),
        ];
        for id in cases {
            let key = encode_key(&id);
            assert_eq!(decode_key(&key), Some(id.clone()), "key={}", key);
        }
    }

    #[test]
    fn malformed_keys_decode_to_none() {
        assert_eq!(decode_key("garbage"), None);
        assert_eq!(decode_key("a_b_c"), None);
        assert_eq!(decode_key("ns__group_Kind"), None); // empty name
    }
}
