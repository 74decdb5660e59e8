//! Flotilla cluster boundary: the typed mutation API the engine drives.
//!
//! `ClusterClient` is the seam between the orchestration engine and the
//! remote object store. `KubeCluster` implements it against a live API
//! server via dynamic objects and discovery; `fake::FakeCluster` is the
//! in-memory double the test suites run against.

#![forbid(unsafe_code)]

pub mod fake;

use async_trait::async_trait;
use flotilla_core::{ApiError, ResourceId, ResourceManifest};
use kube::{
    api::{Api, DeleteParams, Patch, PatchParams, PostParams},
    core::DynamicObject,
    discovery::{Discovery, Scope},
    Client,
};
use serde_json::Value as Json;
use tracing::debug;

/// Create/update/get/delete primitives against the remote object store.
/// All calls are idempotent or safely retryable; errors carry the typed
/// classes the engine's retry policy keys on.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn create(&self, manifest: &ResourceManifest) -> Result<(), ApiError>;
    async fn update(&self, manifest: &ResourceManifest) -> Result<(), ApiError>;
    /// Live object (including status), or None when absent.
    async fn get(&self, id: &ResourceId) -> Result<Option<Json>, ApiError>;
    /// Returns false when the object was already absent.
    async fn delete(&self, id: &ResourceId) -> Result<bool, ApiError>;
}

/// kube-rs backed implementation. Resolves (group, kind) to an ApiResource
/// via discovery; updates go through server-side apply under a named field
/// manager.
pub struct KubeCluster {
    client: Client,
    field_manager: String,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client, field_manager: "flotilla".to_string() }
    }

    pub async fn try_default() -> Result<Self, ApiError> {
        let client = Client::try_default().await.map_err(map_kube_err)?;
        Ok(Self::new(client))
    }

    async fn api_for(&self, id: &ResourceId) -> Result<Api<DynamicObject>, ApiError> {
        let (ar, namespaced) = find_api_resource(self.client.clone(), &id.group, &id.kind).await?;
        if namespaced {
            match id.namespace.as_deref() {
                Some(ns) => Ok(Api::namespaced_with(self.client.clone(), ns, &ar)),
                None => Err(ApiError::Fatal(format!("namespace required for namespaced kind {}", id.kind))),
            }
        } else {
            Ok(Api::all_with(self.client.clone(), &ar))
        }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn create(&self, manifest: &ResourceManifest) -> Result<(), ApiError> {
        let api = self.api_for(&manifest.id).await?;
        let obj: DynamicObject = serde_json::from_value(manifest.raw.clone())
            .map_err(|e| ApiError::Fatal(format!("manifest not an object: {}", e)))?;
        debug!(id = %manifest.id, "create");
        api.create(&PostParams::default(), &obj).await.map_err(map_kube_err)?;
        Ok(())
    }

    async fn update(&self, manifest: &ResourceManifest) -> Result<(), ApiError> {
        let api = self.api_for(&manifest.id).await?;
        let pp = PatchParams::apply(&self.field_manager).force();
        debug!(id = %manifest.id, "server-side apply");
        api.patch(&manifest.id.name, &pp, &Patch::Apply(&manifest.raw))
            .await
            .map_err(map_kube_err)?;
        Ok(())
    }

    async fn get(&self, id: &ResourceId) -> Result<Option<Json>, ApiError> {
        let api = self.api_for(id).await?;
        match api.get_opt(&id.name).await.map_err(map_kube_err)? {
            Some(obj) => {
                let raw = serde_json::to_value(&obj).map_err(|e| ApiError::Fatal(e.to_string()))?;
                Ok(Some(raw))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &ResourceId) -> Result<bool, ApiError> {
        let api = self.api_for(id).await?;
        match api.delete(&id.name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(map_kube_err(e)),
        }
    }
}

async fn find_api_resource(client: Client, group: &str, kind: &str) -> Result<(kube::core::ApiResource, bool), ApiError> {
    let discovery = Discovery::new(client).run().await.map_err(map_kube_err)?;
    for g in discovery.groups() {
        for (ar, caps) in g.recommended_resources() {
            if ar.group == group && ar.kind == kind {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                return Ok((ar.clone(), namespaced));
            }
        }
    }
    Err(ApiError::Fatal(format!("kind not served by the cluster: {}/{}", group, kind)))
}

fn map_kube_err(e: kube::Error) -> ApiError {
    match e {
        kube::Error::Api(ae) => map_status(ae.code, ae.message),
        // Transport and protocol failures are worth a retry.
        other => ApiError::Transient(other.to_string()),
    }
}

fn map_status(code: u16, message: String) -> ApiError {
    match code {
        404 => ApiError::NotFound,
        409 => ApiError::Conflict,
        403 => ApiError::Forbidden(message),
        429 => ApiError::Transient(message),
        c if c >= 500 => ApiError::Transient(message),
        _ => ApiError::Fatal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_typed_classes() {
        assert_eq!(map_status(404, String::new()), ApiError::NotFound);
        assert_eq!(map_status(409, String::new()), ApiError::Conflict);
        assert!(matches!(map_status(403, "rbac".into()), ApiError::Forbidden(_)));
        assert!(map_status(429, "throttled".into()).is_transient());
        assert!(map_status(503, "apiserver down".into()).is_transient());
        assert!(matches!(map_status(422, "invalid".into()), ApiError::Fatal(_)));
    }
}
