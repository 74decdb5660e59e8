use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::EngineError;
use crate::resource::ResourceId;

/// Annotation carrying explicit apply-ordering references. Comma-separated
/// entries of the form `<group>/namespaces/<ns>/<Kind>/<name>` for namespaced
/// targets or `<group>/<Kind>/<name>` for cluster-scoped ones (empty group
/// for the core API).
pub const DEPENDS_ON_ANNOTATION: &str = "config.kubernetes.io/depends-on";

/// Desired state of one resource: identity plus the raw structured payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub id: ResourceId,
    pub raw: Json,
    /// Explicit applies-after references parsed from the depends-on annotation.
    pub depends_on: Vec<ResourceId>,
}

impl ResourceManifest {
    /// Build a manifest from an already-parsed object, extracting identity and
    /// dependency annotations. The payload is kept verbatim.
    pub fn from_json(raw: Json) -> Result<Self, EngineError> {
        let api_version = raw
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::InvalidManifest("missing apiVersion".into()))?;
        let kind = raw
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::InvalidManifest("missing kind".into()))?;
        let group = match api_version.split_once('/') {
            Some((g, _v)) => g.to_string(),
            None => String::new(),
        };
        let meta = raw
            .get("metadata")
            .ok_or_else(|| EngineError::InvalidManifest("missing metadata".into()))?;
        let name = meta
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::InvalidManifest("missing metadata.name".into()))?
            .to_string();
        let namespace = meta
            .get("namespace")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let mut depends_on = Vec::new();
        if let Some(anno) = meta
            .get("annotations")
            .and_then(|a| a.get(DEPENDS_ON_ANNOTATION))
            .and_then(|v| v.as_str())
        {
            for entry in anno.split(',') {
                let entry = entry.trim();
                if entry.is_empty() {
                    continue;
                }
                depends_on.push(parse_depends_on(entry)?);
            }
        }

        Ok(Self {
            id: ResourceId { group, kind: kind.to_string(), namespace, name },
            raw,
            depends_on,
        })
    }

    pub fn api_version(&self) -> &str {
        self.raw.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("v1")
    }
}

fn parse_depends_on(entry: &str) -> Result<ResourceId, EngineError> {
    let parts: Vec<&str> = entry.split('/').collect();
    match parts.as_slice() {
        [group, "namespaces", ns, kind, name] => Ok(ResourceId::namespaced(group, kind, ns, name)),
        [group, kind, name] => Ok(ResourceId::cluster_scoped(group, kind, name)),
        _ => Err(EngineError::InvalidManifest(format!(
            "invalid depends-on entry: {} (expect group/Kind/name or group/namespaces/ns/Kind/name)",
            entry
        ))),
    }
}
