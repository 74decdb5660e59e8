use serde::{Deserialize, Serialize};

use crate::resource::ResourceId;

/// Typed outcome classes for the mutation and inventory APIs, suitable for
/// transport. Transient errors are safe to retry; Fatal ones are not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("transient: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

/// Run-level failures of the applier engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The dependency relation is not a DAG. Raised before any mutation.
    #[error("dependency cycle among: {}", members_list(.members))]
    Cycle { members: Vec<ResourceId> },
    /// Lost the optimistic race on the inventory record. Cluster mutations
    /// are already applied; the record is stale and the caller must retry.
    #[error("inventory {inventory} was modified concurrently; record not replaced")]
    InventoryConflict { inventory: String },
    /// Scope-local deadline (apply, prune, or wait) elapsed.
    #[error("{scope} deadline exceeded")]
    DeadlineExceeded { scope: String },
    #[error("run cancelled")]
    Cancelled,
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

fn members_list(members: &[ResourceId]) -> String {
    members.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
}
