//! Flotilla core types: resource identity, manifests, events, options, errors.

#![forbid(unsafe_code)]

mod error;
mod event;
mod manifest;
mod options;
mod resource;

pub use error::{ApiError, EngineError};
pub use event::{Event, EventKind, Tally};
pub use manifest::{ResourceManifest, DEPENDS_ON_ANNOTATION};
pub use options::{is_stalled, ApplyOptions, PrunePolicy, WaitCondition, WaitOptions};
pub use resource::{KindCategory, ResourceId};
