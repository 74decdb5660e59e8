use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Per-run knobs for the applier engine.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Upper bound on concurrently in-flight tasks within a phase.
    pub max_parallel: usize,
    /// Abort remaining phases after the first failed phase.
    pub stop_on_error: bool,
    pub prune_policy: PrunePolicy,
    /// Deadline for the whole apply portion (all phases).
    pub apply_timeout: Option<Duration>,
    /// Deadline for the prune pass.
    pub prune_timeout: Option<Duration>,
    /// When set, wait for convergence after apply+prune.
    pub wait: Option<WaitOptions>,
    /// Event channel capacity; falls back to FLOTILLA_QUEUE_CAP, then 256.
    pub event_capacity: Option<usize>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            max_parallel: 8,
            stop_on_error: false,
            prune_policy: PrunePolicy::Delete,
            apply_timeout: None,
            prune_timeout: None,
            wait: None,
            event_capacity: None,
        }
    }
}

/// What to do with objects owned by the previous inventory but absent from
/// the desired set. Orphan keeps the object alive and only drops ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrunePolicy {
    Delete,
    Orphan,
}

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub condition: WaitCondition,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            condition: WaitCondition::Exists,
        }
    }
}

/// Target predicate over an object's live status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitCondition {
    /// Satisfied as soon as the object is observable at all.
    Exists,
    /// Satisfied when `status.conditions` carries the named type with
    /// status "True" (e.g. "Available", "Ready").
    ConditionTrue(String),
}

impl WaitCondition {
    /// Evaluate against a live object. The object is known to exist when
    /// this is called; Exists is therefore trivially satisfied.
    pub fn is_met(&self, live: &Json) -> bool {
        match self {
            WaitCondition::Exists => true,
            WaitCondition::ConditionTrue(wanted) => condition_status(live, wanted)
                .map(|s| s == "True")
                .unwrap_or(false),
        }
    }
}

/// Terminal failure signal: a `Stalled` condition with status "True"
/// (e.g. a rollout that exceeded its progress deadline).
pub fn is_stalled(live: &Json) -> bool {
    condition_status(live, "Stalled").map(|s| s == "True").unwrap_or(false)
}

fn condition_status<'a>(live: &'a Json, wanted: &str) -> Option<&'a str> {
    live.get("status")?
        .get("conditions")?
        .as_array()?
        .iter()
        .find(|c| c.get("type").and_then(|t| t.as_str()) == Some(wanted))?
        .get("status")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_with(cond: &str, status: &str) -> Json {
        serde_json::json!({
            "status": { "conditions": [ { "type": cond, "status": status } ] }
        })
    }

    #[test]
    fn condition_true_requires_matching_type_and_status() {
        let c = WaitCondition::ConditionTrue("Ready".into());
        assert!(c.is_met(&live_with("Ready", "True")));
        assert!(!c.is_met(&live_with("Ready", "False")));
        assert!(!c.is_met(&live_with("Available", "True")));
        assert!(!c.is_met(&serde_json::json!({})));
    }

    #[test]
    fn exists_is_trivially_met() {
        assert!(WaitCondition::Exists.is_met(&serde_json::json!({})));
    }

    #[test]
    fn stalled_detection() {
        assert!(is_stalled(&live_with("Stalled", "True")));
        assert!(!is_stalled(&live_with("Stalled", "False")));
        assert!(!is_stalled(&live_with("Ready", "True")));
    }
}
