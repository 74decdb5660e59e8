use serde::{Deserialize, Serialize};

use crate::resource::ResourceId;

/// What happened. Apply/prune kinds are per-task; wait kinds are per tracked
/// object state transition; Completed closes the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    ApplyStarted,
    Applied,
    ApplyFailed,
    ApplySkipped,
    PruneStarted,
    Pruned,
    PruneFailed,
    PruneSkipped,
    WaitObserving,
    Reconciled,
    WaitTimedOut,
    WaitFailed,
    Completed,
}

/// One entry in the run's ordered event stream. Ordering reflects engine
/// causality, not wall-clock interleaving of parallel workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub id: Option<ResourceId>,
    pub phase: Option<usize>,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    pub message: String,
    pub error: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, id: Option<ResourceId>, phase: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            phase,
            timestamp: chrono::Utc::now().timestamp_millis(),
            message: message.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Final per-run accounting. Together with the event stream this is the
/// complete record of what succeeded, failed, was pruned, or timed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pruned: usize,
    pub prune_failed: usize,
    pub reconciled: usize,
    pub wait_failed: usize,
    pub timed_out: usize,
}

impl Tally {
    /// True when nothing failed, was skipped, or timed out.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
            && self.skipped == 0
            && self.prune_failed == 0
            && self.wait_failed == 0
            && self.timed_out == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tally() {
        let mut t = Tally { applied: 3, pruned: 1, reconciled: 3, ..Default::default() };
        assert!(t.is_clean());
        t.failed = 1;
        assert!(!t.is_clean());
    }

    #[test]
    fn event_carries_error() {
        let ev = Event::new(EventKind::ApplyFailed, None, Some(0), "apply failed").with_error("boom");
        assert_eq!(ev.error.as_deref(), Some("boom"));
        assert!(ev.timestamp > 0);
    }
}
