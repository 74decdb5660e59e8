//! Status waiter: observes applied objects until each reaches a terminal
//! state (Reconciled, Failed via a Stalled condition, or TimedOut at the
//! deadline).
//!
//! Runs concurrently with the apply/prune driver; objects become trackable
//! as the driver reports them applied. Transition events flow back to the
//! driver over an unbounded channel (at most two transitions per tracked
//! id) so the run keeps a single serialized event producer and the waiter
//! never stalls the driver.

use std::sync::Arc;

use flotilla_core::{is_stalled, Event, EventKind, ResourceId, WaitOptions};
use flotilla_cluster::ClusterClient;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct WaiterOutcome {
    pub reconciled: usize,
    pub wait_failed: usize,
    pub timed_out: usize,
}

pub(crate) fn spawn_waiter(
    cluster: Arc<dyn ClusterClient>,
    opts: WaitOptions,
    track_rx: mpsc::Receiver<ResourceId>,
    event_tx: mpsc::UnboundedSender<Event>,
    cancel: watch::Receiver<bool>,
) -> JoinHandle<WaiterOutcome> {
    tokio::spawn(wait_loop(cluster, opts, track_rx, event_tx, cancel))
}

async fn wait_loop(
    cluster: Arc<dyn ClusterClient>,
    opts: WaitOptions,
    mut track_rx: mpsc::Receiver<ResourceId>,
    event_tx: mpsc::UnboundedSender<Event>,
    mut cancel: watch::Receiver<bool>,
) -> WaiterOutcome {
    let deadline = Instant::now() + opts.timeout;
    let mut ticker = tokio::time::interval(opts.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut observing: Vec<ResourceId> = Vec::new();
    let mut track_open = true;
    let mut out = WaiterOutcome::default();

    loop {
        if !track_open && observing.is_empty() {
            break;
        }
        tokio::select! {
            maybe = track_rx.recv(), if track_open => match maybe {
                Some(id) => {
                    debug!(id = %id, "now observing");
                    let _ = event_tx.send(Event::new(EventKind::WaitObserving, Some(id.clone()), None, "observing"));
                    observing.push(id);
                }
                None => track_open = false,
            },
            _ = ticker.tick() => {
                let mut still = Vec::with_capacity(observing.len());
                for id in observing.drain(..) {
                    match cluster.get(&id).await {
                        Ok(Some(live)) if is_stalled(&live) => {
                            out.wait_failed += 1;
                            let _ = event_tx.send(
                                Event::new(EventKind::WaitFailed, Some(id), None, "object stalled")
                                    .with_error("Stalled condition is True"),
                            );
                        }
                        Ok(Some(live)) if opts.condition.is_met(&live) => {
                            out.reconciled += 1;
                            let _ = event_tx.send(Event::new(EventKind::Reconciled, Some(id), None, "condition met"));
                        }
                        Ok(_) => still.push(id),
                        Err(e) => {
                            // Status fetch hiccups are not terminal; keep polling.
                            warn!(id = %id, error = %e, "status fetch failed");
                            still.push(id);
                        }
                    }
                }
                observing = still;
            },
            _ = tokio::time::sleep_until(deadline) => {
                // Ids applied but still queued for tracking are non-terminal
                // too; they time out with everything already under watch.
                while let Ok(id) = track_rx.try_recv() {
                    observing.push(id);
                }
                for id in observing.drain(..) {
                    out.timed_out += 1;
                    let _ = event_tx.send(
                        Event::new(EventKind::WaitTimedOut, Some(id), None, "deadline elapsed")
                            .with_error("wait deadline exceeded"),
                    );
                }
                break;
            },
            _ = super::cancelled(&mut cancel) => break,
        }
    }
    out
}
