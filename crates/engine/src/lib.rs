//! Flotilla applier engine: drives a desired resource set against live
//! cluster state in dependency-ordered phases, prunes what the previous
//! inventory owned but the new set no longer declares, and optionally waits
//! for convergence.
//!
//! One run = one `RunHandle` (event stream + final tally + cancel). Tasks
//! inside a phase run in parallel under a bounded worker pool; phases are
//! separated by a barrier. The driver task is the only event producer, so
//! stream order reflects engine causality.

#![forbid(unsafe_code)]

mod events;
mod wait;

use std::sync::Arc;
use std::time::Duration;

use flotilla_cluster::ClusterClient;
use flotilla_core::{
    ApiError, ApplyOptions, EngineError, Event, EventKind, PrunePolicy, ResourceId, ResourceManifest, Tally,
};
use flotilla_inventory::{Inventory, InventoryStore};
use metrics::{counter, histogram};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use events::EventSender;
use wait::spawn_waiter;

fn queue_cap() -> usize {
    std::env::var("FLOTILLA_QUEUE_CAP").ok().and_then(|s| s.parse().ok()).unwrap_or(256)
}

fn event_grace() -> Duration {
    let ms = std::env::var("FLOTILLA_EVENT_GRACE_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(5_000u64);
    Duration::from_millis(ms)
}

fn retry_attempts() -> usize {
    std::env::var("FLOTILLA_RETRY_ATTEMPTS").ok().and_then(|s| s.parse().ok()).unwrap_or(3)
}

fn retry_base() -> Duration {
    let ms = std::env::var("FLOTILLA_RETRY_BASE_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(200u64);
    Duration::from_millis(ms)
}

/// Detached cancel trigger for a run; cheap to clone into signal handlers
/// or timeout tasks.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Handle for one run: drain `events()` until closure, then `wait()` for the
/// final tally. `cancel()` propagates cooperatively to every in-flight task.
pub struct RunHandle {
    events: mpsc::Receiver<Event>,
    outcome: tokio::task::JoinHandle<Result<Tally, EngineError>>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl RunHandle {
    pub fn events(&mut self) -> &mut mpsc::Receiver<Event> {
        &mut self.events
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn canceller(&self) -> CancelHandle {
        CancelHandle { tx: self.cancel_tx.clone() }
    }

    pub async fn wait(self) -> Result<Tally, EngineError> {
        match self.outcome.await {
            Ok(res) => res,
            Err(e) => Err(EngineError::Api(ApiError::Fatal(format!("engine task failed: {}", e)))),
        }
    }
}

/// The apply/prune orchestrator. Holds no cross-run state: every run gets
/// its own task set, event stream, and cancellation signal.
pub struct Applier {
    cluster: Arc<dyn ClusterClient>,
    store: Arc<dyn InventoryStore>,
}

impl Applier {
    pub fn new(cluster: Arc<dyn ClusterClient>, store: Arc<dyn InventoryStore>) -> Self {
        Self { cluster, store }
    }

    /// Apply `manifests` under the named inventory: create-or-update in
    /// dependency order, prune `old − new`, replace the record, optionally
    /// wait for convergence.
    pub fn run(&self, inventory_id: &str, manifests: Vec<ResourceManifest>, options: ApplyOptions) -> RunHandle {
        let cap = options.event_capacity.unwrap_or_else(queue_cap);
        let (events, rx) = EventSender::channel(cap, event_grace());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let fut = run_apply(
            self.cluster.clone(),
            self.store.clone(),
            inventory_id.to_string(),
            manifests,
            options,
            events,
            cancel_rx,
        );
        RunHandle { events: rx, outcome: tokio::spawn(fut), cancel_tx: Arc::new(cancel_tx) }
    }

    /// Delete everything the named inventory owns, then the record itself.
    pub fn destroy(&self, inventory_id: &str, options: ApplyOptions) -> RunHandle {
        let cap = options.event_capacity.unwrap_or_else(queue_cap);
        let (events, rx) = EventSender::channel(cap, event_grace());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let fut = run_destroy(
            self.cluster.clone(),
            self.store.clone(),
            inventory_id.to_string(),
            options,
            events,
            cancel_rx,
        );
        RunHandle { events: rx, outcome: tokio::spawn(fut), cancel_tx: Arc::new(cancel_tx) }
    }
}

enum TaskError {
    Cancelled,
    Deadline,
    Api(ApiError),
}

/// Resolves when the cancellation flag is, or becomes, true. Keeps no
/// watch guard across a suspension point; the futures spawned onto the
/// worker pool stay `Send`.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    // Sender gone means nobody can cancel any more.
    if rx.wait_for(|v| *v).await.is_err() {
        futures::future::pending::<()>().await;
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => futures::future::pending().await,
    }
}

async fn with_retry<T, F, Fut>(
    mut cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    mut op: F,
) -> Result<T, TaskError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    let attempts = retry_attempts().max(1);
    let base = retry_base();
    let mut attempt = 0usize;
    loop {
        if *cancel.borrow() {
            return Err(TaskError::Cancelled);
        }
        let work = op();
        tokio::pin!(work);
        let res = tokio::select! {
            r = &mut work => r,
            _ = cancelled(&mut cancel) => return Err(TaskError::Cancelled),
            _ = until(deadline) => return Err(TaskError::Deadline),
        };
        match res {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                attempt += 1;
                // Exponent capped so absurd attempt counts cannot overflow.
                let backoff = base * (1u32 << (attempt - 1).min(16));
                debug!(attempt, backoff_ms = backoff.as_millis() as u64, error = %e, "transient error; backing off");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancelled(&mut cancel) => return Err(TaskError::Cancelled),
                    _ = until(deadline) => return Err(TaskError::Deadline),
                }
            }
            Err(e) => return Err(TaskError::Api(e)),
        }
    }
}

async fn create_or_update(cluster: &dyn ClusterClient, manifest: &ResourceManifest) -> Result<(), ApiError> {
    match cluster.create(manifest).await {
        Ok(()) => Ok(()),
        // Already exists: converge it with an update instead.
        Err(ApiError::Conflict) => cluster.update(manifest).await,
        Err(e) => Err(e),
    }
}

async fn apply_one(
    cluster: &dyn ClusterClient,
    manifest: &ResourceManifest,
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
) -> Result<(), TaskError> {
    with_retry(cancel, deadline, || create_or_update(cluster, manifest)).await
}

async fn delete_one(
    cluster: &dyn ClusterClient,
    id: &ResourceId,
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
) -> Result<bool, TaskError> {
    match with_retry(cancel, deadline, || cluster.delete(id)).await {
        Ok(existed) => Ok(existed),
        // Already gone counts as pruned.
        Err(TaskError::Api(ApiError::NotFound)) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn run_apply(
    cluster: Arc<dyn ClusterClient>,
    store: Arc<dyn InventoryStore>,
    inventory_id: String,
    manifests: Vec<ResourceManifest>,
    options: ApplyOptions,
    mut events: EventSender,
    cancel: watch::Receiver<bool>,
) -> Result<Tally, EngineError> {
    let t0 = std::time::Instant::now();
    let (old_inventory, generation) = match store.read(&inventory_id).await {
        Ok(v) => v,
        Err(e) => return Err(abort_run(&mut events, EngineError::Api(e)).await),
    };
    // Fails before any mutation when the relation is not a DAG.
    let phases = match flotilla_graph::plan(manifests) {
        Ok(p) => p,
        Err(e) => return Err(abort_run(&mut events, e).await),
    };
    let desired = Inventory::from_ids(phases.iter().flatten().map(|m| m.id.clone()));
    let total: usize = phases.iter().map(|p| p.len()).sum();
    info!(inventory = %inventory_id, resources = total, phases = phases.len(), "apply run starting");

    let mut waiter = None;
    let mut track_tx = None;
    let mut wait_ev_rx = None;
    if let Some(wait_opts) = options.wait.clone() {
        let (ttx, trx) = mpsc::channel::<ResourceId>(queue_cap());
        // Unbounded: the waiter must never block on the driver, and its
        // volume is capped at two transitions per tracked id.
        let (wtx, wrx) = mpsc::unbounded_channel::<Event>();
        waiter = Some(spawn_waiter(cluster.clone(), wait_opts, trx, wtx, cancel.clone()));
        track_tx = Some(ttx);
        wait_ev_rx = Some(wrx);
    }

    let mut tally = Tally::default();
    let deadline = options.apply_timeout.map(|d| Instant::now() + d);
    let mut aborted = false;
    let mut deadline_hit = false;

    for (phase_idx, phase) in phases.into_iter().enumerate() {
        if aborted {
            for m in phase {
                tally.skipped += 1;
                events
                    .emit(Event::new(EventKind::ApplySkipped, Some(m.id), Some(phase_idx), "phase not started"))
                    .await;
            }
            continue;
        }

        let p0 = std::time::Instant::now();
        let semaphore = Arc::new(Semaphore::new(options.max_parallel.max(1)));
        let mut join: JoinSet<(ResourceManifest, Result<(), TaskError>)> = JoinSet::new();
        let mut phase_failed = false;

        for m in phase {
            if *cancel.borrow() {
                aborted = true;
                tally.skipped += 1;
                events
                    .emit(
                        Event::new(EventKind::ApplySkipped, Some(m.id), Some(phase_idx), "not dispatched")
                            .with_error(EngineError::Cancelled.to_string()),
                    )
                    .await;
                continue;
            }
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                aborted = true;
                deadline_hit = true;
                tally.skipped += 1;
                events
                    .emit(
                        Event::new(EventKind::ApplySkipped, Some(m.id), Some(phase_idx), "not dispatched")
                            .with_error(EngineError::DeadlineExceeded { scope: "apply".into() }.to_string()),
                    )
                    .await;
                continue;
            }
            events
                .emit(Event::new(EventKind::ApplyStarted, Some(m.id.clone()), Some(phase_idx), "applying"))
                .await;
            let cluster = cluster.clone();
            let sem = semaphore.clone();
            let cancel_rx = cancel.clone();
            join.spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return (m, Err(TaskError::Cancelled)),
                };
                let res = apply_one(cluster.as_ref(), &m, cancel_rx, deadline).await;
                (m, res)
            });
        }

        // Phase barrier: the next phase starts only after every task here
        // has reported.
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((m, Ok(()))) => {
                    tally.applied += 1;
                    counter!("apply_ok_total", 1u64);
                    events
                        .emit(Event::new(EventKind::Applied, Some(m.id.clone()), Some(phase_idx), "applied"))
                        .await;
                    if let Some(tx) = &track_tx {
                        let _ = tx.send(m.id).await;
                    }
                }
                Ok((m, Err(TaskError::Cancelled))) => {
                    aborted = true;
                    tally.skipped += 1;
                    events
                        .emit(
                            Event::new(EventKind::ApplySkipped, Some(m.id), Some(phase_idx), "cancelled in flight")
                                .with_error(EngineError::Cancelled.to_string()),
                        )
                        .await;
                }
                Ok((m, Err(TaskError::Deadline))) => {
                    aborted = true;
                    deadline_hit = true;
                    tally.skipped += 1;
                    events
                        .emit(
                            Event::new(EventKind::ApplySkipped, Some(m.id), Some(phase_idx), "deadline in flight")
                                .with_error(EngineError::DeadlineExceeded { scope: "apply".into() }.to_string()),
                        )
                        .await;
                }
                Ok((m, Err(TaskError::Api(e)))) => {
                    phase_failed = true;
                    tally.failed += 1;
                    counter!("apply_err_total", 1u64);
                    events
                        .emit(
                            Event::new(EventKind::ApplyFailed, Some(m.id), Some(phase_idx), "apply failed")
                                .with_error(e.to_string()),
                        )
                        .await;
                }
                Err(join_err) => {
                    phase_failed = true;
                    tally.failed += 1;
                    counter!("apply_err_total", 1u64);
                    events
                        .emit(
                            Event::new(EventKind::ApplyFailed, None, Some(phase_idx), "apply task aborted")
                                .with_error(join_err.to_string()),
                        )
                        .await;
                }
            }
        }
        histogram!("phase_latency_ms", p0.elapsed().as_secs_f64() * 1000.0);

        if *cancel.borrow() {
            aborted = true;
        }
        if phase_failed && options.stop_on_error {
            warn!(phase = phase_idx, "stop-on-error set; remaining phases will not start");
            aborted = true;
        }
    }

    // Prune set and inventory replace only make sense when every phase was
    // attempted; an aborted run leaves the stored record untouched.
    let mut replace_err: Option<EngineError> = None;
    if !aborted {
        let prune_ids = old_inventory.difference(&desired);
        let report = prune_all(
            &cluster,
            prune_ids,
            options.prune_policy,
            options.prune_timeout,
            options.max_parallel,
            &mut events,
            &mut tally,
            &cancel,
        )
        .await;
        // A cancelled prune skips the replace; the Completed path keys off
        // the cancel flag itself.
        if !report.cancelled {
            // Keep owning what we failed to delete so a later run retries it.
            let mut record = desired.clone();
            for id in report.failed {
                record.insert(id);
            }
            match store.write(&inventory_id, &record, generation).await {
                Ok(_) => {}
                Err(ApiError::Conflict) => {
                    replace_err = Some(EngineError::InventoryConflict { inventory: inventory_id.clone() })
                }
                Err(e) => replace_err = Some(EngineError::Api(e)),
            }
        }
    }

    // Let the waiter finish and forward its transition events.
    drop(track_tx);
    if let (Some(handle), Some(mut wrx)) = (waiter, wait_ev_rx) {
        while let Some(ev) = wrx.recv().await {
            events.emit(ev).await;
        }
        match handle.await {
            Ok(out) => {
                tally.reconciled += out.reconciled;
                tally.wait_failed += out.wait_failed;
                tally.timed_out += out.timed_out;
            }
            Err(e) => warn!(error = %e, "waiter task failed"),
        }
    }

    let cancelled_run = *cancel.borrow();
    let summary = format!(
        "applied {} failed {} skipped {} pruned {} prune_failed {} reconciled {} wait_failed {} timed_out {}",
        tally.applied,
        tally.failed,
        tally.skipped,
        tally.pruned,
        tally.prune_failed,
        tally.reconciled,
        tally.wait_failed,
        tally.timed_out,
    );
    let mut done = Event::new(EventKind::Completed, None, None, summary);
    if let Some(err) = &replace_err {
        done = done.with_error(err.to_string());
    } else if cancelled_run {
        done = done.with_error(EngineError::Cancelled.to_string());
    } else if deadline_hit {
        done = done.with_error(EngineError::DeadlineExceeded { scope: "apply".into() }.to_string());
    }
    events.emit(done).await;
    histogram!("run_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
    info!(inventory = %inventory_id, tally = ?tally, "apply run finished");

    if let Some(err) = replace_err {
        return Err(err);
    }
    if cancelled_run {
        return Err(EngineError::Cancelled);
    }
    Ok(tally)
}

/// Close the stream with a summary event for failures that abort before any
/// mutation.
async fn abort_run(events: &mut EventSender, err: EngineError) -> EngineError {
    events
        .emit(Event::new(EventKind::Completed, None, None, "run aborted").with_error(err.to_string()))
        .await;
    err
}

#[derive(Default)]
struct PruneReport {
    failed: Vec<ResourceId>,
    cancelled: bool,
}

#[allow(clippy::too_many_arguments)]
async fn prune_all(
    cluster: &Arc<dyn ClusterClient>,
    ids: Vec<ResourceId>,
    policy: PrunePolicy,
    timeout: Option<Duration>,
    max_parallel: usize,
    events: &mut EventSender,
    tally: &mut Tally,
    cancel: &watch::Receiver<bool>,
) -> PruneReport {
    let mut report = PruneReport::default();
    if ids.is_empty() {
        return report;
    }
    let deadline = timeout.map(|d| Instant::now() + d);
    // Reverse mirror of apply precedence: instances before their CRD,
    // objects before their namespace.
    for phase in flotilla_graph::prune_order(ids) {
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let mut join: JoinSet<(ResourceId, Result<bool, TaskError>)> = JoinSet::new();

        for id in phase {
            if *cancel.borrow() {
                report.cancelled = true;
                events
                    .emit(
                        Event::new(EventKind::PruneSkipped, Some(id), None, "not dispatched")
                            .with_error(EngineError::Cancelled.to_string()),
                    )
                    .await;
                continue;
            }
            if policy == PrunePolicy::Orphan {
                tally.pruned += 1;
                events
                    .emit(Event::new(EventKind::PruneSkipped, Some(id), None, "orphaned by prune policy"))
                    .await;
                continue;
            }
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                tally.prune_failed += 1;
                report.failed.push(id.clone());
                events
                    .emit(
                        Event::new(EventKind::PruneFailed, Some(id), None, "not dispatched")
                            .with_error(EngineError::DeadlineExceeded { scope: "prune".into() }.to_string()),
                    )
                    .await;
                continue;
            }
            events.emit(Event::new(EventKind::PruneStarted, Some(id.clone()), None, "pruning")).await;
            let cluster = cluster.clone();
            let sem = semaphore.clone();
            let cancel_rx = cancel.clone();
            join.spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return (id, Err(TaskError::Cancelled)),
                };
                let res = delete_one(cluster.as_ref(), &id, cancel_rx, deadline).await;
                (id, res)
            });
        }

        // Best-effort across the whole set: failures never halt siblings.
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((id, Ok(existed))) => {
                    tally.pruned += 1;
                    counter!("prune_ok_total", 1u64);
                    let msg = if existed { "deleted" } else { "already absent" };
                    events.emit(Event::new(EventKind::Pruned, Some(id), None, msg)).await;
                }
                Ok((id, Err(TaskError::Cancelled))) => {
                    report.cancelled = true;
                    events
                        .emit(
                            Event::new(EventKind::PruneSkipped, Some(id), None, "cancelled in flight")
                                .with_error(EngineError::Cancelled.to_string()),
                        )
                        .await;
                }
                Ok((id, Err(TaskError::Deadline))) => {
                    tally.prune_failed += 1;
                    report.failed.push(id.clone());
                    events
                        .emit(
                            Event::new(EventKind::PruneFailed, Some(id), None, "deadline in flight")
                                .with_error(EngineError::DeadlineExceeded { scope: "prune".into() }.to_string()),
                        )
                        .await;
                }
                Ok((id, Err(TaskError::Api(e)))) => {
                    tally.prune_failed += 1;
                    counter!("prune_err_total", 1u64);
                    report.failed.push(id.clone());
                    events
                        .emit(
                            Event::new(EventKind::PruneFailed, Some(id), None, "delete failed")
                                .with_error(e.to_string()),
                        )
                        .await;
                }
                Err(join_err) => {
                    tally.prune_failed += 1;
                    counter!("prune_err_total", 1u64);
                    events
                        .emit(
                            Event::new(EventKind::PruneFailed, None, None, "prune task aborted")
                                .with_error(join_err.to_string()),
                        )
                        .await;
                }
            }
        }
    }
    report
}

async fn run_destroy(
    cluster: Arc<dyn ClusterClient>,
    store: Arc<dyn InventoryStore>,
    inventory_id: String,
    options: ApplyOptions,
    mut events: EventSender,
    cancel: watch::Receiver<bool>,
) -> Result<Tally, EngineError> {
    let (inventory, generation) = match store.read(&inventory_id).await {
        Ok(v) => v,
        Err(e) => return Err(abort_run(&mut events, EngineError::Api(e)).await),
    };
    let mut tally = Tally::default();
    if generation.is_none() {
        events.emit(Event::new(EventKind::Completed, None, None, "no inventory record")).await;
        return Ok(tally);
    }
    info!(inventory = %inventory_id, resources = inventory.len(), "destroy run starting");

    let report = prune_all(
        &cluster,
        inventory.to_vec(),
        options.prune_policy,
        options.prune_timeout,
        options.max_parallel,
        &mut events,
        &mut tally,
        &cancel,
    )
    .await;

    let mut replace_err: Option<EngineError> = None;
    if report.cancelled {
        // Record kept; a later destroy picks up where this one stopped.
    } else if report.failed.is_empty() {
        if let Err(e) = store.delete(&inventory_id).await {
            replace_err = Some(EngineError::Api(e));
        }
    } else {
        let remaining = Inventory::from_ids(report.failed.clone());
        match store.write(&inventory_id, &remaining, generation).await {
            Ok(_) => {}
            Err(ApiError::Conflict) => {
                replace_err = Some(EngineError::InventoryConflict { inventory: inventory_id.clone() })
            }
            Err(e) => replace_err = Some(EngineError::Api(e)),
        }
    }

    let cancelled_run = *cancel.borrow();
    let summary = format!("pruned {} prune_failed {}", tally.pruned, tally.prune_failed);
    let mut done = Event::new(EventKind::Completed, None, None, summary);
    if let Some(err) = &replace_err {
        done = done.with_error(err.to_string());
    } else if cancelled_run {
        done = done.with_error(EngineError::Cancelled.to_string());
    }
    events.emit(done).await;
    info!(inventory = %inventory_id, tally = ?tally, "destroy run finished");

    if let Some(err) = replace_err {
        return Err(err);
    }
    if cancelled_run {
        return Err(EngineError::Cancelled);
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn require_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn cancellation_future_is_send_and_resolves() {
        let (tx, mut rx) = watch::channel(false);
        {
            let fut = cancelled(&mut rx);
            require_send(&fut);
        }
        tx.send(true).unwrap();
        cancelled(&mut rx).await;
    }

    #[tokio::test]
    async fn retry_backoff_exponent_is_clamped() {
        std::env::set_var("FLOTILLA_RETRY_ATTEMPTS", "64");
        std::env::set_var("FLOTILLA_RETRY_BASE_MS", "0");
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // Enough transient failures to push the exponent past the width of
        // the multiplier if it were unclamped.
        let res = with_retry(cancel_rx, None, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 < 40 {
                    Err(ApiError::Transient("again".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(matches!(res, Ok(())));
        assert_eq!(calls.load(Ordering::SeqCst), 40);
        std::env::remove_var("FLOTILLA_RETRY_ATTEMPTS");
        std::env::remove_var("FLOTILLA_RETRY_BASE_MS");
    }
}
