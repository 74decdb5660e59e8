//! In-memory `ClusterClient` double for tests: scripted failures, injected
//! statuses for the waiter, and in-flight accounting for concurrency checks.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use flotilla_core::{ApiError, ResourceId, ResourceManifest};
use serde_json::Value as Json;

use crate::ClusterClient;

#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<HashMap<ResourceId, Json>>,
    statuses: Mutex<HashMap<ResourceId, Json>>,
    failures: Mutex<HashMap<ResourceId, VecDeque<ApiError>>>,
    deleted: Mutex<Vec<ResourceId>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `times` mutation calls for `id` to fail with `err`.
    pub fn fail_next(&self, id: &ResourceId, err: ApiError, times: usize) {
        let mut failures = self.failures.lock().unwrap();
        let q = failures.entry(id.clone()).or_default();
        for _ in 0..times {
            q.push_back(err.clone());
        }
    }

    /// Inject the status block `get` returns for `id`.
    pub fn set_status(&self, id: &ResourceId, status: Json) {
        self.statuses.lock().unwrap().insert(id.clone(), status);
    }

    /// Hold every call open for `d` so concurrency is observable.
    pub fn set_delay(&self, d: Duration) {
        *self.delay.lock().unwrap() = Some(d);
    }

    /// Pre-seed a live object without going through create.
    pub fn seed(&self, id: &ResourceId, raw: Json) {
        self.objects.lock().unwrap().insert(id.clone(), raw);
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Ids deleted so far, in deletion order.
    pub fn deleted(&self) -> Vec<ResourceId> {
        self.deleted.lock().unwrap().clone()
    }

    /// Highest number of calls that were in flight at the same instant.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self, id: &ResourceId) -> Option<ApiError> {
        self.failures.lock().unwrap().get_mut(id).and_then(|q| q.pop_front())
    }

    async fn enter(&self) -> InFlightGuard<'_> {
        let cur = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(cur, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        InFlightGuard { counter: &self.in_flight }
    }
}

struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn create(&self, manifest: &ResourceManifest) -> Result<(), ApiError> {
        let _guard = self.enter().await;
        if let Some(err) = self.scripted_failure(&manifest.id) {
            return Err(err);
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&manifest.id) {
            return Err(ApiError::Conflict);
        }
        objects.insert(manifest.id.clone(), manifest.raw.clone());
        Ok(())
    }

    async fn update(&self, manifest: &ResourceManifest) -> Result<(), ApiError> {
        let _guard = self.enter().await;
        if let Some(err) = self.scripted_failure(&manifest.id) {
            return Err(err);
        }
        self.objects.lock().unwrap().insert(manifest.id.clone(), manifest.raw.clone());
        Ok(())
    }

    async fn get(&self, id: &ResourceId) -> Result<Option<Json>, ApiError> {
        let _guard = self.enter().await;
        let objects = self.objects.lock().unwrap();
        let Some(raw) = objects.get(id) else { return Ok(None) };
        let mut live = raw.clone();
        if let Some(status) = self.statuses.lock().unwrap().get(id) {
            if let Some(obj) = live.as_object_mut() {
                obj.insert("status".to_string(), status.clone());
            }
        }
        Ok(Some(live))
    }

    async fn delete(&self, id: &ResourceId) -> Result<bool, ApiError> {
        let _guard = self.enter().await;
        if let Some(err) = self.scripted_failure(id) {
            return Err(err);
        }
        let existed = self.objects.lock().unwrap().remove(id).is_some();
        if existed {
            self.deleted.lock().unwrap().push(id.clone());
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(ns: &str, name: &str) -> ResourceManifest {
        ResourceManifest::from_json(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": { "name": name, "namespace": ns }
        }))
        .expect("manifest")
    }

    #[tokio::test]
    async fn create_then_create_conflicts() {
        let fake = FakeCluster::new();
        let m = manifest("ns", "cm");
        fake.create(&m).await.expect("create");
        assert_eq!(fake.create(&m).await.unwrap_err(), ApiError::Conflict);
        fake.update(&m).await.expect("update");
    }

    #[tokio::test]
    async fn delete_is_idempotent_about_absence() {
        let fake = FakeCluster::new();
        let m = manifest("ns", "cm");
        fake.create(&m).await.expect("create");
        assert!(fake.delete(&m.id).await.expect("delete"));
        assert!(!fake.delete(&m.id).await.expect("delete again"));
        assert_eq!(fake.deleted(), vec![m.id]);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let fake = FakeCluster::new();
        let m = manifest("ns", "cm");
        fake.fail_next(&m.id, ApiError::Transient("blip".into()), 2);
        assert!(fake.create(&m).await.unwrap_err().is_transient());
        assert!(fake.create(&m).await.unwrap_err().is_transient());
        fake.create(&m).await.expect("third attempt lands");
    }

    #[tokio::test]
    async fn injected_status_shows_up_in_get() {
        let fake = FakeCluster::new();
        let m = manifest("ns", "cm");
        fake.create(&m).await.expect("create");
        fake.set_status(&m.id, serde_json::json!({ "conditions": [ { "type": "Ready", "status": "True" } ] }));
        let live = fake.get(&m.id).await.expect("get").expect("exists");
        assert_eq!(
            live["status"]["conditions"][0]["type"].as_str(),
            Some("Ready")
        );
    }
}
