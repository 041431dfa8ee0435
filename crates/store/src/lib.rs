//! Object store used behind the admission pipeline.
//!
//! The pipeline treats storage as a black box offering per-object optimistic
//! concurrency (`metadata.resourceVersion`) and a watch stream; [`ObjectStore`] is
//! that contract and [`MemoryStore`] an in-RAM implementation of it. Objects are
//! stored and returned verbatim; the store never defaults or validates.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use kube::Resource;
use mcs_core::ObjectKey;
use metrics::counter;
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const WATCH_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{key} not found")]
    NotFound { key: ObjectKey },
    #[error("{key} already exists")]
    AlreadyExists { key: ObjectKey },
    #[error("conflict on {key}: resourceVersion {expected} is stale (current {actual})")]
    Conflict { key: ObjectKey, expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
}

impl<K> WatchEvent<K> {
    pub fn object(&self) -> &K {
        match self {
            WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => o,
        }
    }
}

/// Storage contract consumed by the registry.
///
/// `precondition` is the resourceVersion the writer read; `None` writes
/// unconditionally (the store still serializes writers per object).
pub trait ObjectStore<K>: Send + Sync {
    fn get(&self, key: &ObjectKey) -> Option<K>;
    fn list(&self, namespace: Option<&str>) -> Vec<K>;
    fn create(&self, key: &ObjectKey, obj: K) -> Result<K, StoreError>;
    fn update(&self, key: &ObjectKey, obj: K, precondition: Option<&str>) -> Result<K, StoreError>;
    fn delete(&self, key: &ObjectKey, precondition: Option<&str>) -> Result<K, StoreError>;
    fn watch(&self) -> broadcast::Receiver<WatchEvent<K>>;
}

/// Monotonic resourceVersion source, shareable by the stores of several kinds.
#[derive(Debug, Clone, Default)]
pub struct VersionClock(Arc<AtomicU64>);

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

type Objects<K> = FxHashMap<ObjectKey, K>;

/// Copy-on-write map: readers load the current snapshot lock-free, writers are
/// serialized by `write_lock` and swap in a new snapshot.
pub struct MemoryStore<K> {
    snap: ArcSwap<Objects<K>>,
    write_lock: Mutex<()>,
    clock: VersionClock,
    events: broadcast::Sender<WatchEvent<K>>,
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(VersionClock::new())
    }

    pub fn with_clock(clock: VersionClock) -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self { snap: ArcSwap::from_pointee(Objects::default()), write_lock: Mutex::new(()), clock, events }
    }

    pub fn len(&self) -> usize {
        self.snap.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`; a poisoned lock carries no broken state.
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stamp(&self, obj: &mut K) -> String {
        let rv = self.clock.next().to_string();
        obj.meta_mut().resource_version = Some(rv.clone());
        rv
    }

    fn check_precondition(key: &ObjectKey, current: &K, precondition: Option<&str>) -> Result<(), StoreError> {
        let Some(expected) = precondition.filter(|p| !p.is_empty()) else { return Ok(()) };
        let actual = current.meta().resource_version.clone().unwrap_or_default();
        if expected != actual {
            return Err(StoreError::Conflict { key: key.clone(), expected: expected.to_string(), actual });
        }
        Ok(())
    }

    fn commit(&self, next: Objects<K>, event: WatchEvent<K>) {
        self.snap.store(Arc::new(next));
        let _ = self.events.send(event);
    }
}

impl<K> Default for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get(&self, key: &ObjectKey) -> Option<K> {
        self.snap.load().get(key).cloned()
    }

    fn list(&self, namespace: Option<&str>) -> Vec<K> {
        let snap = self.snap.load();
        let mut out: Vec<(&ObjectKey, &K)> =
            snap.iter().filter(|(k, _)| namespace.map_or(true, |ns| k.namespace.as_deref() == Some(ns))).collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out.into_iter().map(|(_, v)| v.clone()).collect()
    }

    fn create(&self, key: &ObjectKey, mut obj: K) -> Result<K, StoreError> {
        let _guard = self.lock();
        let cur = self.snap.load_full();
        if cur.contains_key(key) {
            return Err(StoreError::AlreadyExists { key: key.clone() });
        }
        let rv = self.stamp(&mut obj);
        let mut next = (*cur).clone();
        next.insert(key.clone(), obj.clone());
        self.commit(next, WatchEvent::Added(obj.clone()));
        counter!("store_write_total", 1u64, "op" => "create");
        debug!(key = %key, resource_version = %rv, "store create");
        Ok(obj)
    }

    fn update(&self, key: &ObjectKey, mut obj: K, precondition: Option<&str>) -> Result<K, StoreError> {
        let _guard = self.lock();
        let cur = self.snap.load_full();
        let current = cur.get(key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        Self::check_precondition(key, current, precondition)?;
        let rv = self.stamp(&mut obj);
        let mut next = (*cur).clone();
        next.insert(key.clone(), obj.clone());
        self.commit(next, WatchEvent::Modified(obj.clone()));
        counter!("store_write_total", 1u64, "op" => "update");
        debug!(key = %key, resource_version = %rv, conditional = precondition.is_some(), "store update");
        Ok(obj)
    }

    fn delete(&self, key: &ObjectKey, precondition: Option<&str>) -> Result<K, StoreError> {
        let _guard = self.lock();
        let cur = self.snap.load_full();
        let current = cur.get(key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        Self::check_precondition(key, current, precondition)?;
        let mut next = (*cur).clone();
        let removed = next.remove(key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        self.commit(next, WatchEvent::Deleted(removed.clone()));
        counter!("store_write_total", 1u64, "op" => "delete");
        trace!(key = %key, "store delete");
        Ok(removed)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent<K>> {
        self.events.subscribe()
    }
}
