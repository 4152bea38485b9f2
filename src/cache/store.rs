//! Keyed query store.
//!
//! Holds one entry per [`CacheKey`] in an LRU map. Each entry carries a
//! generation drawn from a store-wide epoch; `invalidate` and `set` advance
//! it. A fetch remembers the generation it started under, which decides
//! whether later reads may join it and whether its result is still allowed
//! to land in the entry.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{CacheConfig, QueryOptions, RetryPolicy};
use super::keys::{CacheKey, KeyPattern};
use super::lock::{read, write};
use crate::rpc::{RpcError, RpcResult};

pub(crate) const METRIC_QUERY_HIT: &str = "pitchside_query_hit_total";
pub(crate) const METRIC_QUERY_MISS: &str = "pitchside_query_miss_total";
pub(crate) const METRIC_QUERY_COALESCED: &str = "pitchside_query_coalesced_total";
pub(crate) const METRIC_QUERY_FETCH_MS: &str = "pitchside_query_fetch_ms";

/// Type-erased cached value.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Produces one remote read. Called once per attempt.
pub type Loader = Arc<dyn Fn() -> BoxFuture<'static, RpcResult<AnyValue>> + Send + Sync>;

type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, FetchError>>>;

/// Wrap a typed async read into a [`Loader`].
pub fn loader<T, F, Fut>(read: F) -> Loader
where
    T: Any + Send + Sync,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<T>> + Send + 'static,
{
    Arc::new(move || {
        read()
            .map(|result| result.map(|value| Arc::new(value) as AnyValue))
            .boxed()
    })
}

/// Error returned to callers awaiting a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("fetch task aborted: {0}")]
    Aborted(String),
    #[error("cached value for `{key}` has an unexpected type")]
    TypeMismatch { key: String },
}

/// Lifecycle of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Created but never fetched.
    Uninitialized,
    /// Holds a value that may be served.
    Idle,
    /// A load is running.
    Fetching,
    /// Invalidated; the next read reloads.
    Stale,
    /// The last load failed. Any earlier value is kept.
    Error,
}

/// Point-in-time view of an entry.
#[derive(Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Option<AnyValue>,
    pub status: EntryStatus,
    pub last_updated: Option<OffsetDateTime>,
    pub error: Option<RpcError>,
    pub observers: usize,
}

impl CacheEntry {
    /// Typed access to the cached value.
    pub fn value_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone()?.downcast::<T>().ok()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("has_value", &self.value.is_some())
            .field("status", &self.status)
            .field("last_updated", &self.last_updated)
            .field("error", &self.error)
            .field("observers", &self.observers)
            .finish()
    }
}

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

struct Slot {
    value: Option<AnyValue>,
    status: EntryStatus,
    generation: u64,
    /// Generation at creation. Results of fetches older than the slot itself
    /// belong to a removed predecessor.
    born: u64,
    settled_at: Option<Instant>,
    last_updated: Option<OffsetDateTime>,
    last_access: Instant,
    error: Option<RpcError>,
    observers: usize,
    in_flight: Option<InFlight>,
    loader: Option<Loader>,
    options: QueryOptions,
}

impl Slot {
    fn new(generation: u64, options: QueryOptions, now: Instant) -> Self {
        Self {
            value: None,
            status: EntryStatus::Uninitialized,
            generation,
            born: generation,
            settled_at: None,
            last_updated: None,
            last_access: now,
            error: None,
            observers: 0,
            in_flight: None,
            loader: None,
            options,
        }
    }

    /// Forget the value but keep subscribers. A load still running stays
    /// chained ahead of the next one.
    fn reset(&mut self, generation: u64, now: Instant) {
        self.value = None;
        self.status = EntryStatus::Uninitialized;
        self.generation = generation;
        self.born = generation;
        self.settled_at = None;
        self.last_updated = None;
        self.last_access = now;
        self.error = None;
    }

    fn fresh_value(&self, now: Instant) -> Option<AnyValue> {
        if self.status != EntryStatus::Idle {
            return None;
        }
        let within_window = match (self.options.stale_after, self.settled_at) {
            (Some(window), Some(settled_at)) => now.duration_since(settled_at) < window,
            _ => true,
        };
        if within_window { self.value.clone() } else { None }
    }

    fn store_value(&mut self, value: AnyValue) {
        self.value = Some(value);
        self.settled_at = Some(Instant::now());
        self.last_updated = Some(OffsetDateTime::now_utc());
    }

    fn snapshot(&self, key: &CacheKey) -> CacheEntry {
        CacheEntry {
            key: key.clone(),
            value: self.value.clone(),
            status: self.status,
            last_updated: self.last_updated,
            error: self.error.clone(),
            observers: self.observers,
        }
    }
}

enum Lookup {
    Hit(AnyValue),
    Pending(SharedFetch),
}

struct Inner {
    entries: RwLock<LruCache<CacheKey, Slot>>,
    epoch: AtomicU64,
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Process-wide query cache. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct QueryStore {
    inner: Arc<Inner>,
}

impl QueryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of one entry. Does not affect LRU order.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        read(&self.inner.entries, "store.get")
            .peek(key)
            .map(|slot| slot.snapshot(key))
    }

    /// Snapshots of every entry matching `pattern`.
    pub fn entries(&self, pattern: &KeyPattern) -> Vec<CacheEntry> {
        read(&self.inner.entries, "store.entries")
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, slot)| slot.snapshot(key))
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.inner.entries, "store.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serve the cached value when fresh, otherwise load through `loader`.
    ///
    /// Concurrent callers for the same key and generation share one load.
    pub async fn fetch(
        &self,
        key: CacheKey,
        loader: Loader,
        options: QueryOptions,
    ) -> Result<AnyValue, FetchError> {
        match self.begin(&key, &loader, options, false) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    /// Typed [`fetch`](Self::fetch).
    pub async fn fetch_as<T: Any + Send + Sync>(
        &self,
        key: CacheKey,
        loader: Loader,
        options: QueryOptions,
    ) -> Result<Arc<T>, FetchError> {
        let value = self.fetch(key.clone(), loader, options).await?;
        downcast(&key, value)
    }

    /// Load regardless of freshness. Still joins a load already running for
    /// the current generation.
    pub async fn refetch(
        &self,
        key: CacheKey,
        loader: Loader,
        options: QueryOptions,
    ) -> Result<AnyValue, FetchError> {
        match self.begin(&key, &loader, options, true) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    /// Seed an entry directly.
    pub fn set<T: Any + Send + Sync>(&self, key: CacheKey, value: T) {
        self.set_any(key, Arc::new(value));
    }

    pub fn set_any(&self, key: CacheKey, value: AnyValue) {
        let now = Instant::now();
        let generation = self.inner.next_generation();
        let mut entries = write(&self.inner.entries, "store.set");
        let slot = entries.get_or_insert_mut(key.clone(), || {
            Slot::new(generation, QueryOptions::default(), now)
        });
        slot.generation = generation;
        slot.status = EntryStatus::Idle;
        slot.error = None;
        slot.last_access = now;
        slot.store_value(value);
        debug!(key = %key, generation, "Query entry seeded");
    }

    /// Mark every matching entry stale. Never starts a load.
    ///
    /// Returns the number of entries matched.
    pub fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let mut entries = write(&self.inner.entries, "store.invalidate");
        let mut matched = 0;
        for (key, slot) in entries.iter_mut() {
            if !pattern.matches(key) {
                continue;
            }
            matched += 1;
            slot.generation = self.inner.next_generation();
            if slot.status != EntryStatus::Uninitialized {
                slot.status = EntryStatus::Stale;
            }
        }

        debug!(pattern = %pattern, matched, "Query entries invalidated");
        matched
    }

    /// Register an active subscriber for `key`.
    ///
    /// The loader is kept so [`refetch_active`](Self::refetch_active) and
    /// pollers can refresh the key. Dropping the guard unregisters.
    pub fn observe(&self, key: CacheKey, loader: Loader, options: QueryOptions) -> Observer {
        let now = Instant::now();
        let mut entries = write(&self.inner.entries, "store.observe");
        let slot = entries.get_or_insert_mut(key.clone(), || {
            Slot::new(self.inner.next_generation(), options, now)
        });
        slot.observers += 1;
        slot.loader = Some(loader);
        slot.options = options;
        slot.last_access = now;
        drop(entries);

        Observer {
            store: self.clone(),
            key,
        }
    }

    /// Start a refetch for every observed key matching `pattern`.
    ///
    /// Loads are registered before this returns, so reads issued afterwards
    /// join them. Must be called from within a Tokio runtime.
    pub fn refetch_active(&self, pattern: &KeyPattern) -> usize {
        let targets: Vec<(CacheKey, Loader, QueryOptions)> =
            read(&self.inner.entries, "store.refetch_active")
                .iter()
                .filter(|(key, slot)| slot.observers > 0 && pattern.matches(key))
                .filter_map(|(key, slot)| {
                    slot.loader
                        .as_ref()
                        .map(|loader| (key.clone(), Arc::clone(loader), slot.options))
                })
                .collect();

        for (key, loader, options) in &targets {
            // The load runs on its own task; the shared handle is not needed.
            let _ = self.begin(key, loader, *options, true);
        }

        if !targets.is_empty() {
            debug!(pattern = %pattern, count = targets.len(), "Refetching observed queries");
        }
        targets.len()
    }

    /// Drop every cached value.
    ///
    /// Unobserved entries are removed. Observed entries keep their
    /// subscribers, loader and options but restart as uninitialized under a
    /// new generation, so loads started before the clear never land in them.
    pub fn clear(&self) {
        let now = Instant::now();
        let mut entries = write(&self.inner.entries, "store.clear");
        let unobserved: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, slot)| slot.observers == 0)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &unobserved {
            entries.pop(key);
        }

        for (_, slot) in entries.iter_mut() {
            slot.reset(self.inner.next_generation(), now);
        }

        info!(
            removed = unobserved.len(),
            kept = entries.len(),
            "Query store cleared"
        );
    }

    /// Remove unobserved, idle entries whose inactivity window has elapsed.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let mut entries = write(&self.inner.entries, "store.collect_garbage");
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, slot)| {
                slot.observers == 0
                    && slot.in_flight.is_none()
                    && now.duration_since(slot.last_access) >= slot.options.gc_after
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Query entries collected");
        }
        expired.len()
    }

    /// Run [`collect_garbage`](Self::collect_garbage) on a timer until the
    /// store is dropped.
    pub fn spawn_janitor(&self, period: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                interval.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                QueryStore { inner }.collect_garbage();
            }
        })
    }

    fn begin(&self, key: &CacheKey, loader: &Loader, options: QueryOptions, force: bool) -> Lookup {
        let now = Instant::now();
        let mut entries = write(&self.inner.entries, "store.begin");
        let slot = entries.get_or_insert_mut(key.clone(), || {
            Slot::new(self.inner.next_generation(), options, now)
        });
        slot.options = options;
        slot.last_access = now;

        let joinable = slot
            .in_flight
            .as_ref()
            .filter(|in_flight| in_flight.generation == slot.generation)
            .map(|in_flight| in_flight.fetch.clone());
        if let Some(fetch) = joinable {
            counter!(METRIC_QUERY_COALESCED, "resource" => key.resource().as_str()).increment(1);
            debug!(key = %key, generation = slot.generation, "Joined in-flight query");
            return Lookup::Pending(fetch);
        }

        if !force {
            if let Some(value) = slot.fresh_value(now) {
                counter!(METRIC_QUERY_HIT, "resource" => key.resource().as_str()).increment(1);
                return Lookup::Hit(value);
            }
        }

        counter!(METRIC_QUERY_MISS, "resource" => key.resource().as_str()).increment(1);
        Lookup::Pending(self.spawn_load(key, slot, Arc::clone(loader)))
    }

    /// Start a load for the slot's current generation, chained after any
    /// older load still running so one key never has two loads at once.
    fn spawn_load(&self, key: &CacheKey, slot: &mut Slot, loader: Loader) -> SharedFetch {
        let generation = slot.generation;
        let retry = slot.options.retry;
        let previous = slot.in_flight.take().map(|in_flight| in_flight.fetch);
        let chained = previous.is_some();

        let store = self.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let started_at = Instant::now();
            let result = load_with_retry(&task_key, &loader, retry).await;
            histogram!(METRIC_QUERY_FETCH_MS, "resource" => task_key.resource().as_str())
                .record(started_at.elapsed().as_secs_f64() * 1000.0);
            store.settle(&task_key, generation, &result);
            result.map_err(FetchError::Rpc)
        });

        let fetch = async move {
            task.await
                .unwrap_or_else(|err| Err(FetchError::Aborted(err.to_string())))
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            generation,
            fetch: fetch.clone(),
        });
        slot.status = EntryStatus::Fetching;

        debug!(key = %key, generation, chained, "Query load started");
        fetch
    }

    fn settle(&self, key: &CacheKey, generation: u64, result: &RpcResult<AnyValue>) {
        let mut entries = write(&self.inner.entries, "store.settle");
        let Some(slot) = entries.peek_mut(key) else {
            debug!(key = %key, generation, "Load settled after entry removal; discarded");
            return;
        };

        if slot
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            slot.in_flight = None;
        }
        if generation < slot.born {
            debug!(key = %key, generation, "Load settled for a cleared entry; discarded");
            return;
        }

        let current = slot.generation == generation;
        match result {
            Ok(value) if current => {
                slot.store_value(Arc::clone(value));
                slot.status = EntryStatus::Idle;
                slot.error = None;
            }
            // Outdated but still better than nothing; the entry stays stale.
            Ok(value) if matches!(slot.status, EntryStatus::Stale | EntryStatus::Fetching) => {
                slot.store_value(Arc::clone(value));
            }
            Ok(_) => {
                debug!(key = %key, generation, "Outdated load discarded");
            }
            Err(err) if current => {
                warn!(key = %key, generation, error = %err, "Query load failed");
                slot.status = EntryStatus::Error;
                slot.error = Some(err.clone());
            }
            Err(err) => {
                debug!(key = %key, generation, error = %err, "Outdated load failed");
            }
        }
    }

    fn unobserve(&self, key: &CacheKey) {
        let now = Instant::now();
        let mut entries = write(&self.inner.entries, "store.unobserve");
        if let Some(slot) = entries.peek_mut(key) {
            slot.observers = slot.observers.saturating_sub(1);
            slot.last_access = now;
        }
    }
}

/// Active subscription to one key. Unregisters on drop.
pub struct Observer {
    store: QueryStore,
    key: CacheKey,
}

impl Observer {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn store(&self) -> &QueryStore {
        &self.store
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.store.unobserve(&self.key);
    }
}

pub(crate) fn downcast<T: Any + Send + Sync>(
    key: &CacheKey,
    value: AnyValue,
) -> Result<Arc<T>, FetchError> {
    value.downcast::<T>().map_err(|_| FetchError::TypeMismatch {
        key: key.to_string(),
    })
}

async fn load_with_retry(
    key: &CacheKey,
    loader: &Loader,
    policy: RetryPolicy,
) -> RpcResult<AnyValue> {
    let mut retry = 0;
    loop {
        match loader().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry < policy.attempts => {
                let delay = policy.delay_for(retry);
                retry += 1;
                warn!(
                    key = %key,
                    attempt = retry,
                    max_attempts = policy.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Query load failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
