//! Batch Loader Registry
//!
//! Coalesces the many "fetch by id" calls issued while resolving a single
//! incoming query into the fewest possible bulk fetches, fans results back
//! out in request order, and memoizes per-key results for the lifetime of
//! one request.
//!
//! Scheduling is explicit rather than piggybacked on the executor's task
//! queue: `load` appends the key to a pending queue and arms a short
//! debounce timer; every `load` issued before the timer fires joins the
//! same flush. `flush` can also be invoked directly at a synchronization
//! point. Either way one flush makes exactly one call to the relation's
//! batch function with the deduplicated key list.
//!
//! A loader (and its memo) belongs to one request. Registries are created
//! in the request handler and dropped with it; sharing one across requests
//! would leak data between callers and grow the memo without bound.

use crate::error::{StoreError, StoreResult};
use crate::store::GenealogyStore;
use async_trait::async_trait;
use lineage_core::{
    Comment, Family, FamilyId, LifeEvent, MediaItem, Person, PersonId, SourceRecord,
};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Default debounce window before a pending batch is dispatched.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1);

/// A relation's underlying bulk fetch.
///
/// Receives the full deduplicated key slice and must return a same-length,
/// same-order result vector (`None` / empty for misses, depending on the
/// relation's value type).
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync {
    async fn load(&self, keys: &[K]) -> StoreResult<Vec<V>>;
}

struct LoaderState<K, V> {
    /// Completed results, kept for the loader's lifetime. Failed batches
    /// are memoized too, so repeated loads within one request resolve
    /// identically without re-fetching.
    memo: HashMap<K, StoreResult<V>>,
    /// Keys awaiting the next flush, deduplicated, in first-request order.
    pending: Vec<K>,
    /// Requesters per pending key; duplicates share one fetch.
    waiters: HashMap<K, Vec<oneshot::Sender<StoreResult<V>>>>,
    flush_scheduled: bool,
}

impl<K, V> Default for LoaderState<K, V> {
    fn default() -> Self {
        Self {
            memo: HashMap::new(),
            pending: Vec::new(),
            waiters: HashMap::new(),
            flush_scheduled: false,
        }
    }
}

struct LoaderInner<K, V> {
    batch_fn: Box<dyn BatchFn<K, V>>,
    delay: Duration,
    state: Mutex<LoaderState<K, V>>,
}

enum Enqueued<V> {
    Ready(StoreResult<V>),
    Wait(oneshot::Receiver<StoreResult<V>>),
}

/// Request-scoped batching loader for one relation kind.
pub struct BatchLoader<K, V> {
    inner: Arc<LoaderInner<K, V>>,
}

impl<K, V> Clone for BatchLoader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> BatchLoader<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(batch_fn: impl BatchFn<K, V> + 'static, delay: Duration) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                batch_fn: Box::new(batch_fn),
                delay,
                state: Mutex::new(LoaderState::default()),
            }),
        }
    }

    /// Load one key, joining the current flush window.
    pub async fn load(&self, key: K) -> StoreResult<V> {
        match self.enqueue(key) {
            Enqueued::Ready(result) => result,
            Enqueued::Wait(rx) => rx.await.map_err(|_| StoreError::LoaderDropped)?,
        }
    }

    /// Load many keys with the same ordering and memoization guarantees.
    ///
    /// All keys are enqueued before anything is awaited, so they land in
    /// one flush window. An empty slice resolves without any fetch.
    pub async fn load_many(&self, keys: &[K]) -> StoreResult<Vec<V>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let pending: Vec<Enqueued<V>> = keys.iter().map(|k| self.enqueue(k.clone())).collect();
        let mut out = Vec::with_capacity(pending.len());
        for entry in pending {
            let value = match entry {
                Enqueued::Ready(result) => result?,
                Enqueued::Wait(rx) => rx.await.map_err(|_| StoreError::LoaderDropped)??,
            };
            out.push(value);
        }
        Ok(out)
    }

    /// Dispatch the pending batch immediately.
    ///
    /// Safe to call at any synchronization point; a no-op when nothing is
    /// pending. The debounce timer calls this same path.
    pub async fn flush(&self) {
        Self::run_flush(&self.inner).await;
    }

    fn enqueue(&self, key: K) -> Enqueued<V> {
        let mut schedule = false;
        let entry = {
            let mut state = self.inner.state.lock().expect("loader state poisoned");
            if let Some(memoized) = state.memo.get(&key) {
                Enqueued::Ready(memoized.clone())
            } else {
                let (tx, rx) = oneshot::channel();
                if !state.waiters.contains_key(&key) {
                    state.pending.push(key.clone());
                }
                state.waiters.entry(key).or_default().push(tx);
                if !state.flush_scheduled {
                    state.flush_scheduled = true;
                    schedule = true;
                }
                Enqueued::Wait(rx)
            }
        };
        if schedule {
            let inner = Arc::clone(&self.inner);
            let delay = self.inner.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                Self::run_flush(&inner).await;
            });
        }
        entry
    }

    async fn run_flush(inner: &Arc<LoaderInner<K, V>>) {
        let (keys, mut waiters) = {
            let mut state = inner.state.lock().expect("loader state poisoned");
            state.flush_scheduled = false;
            if state.pending.is_empty() {
                return;
            }
            let keys = std::mem::take(&mut state.pending);
            let mut waiters = HashMap::with_capacity(keys.len());
            for key in &keys {
                if let Some(txs) = state.waiters.remove(key) {
                    waiters.insert(key.clone(), txs);
                }
            }
            (keys, waiters)
        };

        tracing::debug!(batch_size = keys.len(), "dispatching batched fetch");
        let fetched = inner.batch_fn.load(&keys).await;

        let results: Vec<(K, StoreResult<V>)> = match fetched {
            Ok(values) if values.len() == keys.len() => keys
                .into_iter()
                .zip(values.into_iter().map(Ok))
                .collect(),
            Ok(values) => {
                let err = StoreError::BatchShapeMismatch {
                    expected: keys.len(),
                    got: values.len(),
                };
                keys.into_iter().map(|k| (k, Err(err.clone()))).collect()
            }
            // One failure rejects every pending requester of this relation;
            // other relations' loaders are untouched.
            Err(err) => keys.into_iter().map(|k| (k, Err(err.clone()))).collect(),
        };

        let mut state = inner.state.lock().expect("loader state poisoned");
        for (key, result) in results {
            if let Some(txs) = waiters.remove(&key) {
                for tx in txs {
                    let _ = tx.send(result.clone());
                }
            }
            state.memo.insert(key, result);
        }
    }
}

// ============================================================================
// LOADER REGISTRY
// ============================================================================

macro_rules! relation_batch {
    ($name:ident, $key:ty, $value:ty, $method:ident) => {
        struct $name(Arc<dyn GenealogyStore>);

        #[async_trait]
        impl BatchFn<$key, $value> for $name {
            async fn load(&self, keys: &[$key]) -> StoreResult<Vec<$value>> {
                self.0.$method(keys).await
            }
        }
    };
}

relation_batch!(PersonBatch, PersonId, Option<Person>, persons_by_ids);
relation_batch!(FamilyBatch, FamilyId, Option<Family>, families_by_ids);
relation_batch!(ChildrenBatch, FamilyId, Vec<Person>, children_by_family_ids);
relation_batch!(
    SpouseFamiliesBatch,
    PersonId,
    Vec<Family>,
    families_as_spouse_by_person_ids
);
relation_batch!(
    ChildFamiliesBatch,
    PersonId,
    Vec<Family>,
    families_as_child_by_person_ids
);
relation_batch!(EventsBatch, PersonId, Vec<LifeEvent>, events_by_person_ids);
relation_batch!(
    SourcesBatch,
    PersonId,
    Vec<SourceRecord>,
    sources_by_person_ids
);
relation_batch!(MediaBatch, PersonId, Vec<MediaItem>, media_by_person_ids);
relation_batch!(
    CommentsBatch,
    PersonId,
    Vec<Comment>,
    comments_by_person_ids
);

/// One loader per relation kind, created fresh per incoming request.
///
/// Invariant: never shared or reused across requests. Each loader's memo
/// is keyed only by relation key, so reuse would serve one caller's rows
/// to another and grow without bound.
pub struct LoaderRegistry {
    pub person: BatchLoader<PersonId, Option<Person>>,
    pub family: BatchLoader<FamilyId, Option<Family>>,
    pub children_by_family: BatchLoader<FamilyId, Vec<Person>>,
    pub families_as_spouse: BatchLoader<PersonId, Vec<Family>>,
    pub families_as_child: BatchLoader<PersonId, Vec<Family>>,
    pub events_by_person: BatchLoader<PersonId, Vec<LifeEvent>>,
    pub sources_by_person: BatchLoader<PersonId, Vec<SourceRecord>>,
    pub media_by_person: BatchLoader<PersonId, Vec<MediaItem>>,
    pub comments_by_person: BatchLoader<PersonId, Vec<Comment>>,
}

impl LoaderRegistry {
    pub fn new(store: Arc<dyn GenealogyStore>, delay: Duration) -> Self {
        Self {
            person: BatchLoader::new(PersonBatch(Arc::clone(&store)), delay),
            family: BatchLoader::new(FamilyBatch(Arc::clone(&store)), delay),
            children_by_family: BatchLoader::new(ChildrenBatch(Arc::clone(&store)), delay),
            families_as_spouse: BatchLoader::new(SpouseFamiliesBatch(Arc::clone(&store)), delay),
            families_as_child: BatchLoader::new(ChildFamiliesBatch(Arc::clone(&store)), delay),
            events_by_person: BatchLoader::new(EventsBatch(Arc::clone(&store)), delay),
            sources_by_person: BatchLoader::new(SourcesBatch(Arc::clone(&store)), delay),
            media_by_person: BatchLoader::new(MediaBatch(Arc::clone(&store)), delay),
            comments_by_person: BatchLoader::new(CommentsBatch(store), delay),
        }
    }

    /// Registry with the default debounce window.
    pub fn with_default_delay(store: Arc<dyn GenealogyStore>) -> Self {
        Self::new(store, DEFAULT_BATCH_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Batch fn that records every dispatched key list.
    struct Recording {
        calls: AtomicUsize,
        dispatched: Mutex<Vec<Vec<String>>>,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                dispatched: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BatchFn<String, Option<String>> for Arc<Recording> {
        async fn load(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.dispatched.lock().unwrap().push(keys.to_vec());
            Ok(keys
                .iter()
                .map(|k| {
                    if k.starts_with("missing") {
                        None
                    } else {
                        Some(format!("row:{k}"))
                    }
                })
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl BatchFn<String, Option<String>> for Failing {
        async fn load(&self, _keys: &[String]) -> StoreResult<Vec<Option<String>>> {
            Err(StoreError::Query {
                reason: "boom".to_string(),
            })
        }
    }

    fn loader(batch: Arc<Recording>) -> BatchLoader<String, Option<String>> {
        BatchLoader::new(batch, DEFAULT_BATCH_DELAY)
    }

    #[tokio::test(start_paused = true)]
    async fn test_loads_in_one_window_share_one_fetch() {
        let batch = Arc::new(Recording::new());
        let l = loader(Arc::clone(&batch));

        let (a, b, c) = tokio::join!(
            l.load("I1".to_string()),
            l.load("I2".to_string()),
            l.load("I3".to_string()),
        );
        assert_eq!(a.unwrap().unwrap(), "row:I1");
        assert_eq!(b.unwrap().unwrap(), "row:I2");
        assert_eq!(c.unwrap().unwrap(), "row:I3");
        assert_eq!(batch.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            batch.dispatched.lock().unwrap()[0],
            vec!["I1".to_string(), "I2".to_string(), "I3".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_keys_fetched_once_and_fanned_out() {
        let batch = Arc::new(Recording::new());
        let l = loader(Arc::clone(&batch));

        let (a, b) = tokio::join!(l.load("I1".to_string()), l.load("I1".to_string()));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(batch.calls.load(Ordering::SeqCst), 1);
        assert_eq!(batch.dispatched.lock().unwrap()[0], vec!["I1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_key_resolves_to_none() {
        let batch = Arc::new(Recording::new());
        let l = loader(batch);
        assert_eq!(l.load("missing-1".to_string()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_load_is_memoized() {
        let batch = Arc::new(Recording::new());
        let l = loader(Arc::clone(&batch));

        assert!(l.load("I1".to_string()).await.unwrap().is_some());
        assert!(l.load("I1".to_string()).await.unwrap().is_some());
        assert_eq!(batch.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_many_preserves_order_and_empty_skips_fetch() {
        let batch = Arc::new(Recording::new());
        let l = loader(Arc::clone(&batch));

        let none: Vec<String> = Vec::new();
        assert!(l.load_many(&none).await.unwrap().is_empty());
        assert_eq!(batch.calls.load(Ordering::SeqCst), 0);

        let rows = l
            .load_many(&["I2".to_string(), "missing-9".to_string(), "I1".to_string()])
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![Some("row:I2".to_string()), None, Some("row:I1".to_string())]
        );
        assert_eq!(batch.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_rejects_every_pending_requester() {
        let l: BatchLoader<String, Option<String>> =
            BatchLoader::new(Failing, DEFAULT_BATCH_DELAY);

        let (a, b) = tokio::join!(l.load("I1".to_string()), l.load("I2".to_string()));
        let ea = a.unwrap_err();
        let eb = b.unwrap_err();
        assert_eq!(ea, eb);
        assert!(matches!(ea, StoreError::Query { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_in_one_loader_does_not_affect_another() {
        let failing: BatchLoader<String, Option<String>> =
            BatchLoader::new(Failing, DEFAULT_BATCH_DELAY);
        let batch = Arc::new(Recording::new());
        let healthy = loader(Arc::clone(&batch));

        let (bad, good) = tokio::join!(
            failing.load("I1".to_string()),
            healthy.load("I1".to_string()),
        );
        assert!(bad.is_err());
        assert_eq!(good.unwrap().unwrap(), "row:I1");
    }

    proptest! {
        /// One `load_many` window is always one batch call carrying the
        /// deduplicated keys in first-request order, with results fanned
        /// back out per input key.
        #[test]
        fn prop_load_many_dispatches_one_deduplicated_batch(
            keys in proptest::collection::vec("I[0-9]{1,3}", 1..40)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            let batch = Arc::new(Recording::new());
            let l = loader(Arc::clone(&batch));
            let rows = rt.block_on(l.load_many(&keys)).unwrap();

            let mut deduped: Vec<String> = Vec::new();
            for key in &keys {
                if !deduped.contains(key) {
                    deduped.push(key.clone());
                }
            }
            let expected: Vec<Option<String>> =
                keys.iter().map(|k| Some(format!("row:{k}"))).collect();

            prop_assert_eq!(rows, expected);
            prop_assert_eq!(batch.calls.load(Ordering::SeqCst), 1);
            prop_assert_eq!(batch.dispatched.lock().unwrap().clone(), vec![deduped]);
        }
    }

    #[tokio::test]
    async fn test_explicit_flush_dispatches_without_timer() {
        let batch = Arc::new(Recording::new());
        let l = loader(Arc::clone(&batch));

        // join! polls the load first, which enqueues; the flush then
        // drains the queue before the debounce timer has a chance to.
        let (row, _) = tokio::join!(l.load("I1".to_string()), l.flush());
        assert_eq!(row.unwrap().unwrap(), "row:I1");
        assert_eq!(batch.calls.load(Ordering::SeqCst), 1);
    }
}
