//! Process-local domain cache with mutation-driven invalidation.
//!
//! # Semantics
//!
//! - `read` returns the stored value for a key unless it is stale, otherwise
//!   fetches, stores and returns. Concurrent reads of one key share a single
//!   fetch.
//! - `invalidate` marks keys stale. Invalidating [`CacheKey::Products`]
//!   also invalidates every product-derived key.
//! - `mutate` runs a remote write and invalidates the affected keys only if
//!   the write succeeded.
//!
//! Every key carries a generation number that each invalidation bumps. A
//! fetch started under an older generation is discarded when it completes,
//! so data fetched before a write never overwrites data fetched after it.
//! Readers of a discarded fetch retry against the newest one.
//!
//! Fetches are not spawned. Dropping every reader of a fetch cancels it and
//! the next read starts over.
//!
//! Values live in a `moka` cache bounded by [`CacheConfig`]; the TTL only
//! adds an upper bound on freshness on top of explicit invalidation.

mod key;
mod subscription;

pub use key::{CacheKey, CacheValue};
pub use subscription::{CacheEvent, CacheSubscription};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use moka::future::Cache;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::config::CacheConfig;
use crate::error::ClientError;

/// Buffered events per subscriber before it starts missing events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Keys tracked beyond `max_capacity` before the generation table is pruned.
const GENERATION_SLACK: usize = 64;

type SharedFetch = Shared<BoxFuture<'static, Result<CacheValue, ClientError>>>;

/// Shared, cheaply cloneable domain cache.
///
/// Create one per session; call [`DomainCache::clear`] when the session
/// ends.
#[derive(Clone)]
pub struct DomainCache {
    inner: Arc<DomainCacheInner>,
}

struct DomainCacheInner {
    store: Cache<CacheKey, Entry>,
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
    counters: Counters,
    prune_threshold: usize,
}

#[derive(Clone)]
struct Entry {
    generation: u64,
    value: CacheValue,
}

#[derive(Default)]
struct CacheState {
    next_generation: u64,
    generations: HashMap<CacheKey, u64>,
    in_flight: HashMap<CacheKey, InFlight>,
}

/// Weak so that a fetch whose readers have all gone away is dropped.
struct InFlight {
    generation: u64,
    fetch: WeakShared<BoxFuture<'static, Result<CacheValue, ClientError>>>,
}

impl CacheState {
    /// Generations are never reused, so forgetting a key can only make its
    /// older entries and fetches stale.
    fn generation_of(&mut self, key: &CacheKey) -> u64 {
        if let Some(&generation) = self.generations.get(key) {
            return generation;
        }
        let generation = self.next();
        self.generations.insert(key.clone(), generation);
        generation
    }

    const fn next(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn bump(&mut self, key: &CacheKey) {
        let generation = self.next();
        self.generations.insert(key.clone(), generation);
        if self.in_flight.remove(key).is_some() {
            debug!(key = %key, "Superseded in-flight fetch");
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    fetches: AtomicU64,
    joined: AtomicU64,
    discarded: AtomicU64,
    invalidations: AtomicU64,
}

/// Snapshot of cache activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a fresh stored value.
    pub hits: u64,
    /// Remote fetches started.
    pub fetches: u64,
    /// Reads that joined a fetch already in flight.
    pub joined: u64,
    /// Completed fetches dropped because an invalidation superseded them.
    pub discarded: u64,
    /// Keys marked stale.
    pub invalidations: u64,
}

impl DomainCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let store = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .build();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let prune_threshold = usize::try_from(config.max_capacity)
            .unwrap_or(usize::MAX)
            .saturating_add(GENERATION_SLACK);

        Self {
            inner: Arc::new(DomainCacheInner {
                store,
                state: Mutex::new(CacheState::default()),
                events,
                counters: Counters::default(),
                prune_threshold,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current_generation(&self, key: &CacheKey) -> u64 {
        self.lock_state().generation_of(key)
    }

    /// Number of keys with a tracked generation.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock_state().generations.len()
    }

    /// Forget generations of keys with neither a stored value nor a live
    /// fetch, once the table outgrows the store's capacity.
    async fn prune(&self) {
        if self.tracked_keys() <= self.inner.prune_threshold {
            return;
        }
        self.inner.store.run_pending_tasks().await;

        let mut state = self.lock_state();
        let before = state.generations.len();
        let CacheState {
            generations,
            in_flight,
            ..
        } = &mut *state;
        in_flight.retain(|_, pending| pending.fetch.upgrade().is_some());
        generations
            .retain(|key, _| in_flight.contains_key(key) || self.inner.store.contains_key(key));
        debug!(
            forgotten = before - generations.len(),
            "Pruned generation table"
        );
    }

    fn publish(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Return the stored value for `key` if present and fresh, without
    /// fetching.
    pub async fn peek(&self, key: &CacheKey) -> Option<CacheValue> {
        let entry = self.inner.store.get(key).await?;
        (entry.generation == self.current_generation(key)).then_some(entry.value)
    }

    /// Read `key`, fetching with `fetch` when it is missing or stale.
    ///
    /// # Errors
    ///
    /// Returns the fetch error. Errors are never cached.
    #[instrument(skip(self, fetch), fields(key = %key))]
    pub async fn read<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<CacheValue, ClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CacheValue, ClientError>> + Send + 'static,
    {
        self.prune().await;
        loop {
            if let Some(value) = self.peek(key).await {
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit");
                return Ok(value);
            }

            let (generation, pending) = {
                let mut state = self.lock_state();
                let generation = state.generation_of(key);
                let joined = state
                    .in_flight
                    .get(key)
                    .filter(|in_flight| in_flight.generation == generation)
                    .and_then(|in_flight| in_flight.fetch.upgrade());

                if let Some(pending) = joined {
                    self.inner.counters.joined.fetch_add(1, Ordering::Relaxed);
                    debug!("Joined in-flight fetch");
                    (generation, pending)
                } else {
                    let pending = self.start_fetch(key, generation, fetch());
                    if let Some(weak) = pending.downgrade() {
                        state.in_flight.insert(
                            key.clone(),
                            InFlight {
                                generation,
                                fetch: weak,
                            },
                        );
                    }
                    self.inner.counters.fetches.fetch_add(1, Ordering::Relaxed);
                    debug!(generation, "Cache miss, fetching");
                    (generation, pending)
                }
            };

            let outcome = pending.await;

            if self.current_generation(key) != generation {
                self.inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
                debug!(generation, "Discarding superseded fetch");
                continue;
            }
            return outcome;
        }
    }

    /// Wrap a remote fetch so that its result is stored, and announced,
    /// before any reader observes it.
    fn start_fetch<Fut>(&self, key: &CacheKey, generation: u64, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = Result<CacheValue, ClientError>> + Send + 'static,
    {
        let cache = self.clone();
        let key = key.clone();
        async move {
            let outcome = fetch.await;
            cache.complete(&key, generation, &outcome).await;
            outcome
        }
        .boxed()
        .shared()
    }

    async fn complete(
        &self,
        key: &CacheKey,
        generation: u64,
        outcome: &Result<CacheValue, ClientError>,
    ) {
        let current = self.current_generation(key) == generation;
        match outcome {
            Ok(value) if current => {
                self.inner
                    .store
                    .insert(
                        key.clone(),
                        Entry {
                            generation,
                            value: value.clone(),
                        },
                    )
                    .await;
                self.publish(CacheEvent::Refreshed(key.clone()));
            }
            Ok(_) => debug!(key = %key, generation, "Fetch completed after invalidation"),
            Err(err) => debug!(key = %key, error = %err, "Fetch failed"),
        }

        let mut state = self.lock_state();
        if state
            .in_flight
            .get(key)
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            state.in_flight.remove(key);
        }
    }

    /// Mark `keys`, and every key they cover, as stale.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        let affected: Vec<CacheKey> = {
            let mut state = self.lock_state();
            for root in keys {
                state.generation_of(root);
            }
            let affected: Vec<CacheKey> = state
                .generations
                .keys()
                .filter(|tracked| keys.iter().any(|root| root.covers(tracked)))
                .cloned()
                .collect();
            for key in &affected {
                state.bump(key);
            }
            affected
        };

        self.inner
            .counters
            .invalidations
            .fetch_add(affected.len() as u64, Ordering::Relaxed);

        for key in affected {
            self.inner.store.invalidate(&key).await;
            debug!(key = %key, "Invalidated");
            self.publish(CacheEvent::Invalidated(key));
        }
    }

    /// Run a remote write, then invalidate `affected` if it succeeded.
    ///
    /// # Errors
    ///
    /// Returns the operation's error; the cache is left untouched.
    pub async fn mutate<T, Fut>(
        &self,
        operation: Fut,
        affected: &[CacheKey],
    ) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let output = operation.await?;
        self.invalidate(affected).await;
        Ok(output)
    }

    /// Drop every entry and every in-flight fetch.
    ///
    /// Keys seen after this get fresh generations, so fetches started
    /// before it are discarded when they complete.
    pub fn clear(&self) {
        {
            let mut state = self.lock_state();
            state.generations.clear();
            state.in_flight.clear();
        }
        self.inner.store.invalidate_all();
        debug!("Cache cleared");
        self.publish(CacheEvent::Cleared);
    }

    /// Subscribe to every cache event.
    #[must_use]
    pub fn subscribe(&self) -> CacheSubscription {
        CacheSubscription::new(self.inner.events.subscribe(), None)
    }

    /// Subscribe to events that affect `key`.
    #[must_use]
    pub fn subscribe_to(&self, key: CacheKey) -> CacheSubscription {
        CacheSubscription::new(self.inner.events.subscribe(), Some(key))
    }

    /// Snapshot of activity counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            fetches: c.fetches.load(Ordering::Relaxed),
            joined: c.joined.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;

    fn cache() -> DomainCache {
        DomainCache::new(&CacheConfig::default())
    }

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: bool,
    ) -> impl Fn() -> BoxFuture<'static, Result<CacheValue, ClientError>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(CacheValue::Flag(value)) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_second_read_is_a_hit() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = counting_fetch(&calls, true);

        cache.read(&CacheKey::IsAdmin, &fetch).await.unwrap();
        let value = cache.read(&CacheKey::IsAdmin, &fetch).await.unwrap();

        assert_eq!(value, CacheValue::Flag(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let fetch = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok(CacheValue::Flag(true))
                }
            }
        };

        let release = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate.notify_one();
        };
        let (a, b, c, ()) = tokio::join!(
            cache.read(&CacheKey::IsAdmin, &fetch),
            cache.read(&CacheKey::IsAdmin, &fetch),
            cache.read(&CacheKey::IsAdmin, &fetch),
            release,
        );

        assert_eq!(a.unwrap(), CacheValue::Flag(true));
        assert_eq!(b.unwrap(), CacheValue::Flag(true));
        assert_eq!(c.unwrap(), CacheValue::Flag(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().joined, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = counting_fetch(&calls, false);

        cache.read(&CacheKey::Inquiries, &fetch).await.unwrap();
        cache.invalidate(&[CacheKey::Inquiries]).await;
        cache.read(&CacheKey::Inquiries, &fetch).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_products_invalidation_reaches_derived_keys() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = counting_fetch(&calls, true);
        let tools = CacheKey::ProductsByCategory("Tools".into());

        cache.read(&tools, &fetch).await.unwrap();
        cache.read(&CacheKey::Categories, &fetch).await.unwrap();
        cache.invalidate(&[CacheKey::Products]).await;

        assert!(cache.peek(&tools).await.is_none());
        assert!(cache.peek(&CacheKey::Categories).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = cache();
        let failing = || async { Err::<CacheValue, _>(ClientError::Transport("reset".into())) };

        let err = cache.read(&CacheKey::Cart, failing).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(cache.peek(&CacheKey::Cart).await.is_none());

        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .read(&CacheKey::Cart, counting_fetch(&calls, true))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_untouched() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .read(&CacheKey::Products, counting_fetch(&calls, true))
            .await
            .unwrap();

        let result: Result<(), _> = cache
            .mutate(
                async { Err(ClientError::Unauthorized("Only admins".into())) },
                &[CacheKey::Products],
            )
            .await;

        assert!(matches!(result, Err(ClientError::Unauthorized(_))));
        assert!(cache.peek(&CacheKey::Products).await.is_some());
        assert_eq!(cache.stats().invalidations, 0);
    }

    #[tokio::test]
    async fn test_superseded_fetch_is_discarded() {
        let cache = cache();
        let gate = Arc::new(Notify::new());
        let version = Arc::new(AtomicUsize::new(0));

        // Each fetch captures the version current when it starts, then
        // waits for the gate.
        let fetch = {
            let gate = Arc::clone(&gate);
            let version = Arc::clone(&version);
            move || {
                let seen = version.load(Ordering::SeqCst);
                let gate = Arc::clone(&gate);
                async move {
                    if seen == 0 {
                        gate.notified().await;
                    }
                    Ok(CacheValue::Flag(seen > 0))
                }
            }
        };

        let writer = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            version.store(1, Ordering::SeqCst);
            cache.invalidate(&[CacheKey::IsAdmin]).await;
            gate.notify_one();
        };
        let (value, ()) = tokio::join!(cache.read(&CacheKey::IsAdmin, &fetch), writer);

        assert_eq!(value.unwrap(), CacheValue::Flag(true));
        assert_eq!(cache.stats().discarded, 1);
        assert_eq!(
            cache.peek(&CacheKey::IsAdmin).await,
            Some(CacheValue::Flag(true))
        );
    }

    #[tokio::test]
    async fn test_dropped_reader_cancels_fetch_without_poisoning() {
        let cache = cache();
        let never = || futures::future::pending::<Result<CacheValue, ClientError>>();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), cache.read(&CacheKey::Cart, never))
                .await;
        assert!(abandoned.is_err());

        let calls = Arc::new(AtomicUsize::new(0));
        let value = cache
            .read(&CacheKey::Cart, counting_fetch(&calls, false))
            .await
            .unwrap();
        assert_eq!(value, CacheValue::Flag(false));
    }

    #[tokio::test]
    async fn test_subscribers_observe_invalidation_and_refresh() {
        let cache = cache();
        let mut products = cache.subscribe_to(CacheKey::Products);
        let mut inquiries = cache.subscribe_to(CacheKey::Inquiries);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .read(&CacheKey::Products, counting_fetch(&calls, true))
            .await
            .unwrap();
        cache.invalidate(&[CacheKey::Products]).await;

        assert_eq!(
            products.try_recv(),
            Some(CacheEvent::Refreshed(CacheKey::Products))
        );
        assert_eq!(
            products.try_recv(),
            Some(CacheEvent::Invalidated(CacheKey::Products))
        );
        assert_eq!(inquiries.try_recv(), None);
    }

    #[tokio::test]
    async fn test_clear_discards_everything() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = counting_fetch(&calls, true);
        cache.read(&CacheKey::IsAdmin, &fetch).await.unwrap();
        let mut events = cache.subscribe();

        cache.clear();

        assert!(cache.peek(&CacheKey::IsAdmin).await.is_none());
        assert_eq!(events.try_recv(), Some(CacheEvent::Cleared));
    }

    #[tokio::test]
    async fn test_generation_table_stays_bounded() {
        let cache = DomainCache::new(&CacheConfig {
            max_capacity: 10,
            ..CacheConfig::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = counting_fetch(&calls, true);

        for i in 0..5000 {
            let key = CacheKey::ProductsSearch(format!("term-{i}"));
            cache.read(&key, &fetch).await.unwrap();
            assert!(cache.tracked_keys() <= 10 + GENERATION_SLACK + 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5000);

        cache.clear();
        assert_eq!(cache.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_fetch_started_before_clear_is_discarded() {
        let cache = cache();
        let gate = Arc::new(Notify::new());
        let cleared = Arc::new(AtomicUsize::new(0));

        let fetch = {
            let gate = Arc::clone(&gate);
            let cleared = Arc::clone(&cleared);
            move || {
                let after_clear = cleared.load(Ordering::SeqCst) > 0;
                let gate = Arc::clone(&gate);
                async move {
                    if !after_clear {
                        gate.notified().await;
                    }
                    Ok(CacheValue::Flag(after_clear))
                }
            }
        };

        let session_change = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cleared.store(1, Ordering::SeqCst);
            cache.clear();
            gate.notify_one();
        };
        let (value, ()) = tokio::join!(cache.read(&CacheKey::IsAdmin, &fetch), session_change);

        assert_eq!(value.unwrap(), CacheValue::Flag(true));
        assert_eq!(cache.stats().discarded, 1);
    }
}
