//! Stale-while-revalidate cache for rendered snapshots.
//!
//! A [`RevalidatingCache`] holds one snapshot per key:
//!
//! - a fresh entry (`age < ttl`) is returned without calling the producer;
//! - a stale entry is returned immediately and at most one background
//!   regeneration is started for it;
//! - a missing entry is produced synchronously, and concurrent callers for the
//!   same key share that single production.
//!
//! Background failures never reach a caller: the stale snapshot keeps being
//! served and the failure is logged. A regeneration that outlives
//! `regeneration_timeout` is abandoned and its mark cleared, so a later read
//! can start a new one.

mod config;

pub use config::{CacheConfig, CacheSettings};

use serde::Serialize;
use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    future::Future,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::{
    sync::{Mutex, RwLock},
    time::{Duration, Instant, error::Elapsed},
};
use tracing::{debug, info, warn};

pub struct RevalidatingCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for RevalidatingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<K, V> {
    name: &'static str,
    config: CacheConfig,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    fills: Mutex<HashMap<K, Arc<Mutex<()>>>>,
    next_token: AtomicU64,
    counters: Counters,
}

struct CacheEntry<V> {
    snapshot: V,
    rendered_at: Instant,
    ttl: Duration,
    regeneration: Option<Regeneration>,
}

#[derive(Clone, Copy)]
struct Regeneration {
    token: u64,
    started: Instant,
}

impl<V> CacheEntry<V> {
    fn new(snapshot: V, ttl: Duration) -> Self {
        Self {
            snapshot,
            rendered_at: Instant::now(),
            ttl,
            regeneration: None,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.rendered_at) < self.ttl
    }

    fn is_regenerating(&self, now: Instant, timeout: Duration) -> bool {
        match self.regeneration {
            Some(regeneration) => now.saturating_duration_since(regeneration.started) < timeout,
            None => false,
        }
    }
}

#[derive(Default)]
struct Counters {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    regenerations: AtomicU64,
    regeneration_failures: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub regenerations: u64,
    pub regeneration_failures: u64,
    pub evictions: u64,
}

enum Lookup<V> {
    Fresh(V),
    Stale { snapshot: V, regenerate: Option<u64> },
    Miss,
}

impl<K, V> RevalidatingCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                config,
                entries: RwLock::new(HashMap::new()),
                fills: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the snapshot for `key`, calling `producer` only on a miss or
    /// in the background for a stale entry.
    ///
    /// Only a miss can fail; a stale entry is always served.
    pub async fn get<F, Fut, E>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: From<Elapsed> + Display + Send + 'static,
    {
        match self.lookup(&key).await {
            Lookup::Fresh(snapshot) => {
                self.inner.counters.fresh_hits.fetch_add(1, Ordering::Relaxed);
                Ok(snapshot)
            }
            Lookup::Stale {
                snapshot,
                regenerate,
            } => {
                self.inner.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                if let Some(token) = regenerate {
                    self.spawn_regeneration(key, token, producer);
                }
                Ok(snapshot)
            }
            Lookup::Miss => self.fill(key, producer).await,
        }
    }

    async fn lookup(&self, key: &K) -> Lookup<V> {
        let now = Instant::now();
        let timeout = self.inner.config.regeneration_timeout;

        {
            let entries = self.inner.entries.read().await;
            match entries.get(key) {
                None => return Lookup::Miss,
                Some(entry) if entry.is_fresh(now) => {
                    return Lookup::Fresh(entry.snapshot.clone());
                }
                Some(entry) if entry.is_regenerating(now, timeout) => {
                    return Lookup::Stale {
                        snapshot: entry.snapshot.clone(),
                        regenerate: None,
                    };
                }
                Some(_) => {}
            }
        }

        // Stale and idle: re-check under the write lock before claiming the
        // regeneration so only one reader wins.
        let mut entries = self.inner.entries.write().await;
        let Some(entry) = entries.get_mut(key) else {
            return Lookup::Miss;
        };

        if entry.is_fresh(now) {
            return Lookup::Fresh(entry.snapshot.clone());
        }

        if entry.is_regenerating(now, timeout) {
            return Lookup::Stale {
                snapshot: entry.snapshot.clone(),
                regenerate: None,
            };
        }

        if entry.regeneration.is_some() {
            warn!(
                "{} cache: regeneration of {:?} exceeded {:?}, clearing",
                self.inner.name, key, timeout
            );
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        entry.regeneration = Some(Regeneration {
            token,
            started: now,
        });

        Lookup::Stale {
            snapshot: entry.snapshot.clone(),
            regenerate: Some(token),
        }
    }

    fn spawn_regeneration<F, Fut, E>(&self, key: K, token: u64, producer: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: From<Elapsed> + Display + Send + 'static,
    {
        let inner = self.inner.clone();

        debug!("{} cache: regenerating {:?} in background", inner.name, key);

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(inner.config.regeneration_timeout, producer()).await;

            let mut entries = inner.entries.write().await;
            let Some(entry) = entries.get_mut(&key) else {
                debug!(
                    "{} cache: {:?} was evicted during regeneration, discarding result",
                    inner.name, key
                );
                return;
            };

            if entry.regeneration.map(|regeneration| regeneration.token) != Some(token) {
                debug!(
                    "{} cache: regeneration of {:?} was superseded, discarding result",
                    inner.name, key
                );
                return;
            }

            entry.regeneration = None;

            match outcome {
                Ok(Ok(snapshot)) => {
                    entry.snapshot = snapshot;
                    entry.rendered_at = Instant::now();
                    inner.counters.regenerations.fetch_add(1, Ordering::Relaxed);
                    debug!("{} cache: regenerated {:?}", inner.name, key);
                }
                Ok(Err(e)) => {
                    inner
                        .counters
                        .regeneration_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "{} cache: background regeneration of {:?} failed, serving stale snapshot: {}",
                        inner.name, key, e
                    );
                }
                Err(_) => {
                    inner
                        .counters
                        .regeneration_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "{} cache: background regeneration of {:?} timed out after {:?}",
                        inner.name, key, inner.config.regeneration_timeout
                    );
                }
            }
        });
    }

    async fn fill<F, Fut, E>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: From<Elapsed> + Display + Send + 'static,
    {
        let fill_lock = {
            let mut fills = self.inner.fills.lock().await;
            fills.entry(key.clone()).or_default().clone()
        };

        let result = {
            let _guard = fill_lock.lock().await;

            let existing = self
                .inner
                .entries
                .read()
                .await
                .get(&key)
                .map(|entry| (entry.snapshot.clone(), entry.is_fresh(Instant::now())));

            match existing {
                Some((snapshot, fresh)) => {
                    // Filled by the caller we waited on. A stale fill is left
                    // for the next reader to regenerate.
                    let counter = if fresh {
                        &self.inner.counters.fresh_hits
                    } else {
                        &self.inner.counters.stale_hits
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok(snapshot)
                }
                None => {
                    self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                    debug!("{} cache: miss for {:?}", self.inner.name, key);

                    let outcome =
                        match tokio::time::timeout(self.inner.config.regeneration_timeout, producer())
                            .await
                        {
                            Ok(outcome) => outcome,
                            Err(elapsed) => Err(E::from(elapsed)),
                        };

                    if let Ok(snapshot) = &outcome {
                        self.store(key.clone(), snapshot.clone()).await;
                    }
                    outcome
                }
            }
        };

        let mut fills = self.inner.fills.lock().await;
        // Only the map and this call hold the lock: nobody is waiting on it.
        if fills
            .get(&key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &fill_lock) && Arc::strong_count(lock) == 2)
        {
            fills.remove(&key);
        }

        result
    }

    async fn store(&self, key: K, snapshot: V) {
        let mut entries = self.inner.entries.write().await;
        let capacity = self.inner.config.capacity.max(1);

        // Idle entries go first, oldest render first. When every entry is
        // regenerating the oldest is evicted anyway and its regeneration
        // result is discarded.
        if !entries.contains_key(&key) && entries.len() >= capacity {
            let now = Instant::now();
            let timeout = self.inner.config.regeneration_timeout;
            let victim = entries
                .iter()
                .min_by_key(|(_, entry)| (entry.is_regenerating(now, timeout), entry.rendered_at))
                .map(|(victim, _)| victim.clone());

            if let Some(victim) = victim {
                entries.remove(&victim);
                self.inner.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("{} cache: evicted {:?}", self.inner.name, victim);
            }
        }

        entries.insert(key, CacheEntry::new(snapshot, self.inner.config.ttl));
    }

    /// Drops the entry for `key`. An in-flight regeneration for it is
    /// discarded when it completes.
    pub async fn invalidate(&self, key: &K) -> bool {
        let removed = self.inner.entries.write().await.remove(key).is_some();
        if removed {
            info!("{} cache: invalidated {:?}", self.inner.name, key);
        }
        removed
    }

    pub async fn invalidate_all(&self) -> usize {
        let mut entries = self.inner.entries.write().await;
        let count = entries.len();
        entries.clear();
        info!("{} cache: invalidated {} entries", self.inner.name, count);
        count
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.inner.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            entries: self.len().await,
            fresh_hits: counters.fresh_hits.load(Ordering::Relaxed),
            stale_hits: counters.stale_hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            regenerations: counters.regenerations.load(Ordering::Relaxed),
            regeneration_failures: counters.regeneration_failures.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
        }
    }
}
