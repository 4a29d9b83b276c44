//! Single-use storage for state pending between two browser hops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use async_trait::async_trait;
use log::{debug, trace};
use tokio::runtime;
use tokio::sync::RwLock;
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use crate::constants::STORE_SWEEP_INTERVAL_SECS;


//------------ CorrelationStore ----------------------------------------------

/// Keyed storage of values that are consumed exactly once.
///
/// Implementations must make [`get_and_remove`][Self::get_and_remove]
/// atomic: of any number of concurrent callers for the same key at most
/// one receives the value. Values not consumed within their time-to-live
/// must behave as if they had never been stored.
#[async_trait]
pub trait CorrelationStore<V: Send + 'static>: Send + Sync {
    /// Stores `value` under `key`, replacing whatever was there.
    async fn put(&self, key: String, value: V, ttl: Duration) -> ProxyResult<()>;

    /// Removes the value for `key` and returns it.
    ///
    /// Returns `Ok(None)` if there is no value or if it has expired. The
    /// two cases cannot be told apart.
    async fn get_and_remove(&self, key: &str) -> ProxyResult<Option<V>>;
}


//------------ MemoryStore ---------------------------------------------------

/// An in-process correlation store.
///
/// Expired entries are unreachable as soon as their time is up. Their
/// memory is reclaimed by an async task that is to be spawned onto a Tokio
/// runtime via the [`spawn_sweep`][Self::spawn_sweep] method.
pub struct MemoryStore<V> {
    /// The stored entries.
    entries: Arc<RwLock<HashMap<String, StoredEntry<V>>>>,

    /// A name for the store used in log messages.
    name: &'static str,
}

impl<V> MemoryStore<V> {
    /// Creates a new, empty store.
    pub fn new(name: &'static str) -> Self {
        MemoryStore {
            entries: Arc::new(RwLock::new(HashMap::new())),
            name,
        }
    }

    /// Returns the number of entries, including expired but unswept ones.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns whether the store holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Spawns a tokio task regularly removing expired entries.
    pub fn spawn_sweep(&self, runtime: &runtime::Handle)
    where V: Send + Sync + 'static {
        self.spawn_sweep_with_duration(
            runtime, Duration::from_secs(STORE_SWEEP_INTERVAL_SECS)
        );
    }

    /// Spawns a sweeper task waiting the given duration between sweeps.
    pub fn spawn_sweep_with_duration(
        &self, runtime: &runtime::Handle, duration: Duration,
    )
    where V: Send + Sync + 'static {
        let entries_weak = Arc::downgrade(&self.entries);
        let name = self.name;
        runtime.spawn(async move {
            loop {
                tokio::time::sleep(duration).await;

                let Some(entries) = entries_weak.upgrade() else {
                    // The store is gone, no reason to stay around.
                    break;
                };

                let mut entries = entries.write().await;
                let size_before = entries.len();

                let now = SystemTime::now();
                entries.retain(|_, v| v.evict_after > now);

                let size_after = entries.len();
                if size_after != size_before {
                    debug!(
                        "{name} store purge: \
                         size before={size_before}, size after={size_after}"
                    );
                }
            }
        });
    }
}

#[async_trait]
impl<V: Send + Sync + 'static> CorrelationStore<V> for MemoryStore<V> {
    async fn put(
        &self, key: String, value: V, ttl: Duration
    ) -> ProxyResult<()> {
        let evict_after = SystemTime::now().checked_add(ttl).ok_or_else(|| {
            Error::StoreError(format!(
                "{}: eviction time out of system time bounds", self.name
            ))
        })?;
        trace!("{} store: put entry, ttl {} secs", self.name, ttl.as_secs());
        self.entries.write().await.insert(
            key, StoredEntry { evict_after, value }
        );
        Ok(())
    }

    async fn get_and_remove(&self, key: &str) -> ProxyResult<Option<V>> {
        let Some(entry) = self.entries.write().await.remove(key) else {
            trace!("{} store: no entry for key", self.name);
            return Ok(None)
        };
        if entry.evict_after <= SystemTime::now() {
            trace!("{} store: entry for key has expired", self.name);
            return Ok(None)
        }
        Ok(Some(entry.value))
    }
}


//------------ StoredEntry ---------------------------------------------------

/// A value as kept in the memory store.
struct StoredEntry<V> {
    /// The time after which the value is no longer returned.
    evict_after: SystemTime,

    /// The actual value.
    value: V,
}


//============ Tests =========================================================
