use core::hash::Hash;
use std::{
    fmt::Debug,
    sync::Arc,
    time::Instant,
};

use async_broadcast::Receiver as BroadcastReceiver;
use errors::recapture_error;
use futures::future::BoxFuture;
use lru::LruCache;
use parking_lot::Mutex;

use crate::metrics::{
    async_lru_compute_timer,
    async_lru_get_timer,
    async_lru_log_eviction,
    log_async_lru_cache_hit,
    log_async_lru_cache_miss,
    log_async_lru_cache_waiting,
    log_async_lru_size,
};

/// A write through cache with support for cancelation.
///
/// Use this over a plain LruCache when you're in an asynchronous context, you
/// may have multiple concurrent requests for the same key and value generation
/// is relatively expensive. Values are calculated exactly once per key while
/// they are cached or in flight, and every requestor waiting on that key is
/// notified when the single calculation finishes.
///
/// Cancelation is handled by computing values on a spawned task. Callers wait
/// asynchronously for the calculation to complete and are notified via a
/// broadcast channel, so any individual caller can be canceled without
/// canceling the calculation other waiters depend on.
///
/// Failed calculations are not cached: the next request for the key starts a
/// new one.
pub struct AsyncLru<Key, Value> {
    inner: Arc<Mutex<Inner<Key, Value>>>,
    label: &'static str,
}

pub type SingleValueGenerator<Value> = BoxFuture<'static, anyhow::Result<Value>>;

impl<Key, Value> Clone for AsyncLru<Key, Value> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            label: self.label,
        }
    }
}

/// How a `get` was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The value was ready in the cache.
    Hit,
    /// Another request was already computing the value; we waited for it.
    Waited,
    /// This request kicked off the computation.
    Miss,
}

impl CacheStatus {
    /// True when this request didn't trigger a computation of its own.
    pub fn is_hit(&self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

type BuildValueResult<Value> = Result<Arc<Value>, Arc<anyhow::Error>>;

enum CacheResult<Value> {
    Ready {
        value: Arc<Value>,
        // Memoize the size to guard against implementations of `SizedValue`
        // that (unexpectedly) change while the value is in the cache.
        size: u64,
        added: Instant,
    },
    Waiting {
        receiver: BroadcastReceiver<BuildValueResult<Value>>,
        generation: u64,
    },
}

impl<Value> CacheResult<Value> {
    fn size(&self) -> u64 {
        match self {
            CacheResult::Ready { size, .. } => *size,
            CacheResult::Waiting { .. } => 0,
        }
    }
}

struct Inner<Key, Value> {
    cache: LruCache<Key, CacheResult<Value>>,
    current_size: u64,
    max_size: u64,
    label: &'static str,
    // Tags each `Waiting` entry with the computation that owns it.
    next_generation: u64,
}

pub trait SizedValue {
    fn size(&self) -> u64;
}

impl<Value: SizedValue> SizedValue for Arc<Value> {
    fn size(&self) -> u64 {
        Value::size(self)
    }
}

enum Status<Value> {
    Ready(Arc<Value>),
    Waiting(BroadcastReceiver<BuildValueResult<Value>>, u64),
    Kickoff(BroadcastReceiver<BuildValueResult<Value>>, u64),
}

impl<Key, Value> AsyncLru<Key, Value>
where
    Key: Hash + Eq + Debug + Clone + Send + Sync + 'static,
    Value: SizedValue + Send + Sync + 'static,
{
    /// Create a new fixed size LRU where the maximum size is determined by
    /// `max_size` and the size of each entry is determined by the
    /// implementation of `SizedValue` for the corresponding value.
    ///
    /// label - a string for logging to differentiate between LRUs.
    pub fn new(max_size: u64, label: &'static str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                cache: LruCache::unbounded(),
                current_size: 0,
                max_size,
                label,
                next_generation: 0,
            })),
            label,
        }
    }

    pub fn size(&self) -> u64 {
        self.inner.lock().current_size
    }

    pub fn len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn get(
        &self,
        key: Key,
        value_generator: SingleValueGenerator<Value>,
    ) -> anyhow::Result<Arc<Value>> {
        self.get_with_status(key, value_generator).await.0
    }

    /// Like `get`, but also reports whether the value came out of the cache.
    pub async fn get_with_status(
        &self,
        key: Key,
        value_generator: SingleValueGenerator<Value>,
    ) -> (anyhow::Result<Arc<Value>>, CacheStatus) {
        let timer = async_lru_get_timer(self.label);
        let (result, status) = match self.get_sync(&key, value_generator) {
            Status::Ready(value) => (Ok(value), CacheStatus::Hit),
            Status::Waiting(rx, generation) => (
                Self::wait_for_value(&self.inner, &key, rx, generation).await,
                CacheStatus::Waited,
            ),
            Status::Kickoff(rx, generation) => (
                Self::wait_for_value(&self.inner, &key, rx, generation).await,
                CacheStatus::Miss,
            ),
        };
        timer.finish(result.is_ok());
        (result, status)
    }

    fn get_sync(&self, key: &Key, value_generator: SingleValueGenerator<Value>) -> Status<Value> {
        let mut inner = self.inner.lock();
        log_async_lru_size(inner.cache.len(), inner.current_size, self.label);
        match inner.cache.get(key) {
            Some(CacheResult::Ready { value, .. }) => {
                log_async_lru_cache_hit(self.label);
                Status::Ready(value.clone())
            },
            Some(CacheResult::Waiting {
                receiver,
                generation,
            }) => {
                log_async_lru_cache_waiting(self.label);
                Status::Waiting(receiver.clone(), *generation)
            },
            None => {
                log_async_lru_cache_miss(self.label);
                let (tx, rx) = async_broadcast::broadcast(1);
                let generation = inner.next_generation;
                inner.next_generation += 1;
                inner.cache.put(
                    key.clone(),
                    CacheResult::Waiting {
                        receiver: rx.clone(),
                        generation,
                    },
                );
                drop(inner);

                let inner = self.inner.clone();
                let key = key.clone();
                let label = self.label;
                tokio::spawn(async move {
                    let timer = async_lru_compute_timer(label);
                    let value = value_generator.await;
                    let is_ok = value.is_ok();
                    let to_broadcast =
                        Self::update_value(&inner, key, generation, value).map_err(Arc::new);
                    if is_ok {
                        timer.finish();
                    }
                    // Every waiter may have been canceled, which is fine.
                    let _ = tx.broadcast(to_broadcast).await;
                });
                Status::Kickoff(rx, generation)
            },
        }
    }

    fn waiting_generation(inner: &Inner<Key, Value>, key: &Key) -> Option<u64> {
        match inner.cache.peek(key) {
            Some(CacheResult::Waiting { generation, .. }) => Some(*generation),
            _ => None,
        }
    }

    /// Remove the `Waiting` entry for `key` only if `generation` owns it.
    fn drop_waiting(inner: &mut Inner<Key, Value>, key: &Key, generation: u64) {
        if Self::waiting_generation(inner, key) == Some(generation) {
            inner.cache.pop(key);
        }
    }

    fn update_value(
        inner: &Mutex<Inner<Key, Value>>,
        key: Key,
        generation: u64,
        value: anyhow::Result<Value>,
    ) -> anyhow::Result<Arc<Value>> {
        let mut inner = inner.lock();
        match value {
            Ok(value) => {
                let result = Arc::new(value);
                if matches!(Self::waiting_generation(&inner, &key), Some(g) if g != generation) {
                    // A newer computation owns the key now; let it fill the entry.
                    return Ok(result);
                }
                let new_value = CacheResult::Ready {
                    size: result.size(),
                    value: result.clone(),
                    added: Instant::now(),
                };
                inner.current_size += new_value.size();
                if let Some(old_value) = inner.cache.put(key, new_value) {
                    inner.current_size -= old_value.size();
                }
                Self::trim_to_size(&mut inner);
                Ok(result)
            },
            Err(e) => {
                Self::drop_waiting(&mut inner, &key, generation);
                Err(e)
            },
        }
    }

    /// Evict ready values, least recently used first, until the cache fits.
    /// In-flight entries are never evicted since that would let a second
    /// computation for their key start.
    fn trim_to_size(inner: &mut Inner<Key, Value>) {
        while inner.current_size > inner.max_size {
            let Some(key) = inner
                .cache
                .iter()
                .rev()
                .find(|(_, entry)| matches!(entry, CacheResult::Ready { .. }))
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            let Some(evicted) = inner.cache.pop(&key) else {
                break;
            };
            if let CacheResult::Ready {
                ref value,
                size,
                added,
            } = evicted
            {
                if size != value.size() {
                    tracing::warn!(
                        "Value changed size from {} to {} while in the {} cache!",
                        size,
                        value.size(),
                        inner.label
                    )
                }
                async_lru_log_eviction(inner.label, added.elapsed());
            }
            inner.current_size -= evicted.size();
        }
    }

    async fn wait_for_value(
        inner: &Mutex<Inner<Key, Value>>,
        key: &Key,
        mut receiver: BroadcastReceiver<BuildValueResult<Value>>,
        generation: u64,
    ) -> anyhow::Result<Arc<Value>> {
        let recv_result = match receiver.recv().await {
            Ok(result) => result,
            Err(e) => {
                // The computing task went away without reporting (e.g. it
                // panicked). Let the next request start over.
                Self::drop_waiting(&mut inner.lock(), key, generation);
                return Err(anyhow::anyhow!(e).context(format!(
                    "Value computation for {key:?} ended without a result"
                )));
            },
        };
        match recv_result {
            Ok(value) => {
                tracing::debug!("Finished waiting on the computation of key {key:?}");
                Ok(value)
            },
            Err(e) => Err(recapture_error(&e)),
        }
    }
}
