//! A size-bounded, single-flight async LRU cache.
mod async_lru;
mod metrics;

pub use crate::async_lru::{
    AsyncLru,
    CacheStatus,
    SingleValueGenerator,
    SizedValue,
};
