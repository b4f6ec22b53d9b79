use std::time::Duration;

use metrics::{
    log_counter_with_labels,
    log_distribution_with_labels,
    log_gauge_with_labels,
    register_federation_counter,
    register_federation_gauge,
    register_federation_histogram,
    CancelableTimer,
    MetricLabel,
    StatusTimer,
    STATUS_LABEL,
};

pub const ASYNC_LRU_LABEL: &str = "label";
fn async_lru_label(label: &'static str) -> MetricLabel {
    MetricLabel::new_const(ASYNC_LRU_LABEL, label)
}

register_federation_counter!(
    ASYNC_LRU_CACHE_HIT_TOTAL,
    "Count of requests which had a result ready in the async lru cache",
    &[ASYNC_LRU_LABEL],
);
pub fn log_async_lru_cache_hit(label: &'static str) {
    log_counter_with_labels(&ASYNC_LRU_CACHE_HIT_TOTAL, 1, vec![async_lru_label(label)]);
}

register_federation_counter!(
    ASYNC_LRU_CACHE_WAITING_TOTAL,
    "Count of requests which waited on a result to become ready in the async lru cache",
    &[ASYNC_LRU_LABEL],
);
pub fn log_async_lru_cache_waiting(label: &'static str) {
    log_counter_with_labels(
        &ASYNC_LRU_CACHE_WAITING_TOTAL,
        1,
        vec![async_lru_label(label)],
    );
}

register_federation_counter!(
    ASYNC_LRU_CACHE_MISS_TOTAL,
    "Count of requests which had to load data as the async lru cache missed",
    &[ASYNC_LRU_LABEL],
);
pub fn log_async_lru_cache_miss(label: &'static str) {
    log_counter_with_labels(&ASYNC_LRU_CACHE_MISS_TOTAL, 1, vec![async_lru_label(label)]);
}

register_federation_gauge!(
    ASYNC_LRU_ENTRIES_TOTAL,
    "Number of entries in an async LRU",
    &[ASYNC_LRU_LABEL],
);
register_federation_gauge!(
    ASYNC_LRU_SIZE_TOTAL,
    "Sum of the sizes of the entries in an async LRU",
    &[ASYNC_LRU_LABEL],
);
pub fn log_async_lru_size(entries: usize, size: u64, label: &'static str) {
    log_gauge_with_labels(
        &ASYNC_LRU_ENTRIES_TOTAL,
        entries as f64,
        vec![async_lru_label(label)],
    );
    log_gauge_with_labels(&ASYNC_LRU_SIZE_TOTAL, size as f64, vec![async_lru_label(label)]);
}

register_federation_histogram!(
    ASYNC_LRU_EVICTION_AGE_SECONDS,
    "Age of async lru entries at the time they are evicted",
    &[ASYNC_LRU_LABEL],
);
pub fn async_lru_log_eviction(label: &'static str, age: Duration) {
    log_distribution_with_labels(
        &ASYNC_LRU_EVICTION_AGE_SECONDS,
        age.as_secs_f64(),
        vec![async_lru_label(label)],
    );
}

register_federation_histogram!(
    ASYNC_LRU_COMPUTE_SECONDS,
    "Time to compute an arbitrary value in async lru",
    &[STATUS_LABEL[0], ASYNC_LRU_LABEL],
);
pub fn async_lru_compute_timer(label: &'static str) -> StatusTimer {
    let mut timer = StatusTimer::new(&ASYNC_LRU_COMPUTE_SECONDS);
    timer.add_label(async_lru_label(label));
    timer
}

register_federation_histogram!(
    ASYNC_LRU_GET_SECONDS,
    "Time taken for the async lru to obtain a value, including both cached and not cached results.",
    &[STATUS_LABEL[0], ASYNC_LRU_LABEL],
);
pub fn async_lru_get_timer(label: &'static str) -> CancelableTimer {
    let mut timer = CancelableTimer::new(&ASYNC_LRU_GET_SECONDS);
    timer.add_label(async_lru_label(label));
    timer
}
