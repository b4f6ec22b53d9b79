use metrics::{
    log_counter,
    log_counter_with_labels,
    register_federation_counter,
    register_federation_histogram,
    IntoLabel,
    MetricLabel,
    StatusTimer,
    STATUS_LABEL,
};

register_federation_counter!(
    pub(crate) CLOUDWATCH_CACHE_REQUESTS_TOTAL,
    "Count of CloudWatch queries, labeled by whether they were served from the cache",
    &["hit"]
);
pub fn log_cloudwatch_cache_request(hit: bool) {
    log_counter_with_labels(
        &CLOUDWATCH_CACHE_REQUESTS_TOTAL,
        1,
        vec![MetricLabel::new("hit", hit.as_label())],
    );
}

register_federation_histogram!(
    CLOUDWATCH_QUERY_SECONDS,
    "Time to answer a CloudWatch query, cache lookup included",
    &STATUS_LABEL
);
pub fn cloudwatch_query_timer() -> StatusTimer {
    StatusTimer::new(&CLOUDWATCH_QUERY_SECONDS)
}

register_federation_counter!(
    CLOUDWATCH_RETRIES_TOTAL,
    "Count of CloudWatch calls retried after a transient failure"
);
pub fn log_cloudwatch_retry() {
    log_counter(&CLOUDWATCH_RETRIES_TOTAL, 1);
}
