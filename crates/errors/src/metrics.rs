use metrics::{
    log_counter_with_labels,
    register_federation_counter,
    MetricLabel,
};

register_federation_counter!(
    BACKEND_ERRORS_TOTAL,
    "Count of errors returned by external metric backends",
    &["service", "status_class"]
);
pub fn log_backend_error(service: &'static str, status: Option<u16>) {
    let status_class = match status {
        Some(429) => "throttled",
        Some(s) if (400..500).contains(&s) => "4xx",
        Some(s) if (500..600).contains(&s) => "5xx",
        Some(_) => "other",
        None => "none",
    };
    log_counter_with_labels(
        &BACKEND_ERRORS_TOTAL,
        1,
        vec![
            MetricLabel::new("service", service),
            MetricLabel::new("status_class", status_class),
        ],
    );
}
