use metrics::{
    log_gauge,
    register_federation_gauge,
    register_federation_histogram,
    StatusTimer,
    STATUS_LABEL,
};

register_federation_gauge!(
    CLOUDWATCH_SESSIONS,
    "Number of cached CloudWatch sessions"
);
pub fn log_session_count(count: usize) {
    log_gauge(&CLOUDWATCH_SESSIONS, count as f64);
}

register_federation_histogram!(
    CLOUDWATCH_SESSION_CREATE_SECONDS,
    "Time to create a CloudWatch session, including credential resolution",
    &STATUS_LABEL
);
pub fn session_create_timer() -> StatusTimer {
    StatusTimer::new(&CLOUDWATCH_SESSION_CREATE_SECONDS)
}
