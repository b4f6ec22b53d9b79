//! Common functions for metrics logging.
//!
//! We follow [Prometheus's conventions](https://prometheus.io/docs/practices/naming/) for metrics
//! names. In particular,
//!
//! 1. Metrics may only contain alphanumerics and underscores.
//! 2. Metrics are automatically prefixed with `SERVICE_NAME`.
//! 3. Suffix metrics with their units (e.g. `_seconds`, `_bytes`, `_total`).
//!    See `ALLOWED_SUFFIXES` for more detail.
//! 4. Use seconds for time and bytes for data. Use `_total` for unit-less
//!    counts.
//!
//! Within a crate, all metrics code goes in a `metrics` module whose interface
//! is high level ("this event happened") rather than logging an `f64` to a
//! particular metric name.
use std::{
    borrow::Cow,
    collections::HashSet,
    env,
    ops::Deref,
    sync::LazyLock,
};

use parking_lot::RwLock;
use prometheus::Registry;

use crate::{
    log_counter_with_labels,
    register_federation_counter,
    MetricLabel,
};

const ALLOWED_SUFFIXES: &[&str] = &[
    // Always use `_seconds` for time.
    "_seconds",
    // Always use `_bytes` for data lengths.
    "_bytes",
    // Query units.
    "_queries",
    "_datapoints",
    "_series",
    // Networking units.
    "_requests",
    "_timeouts",
    "_sessions",
    "_retries",
    // Caching units.
    "_hits",
    "_misses",
    "_evictions",
    // General units.
    "_errors",
    "_operations",
    // Use `_total` as a generic unit-less count that doesn't fit into a unit above.
    "_total",
    // Use `_info` as a generic unit-less gauge that doesn't fit into a unit above.
    "_info",
];

/// Use executable name to identify service name.
pub static SERVICE_NAME: LazyLock<String> = LazyLock::new(|| {
    env::current_exe()
        .ok()
        .and_then(|path| path.file_name()?.to_str().map(|s| s.replace('-', "_")))
        .unwrap_or_else(|| "federation".to_owned())
});

pub static FEDERATION_METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let labels = env::var("FEDERATION_SITE").ok().map(|instance_name| {
        [("instance_name".to_owned(), instance_name)]
            .into_iter()
            .collect()
    });
    Registry::new_custom(Some(SERVICE_NAME.clone()), labels)
        .expect("Failed to initialize Prometheus metrics registry")
});

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MetricName(Cow<'static, str>);

impl MetricName {
    pub const fn new(name: &'static str) -> Self {
        validate_metric_name(name);
        Self(Cow::Borrowed(name))
    }
}

impl Deref for MetricName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0[..]
    }
}

const fn ends_with(s: &[u8], suffix: &[u8]) -> bool {
    if s.len() < suffix.len() {
        return false;
    }
    let s_base = s.len() - suffix.len();
    let mut i = 0;
    while i < suffix.len() {
        if s[s_base + i] != suffix[i] {
            return false;
        }
        i += 1;
    }
    true
}

const fn validate_metric_name(name: &str) {
    let name_bytes = name.as_bytes();

    let mut i = 0;
    while i < name_bytes.len() {
        let c = name_bytes[i];
        if !(c.is_ascii_alphanumeric() || c == b'_') {
            panic!("Metric names can only contain alphanumeric characters and underscores");
        }
        i += 1;
    }

    let mut i = 0;
    let mut found_suffix = false;
    while i < ALLOWED_SUFFIXES.len() {
        if ends_with(name_bytes, ALLOWED_SUFFIXES[i].as_bytes()) {
            found_suffix = true;
            break;
        }
        i += 1;
    }
    if !found_suffix {
        panic!(
            "Metric names must end with their units as a suffix (e.g. `_seconds`, `_bytes`, \
             `_total`)"
        );
    }
}

// Use a macro to force metric name validation to happen at compile time.
#[macro_export]
macro_rules! metric_name {
    ($name: expr) => {{
        use $crate::MetricName;
        const METRIC_NAME: MetricName = MetricName::new($name);
        METRIC_NAME
    }};
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetricHelp(&'static str);

impl MetricHelp {
    pub const fn new(help_str: &'static str) -> Self {
        if help_str.is_empty() {
            panic!("Metric help strings must be nonempty");
        }
        Self(help_str)
    }
}

impl Deref for MetricHelp {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

#[macro_export]
macro_rules! metric_help {
    ($help: literal) => {{
        use $crate::MetricHelp;
        const METRIC_HELP: MetricHelp = MetricHelp::new($help);
        METRIC_HELP
    }};
}

register_federation_counter!(
    INVALID_METRIC_TOTAL,
    "Count of metrics that failed to be reported",
    &["metric_name"]
);

// Only log a given metric failure once, it could easily grow out of proportion
// if we push a bad metric on a hot path.
static METRICS_ERROR_ONCE: LazyLock<RwLock<HashSet<String>>> = LazyLock::new(Default::default);

/// Metrics are best effort: a failure to record is counted and logged, never
/// surfaced to the caller (outside of tests).
pub fn log_invalid_metric(name: String, error: prometheus::Error) {
    log_counter_with_labels(
        &INVALID_METRIC_TOTAL,
        1,
        vec![MetricLabel::new("metric_name", name.clone())],
    );
    if METRICS_ERROR_ONCE.read().contains(&name) {
        return;
    }
    if METRICS_ERROR_ONCE.write().insert(name.clone()) {
        let msg = format!("Failed to record metric {name:?}: {error}");
        if cfg!(any(test, feature = "testing")) {
            panic!("{msg}");
        }
        let err = anyhow::anyhow!(error).context(msg);
        tracing::error!("{:?}", err);
    }
}
