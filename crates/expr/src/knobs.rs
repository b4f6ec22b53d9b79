//! Tunable limits for the CloudWatch query path.
//!
//! Each knob can be overridden with an environment variable of the same name.
#![deny(missing_docs)]

use std::{
    sync::LazyLock,
    time::Duration,
};

use cmd_util::env::env_config;

/// Budget of the CloudWatch response cache, in datapoints.
pub static CLOUDWATCH_CACHE_MAX_SIZE: LazyLock<u64> =
    LazyLock::new(|| env_config("CLOUDWATCH_CACHE_MAX_SIZE", 1_000_000));

/// Upper bound on a whole CloudWatch query, all retries and sleeps included.
pub static CLOUDWATCH_QUERY_TIMEOUT: LazyLock<Duration> =
    LazyLock::new(|| Duration::from_secs(env_config("CLOUDWATCH_QUERY_TIMEOUT", 60)));

/// How many times a transient CloudWatch failure is retried.
pub static CLOUDWATCH_MAX_RETRIES: LazyLock<u32> =
    LazyLock::new(|| env_config("CLOUDWATCH_MAX_RETRIES", 3));

/// Scales the jitter window of each retry. Window for attempt `n` is
/// `factor * ((2 << n) - 1)` seconds.
pub static CLOUDWATCH_BACKOFF_FACTOR: LazyLock<f64> =
    LazyLock::new(|| env_config("CLOUDWATCH_BACKOFF_FACTOR", 2.0));

/// Cap on a single retry delay, in milliseconds.
pub static CLOUDWATCH_MAX_BACKOFF_MILLIS: LazyLock<u64> =
    LazyLock::new(|| env_config("CLOUDWATCH_MAX_BACKOFF_MILLIS", 30_000));
