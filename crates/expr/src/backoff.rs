use std::{
    cmp,
    time::Duration,
};

use errors::ErrorMetadataAnyhowExt;
use rand::Rng;

use crate::knobs::{
    CLOUDWATCH_BACKOFF_FACTOR,
    CLOUDWATCH_MAX_BACKOFF_MILLIS,
    CLOUDWATCH_MAX_RETRIES,
};

/// True if `e` is a backend failure worth retrying: throttling (429) or a
/// server error other than 501 Not Implemented.
pub fn should_retry(e: &anyhow::Error) -> bool {
    match e.backend_status() {
        Some(429) => true,
        Some(status) => (500..600).contains(&status) && status != 501,
        None => false,
    }
}

/// Jittered exponential backoff for one logical request. Use a fresh
/// instance per request.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    max_retries: u32,
    backoff_factor: f64,
    max_delay_millis: u64,
    attempt: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(3, 2.0, 30_000)
    }
}

impl ExponentialBackoff {
    pub fn new(max_retries: u32, backoff_factor: f64, max_delay_millis: u64) -> Self {
        Self {
            max_retries,
            backoff_factor,
            max_delay_millis,
            attempt: 0,
        }
    }

    /// Configured from the `CLOUDWATCH_*` backoff knobs.
    pub fn from_knobs() -> Self {
        Self::new(
            *CLOUDWATCH_MAX_RETRIES,
            *CLOUDWATCH_BACKOFF_FACTOR,
            *CLOUDWATCH_MAX_BACKOFF_MILLIS,
        )
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next retry, or an error once `max_retries` delays
    /// have been handed out.
    ///
    /// The delay is a whole number of seconds drawn uniformly from
    /// `[0, factor * ((2 << attempt) - 1))`, capped at `max_delay_millis`.
    pub fn next_delay(&mut self, rng: &mut impl Rng) -> anyhow::Result<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt > self.max_retries {
            anyhow::bail!("retries exhausted after {} attempts", self.max_retries);
        }
        let window = (2u64 << cmp::min(self.attempt, 32)) - 1;
        let max_jitter = (self.backoff_factor as u64).saturating_mul(window);
        let jitter_secs = if max_jitter == 0 {
            0
        } else {
            rng.random_range(0..max_jitter)
        };
        let delay_millis = cmp::min(self.max_delay_millis, jitter_secs.saturating_mul(1000));
        Ok(Duration::from_millis(delay_millis))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use errors::BackendError;
    use rand::{
        rngs::StdRng,
        SeedableRng,
    };

    use super::{
        should_retry,
        ExponentialBackoff,
    };

    fn status_error(status: Option<u16>) -> anyhow::Error {
        BackendError::new("cloudwatch", status, "failed").into_anyhow()
    }

    #[test]
    fn test_should_retry_transient_statuses() {
        for status in [429, 500, 502, 503, 599] {
            assert!(should_retry(&status_error(Some(status))), "{status}");
        }
    }

    #[test]
    fn test_should_not_retry_other_errors() {
        for status in [None, Some(200), Some(400), Some(403), Some(404), Some(501)] {
            assert!(!should_retry(&status_error(status)), "{status:?}");
        }
        assert!(!should_retry(&anyhow::anyhow!("plain failure")));
    }

    #[test]
    fn test_should_retry_through_context() {
        let err = status_error(Some(503)).context("while querying CloudWatch");
        assert!(should_retry(&err));
    }

    #[test]
    fn test_exhausted_after_max_retries() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut backoff = ExponentialBackoff::default();
        for _ in 0..3 {
            backoff.next_delay(&mut rng).unwrap();
        }
        let err = backoff.next_delay(&mut rng).unwrap_err();
        assert!(err.to_string().contains("retries exhausted"));
        assert!(backoff.next_delay(&mut rng).is_err());
    }

    #[test]
    fn test_delays_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let mut backoff = ExponentialBackoff::default();
            for attempt in 1..=3u32 {
                let delay = backoff.next_delay(&mut rng).unwrap();
                let window_secs = 2 * ((2u64 << attempt) - 1);
                assert!(delay <= Duration::from_millis(30_000));
                assert!(delay < Duration::from_secs(window_secs));
                assert_eq!(delay.subsec_millis(), 0);
            }
        }
    }

    #[test]
    fn test_delay_capped() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut backoff = ExponentialBackoff::new(10, 100.0, 1_500);
        for _ in 0..10 {
            assert!(backoff.next_delay(&mut rng).unwrap() <= Duration::from_millis(1_500));
        }
    }

    #[test]
    fn test_zero_factor_never_sleeps() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut backoff = ExponentialBackoff::new(2, 0.0, 1_500);
        assert_eq!(backoff.next_delay(&mut rng).unwrap(), Duration::ZERO);
    }
}
