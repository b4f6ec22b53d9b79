use std::{
    mem,
    time::{
        Duration,
        Instant,
    },
};

use prometheus::HistogramVec;

use crate::{
    get_desc,
    log_distribution_with_labels,
    MetricLabel,
};

/// Records the time between construction and drop into a labeled histogram.
pub struct Timer {
    start: Instant,
    histogram: &'static HistogramVec,
    labels: Vec<MetricLabel>,
}

impl Timer {
    pub fn new(histogram: &'static HistogramVec) -> Self {
        Self {
            start: Instant::now(),
            histogram,
            labels: Vec::new(),
        }
    }

    pub fn add_label(&mut self, label: MetricLabel) {
        self.labels.retain(|l| l.key != label.key);
        self.labels.push(label);
    }

    pub fn replace_label(&mut self, old_label: MetricLabel, new_label: MetricLabel) {
        self.labels.retain(|l| *l != old_label);
        self.add_label(new_label);
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let elapsed_duration = self.start.elapsed();
        let desc = get_desc(self.histogram);
        tracing::debug!("{elapsed_duration:?} for timer {desc:?} {:?}", self.labels);
        let labels = mem::take(&mut self.labels);
        log_distribution_with_labels(self.histogram, elapsed_duration.as_secs_f64(), labels);
    }
}

/// Status timer that defaults to error unless `.finish()` is explicitly called
/// upon success.
#[derive(derive_more::Deref, derive_more::DerefMut)]
pub struct StatusTimer(Timer);

impl StatusTimer {
    pub fn new(histogram: &'static HistogramVec) -> Self {
        let mut timer = Timer::new(histogram);
        timer.add_label(MetricLabel::STATUS_ERROR);
        Self(timer)
    }

    /// Finish the timer with status success
    pub fn finish(mut self) -> Duration {
        self.0
            .replace_label(MetricLabel::STATUS_ERROR, MetricLabel::STATUS_SUCCESS);
        self.0.elapsed()
    }

    /// Finish the timer with the given status, usually an error's
    /// `metric_status_label_value()`.
    pub fn finish_with(mut self, status: &'static str) -> Duration {
        self.0.replace_label(
            MetricLabel::STATUS_ERROR,
            MetricLabel::new_const("status", status),
        );
        self.0.elapsed()
    }
}

/// Timer that defaults to CANCELED, but switches to
/// ERROR/SUCCESS once you call .finish()
#[derive(derive_more::Deref, derive_more::DerefMut)]
pub struct CancelableTimer(Timer);

impl CancelableTimer {
    pub fn new(histogram: &'static HistogramVec) -> Self {
        let mut timer = Timer::new(histogram);
        timer.add_label(MetricLabel::STATUS_CANCELED);
        Self(timer)
    }

    pub fn finish(mut self, is_ok: bool) -> Duration {
        self.0
            .replace_label(MetricLabel::STATUS_CANCELED, MetricLabel::status(is_ok));
        self.0.elapsed()
    }
}
