use std::time::Duration;

use chrono::{
    DateTime,
    Utc,
};
use cloudwatch::Request;

/// A timed step of an evaluation, kept for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct StepTiming {
    pub category: &'static str,
    pub operation: &'static str,
    pub detail: String,
    pub duration: Duration,
}

/// Per-evaluation state: the instant relative offsets are measured from and
/// a log of what the evaluation did.
#[derive(Debug)]
pub struct EvaluationState {
    now: DateTime<Utc>,
    cloudwatch_queries: Vec<Request>,
    timings: Vec<StepTiming>,
}

impl EvaluationState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            cloudwatch_queries: Vec::new(),
            timings: Vec::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn cloudwatch_queries(&self) -> &[Request] {
        &self.cloudwatch_queries
    }

    pub fn timings(&self) -> &[StepTiming] {
        &self.timings
    }

    pub(crate) fn record_cloudwatch_query(&mut self, request: Request) {
        self.cloudwatch_queries.push(request);
    }

    pub(crate) fn record_timing(
        &mut self,
        category: &'static str,
        operation: &'static str,
        detail: String,
        duration: Duration,
    ) {
        self.timings.push(StepTiming {
            category,
            operation,
            detail,
            duration,
        });
    }
}
