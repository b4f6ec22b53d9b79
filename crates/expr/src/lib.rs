//! The CloudWatch query path of the expression layer: parses query
//! arguments, resolves wildcard dimensions, and answers through a response
//! cache with retries.
mod backoff;
mod cache;
mod dimensions;
mod duration;
pub mod knobs;
mod metrics;
mod querier;
mod results;
mod state;

pub use crate::{
    backoff::{
        should_retry,
        ExponentialBackoff,
    },
    cache::{
        new_response_cache,
        ResponseCache,
        ResponseGenerator,
    },
    dimensions::{
        cloudwatch_tag_query,
        has_wildcard,
        parse_dimensions,
    },
    duration::TsdbDuration,
    querier::CloudWatchQuerier,
    results::{
        Results,
        Series,
        SeriesResult,
        TagSet,
    },
    state::{
        EvaluationState,
        StepTiming,
    },
};
