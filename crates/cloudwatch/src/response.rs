use std::collections::{
    BTreeMap,
    HashMap,
};

use async_lru::SizedValue;
use chrono::{
    DateTime,
    Utc,
};

use crate::Dimension;

pub type TagSet = BTreeMap<String, String>;

/// One metric-data query within a `GetMetricData` call.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricDataQuery {
    /// Opaque id used to match results back to this query.
    pub id: String,
    pub namespace: String,
    pub metric: String,
    pub dimensions: Vec<Dimension>,
    pub period: i32,
    pub stat: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricDataInput {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub queries: Vec<MetricDataQuery>,
}

/// Datapoints for one query id. `timestamps[i]` pairs with `values[i]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricDataResult {
    pub id: String,
    pub label: Option<String>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricDataOutput {
    pub results: Vec<MetricDataResult>,
}

/// Raw backend output plus the tags for each query id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    pub raw: MetricDataOutput,
    pub tag_sets: HashMap<String, TagSet>,
}

impl SizedValue for Response {
    /// Datapoint count, so the cache budget tracks response volume. Empty
    /// responses still occupy one slot.
    fn size(&self) -> u64 {
        let datapoints: usize = self.raw.results.iter().map(|r| r.timestamps.len()).sum();
        (datapoints as u64).max(1)
    }
}
