use std::collections::BTreeMap;

use chrono::{
    DateTime,
    Utc,
};
pub use cloudwatch::TagSet;

/// Datapoints of one series, ordered by time.
pub type Series = BTreeMap<DateTime<Utc>, f64>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesResult {
    pub series: Series,
    pub group: TagSet,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Results {
    pub results: Vec<SeriesResult>,
}
