//! Index names for date-partitioned Elasticsearch clusters.
mod indexer;

pub use crate::indexer::{
    CrossClusterIndexer,
    DailyIndexer,
    EsIndexer,
    IndexNameGenerator,
    StaticIndexer,
    WeeklyIndexer,
};
