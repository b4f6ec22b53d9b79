use async_trait::async_trait;

use crate::Dimension;

/// A query whose dimension groups contain wildcard values, to be expanded
/// into concrete groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupRequest {
    pub region: String,
    pub namespace: String,
    pub metric: String,
    pub dimensions: Vec<Vec<Dimension>>,
    pub profile: String,
}

/// Expands wildcard dimensions into the concrete dimension groups that
/// currently have data. An empty result means nothing matched.
#[async_trait]
pub trait DimensionResolver: Send + Sync {
    async fn lookup_dimensions(&self, request: &LookupRequest)
        -> anyhow::Result<Vec<Vec<Dimension>>>;
}
