use std::sync::Arc;

use async_lru::AsyncLru;
use async_trait::async_trait;
use cloudwatch::Response;
use futures::future::BoxFuture;

use crate::knobs::CLOUDWATCH_CACHE_MAX_SIZE;

pub type ResponseGenerator = BoxFuture<'static, anyhow::Result<Response>>;

/// Memoizes CloudWatch responses by cache key.
///
/// Implementations run at most one `compute` per key at a time and report
/// whether the value was served without running `compute` for this caller.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(
        &self,
        key: String,
        compute: ResponseGenerator,
    ) -> (anyhow::Result<Arc<Response>>, bool);
}

#[async_trait]
impl ResponseCache for AsyncLru<String, Response> {
    async fn get(
        &self,
        key: String,
        compute: ResponseGenerator,
    ) -> (anyhow::Result<Arc<Response>>, bool) {
        let (result, status) = self.get_with_status(key, compute).await;
        (result, status.is_hit())
    }
}

/// The response cache, sized by `CLOUDWATCH_CACHE_MAX_SIZE`.
pub fn new_response_cache() -> AsyncLru<String, Response> {
    AsyncLru::new(*CLOUDWATCH_CACHE_MAX_SIZE, "cloudwatch")
}
