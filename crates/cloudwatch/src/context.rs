use std::{
    collections::HashMap,
    sync::Arc,
};

use errors::ErrorMetadata;

use crate::{
    MetricDataInput,
    MetricDataQuery,
    Request,
    Response,
    SessionCache,
    SessionProvider,
    TagSet,
};

/// Id of the single metric-data query issued per request.
pub const QUERY_ID: &str = "q0";

/// Runs [`Request`]s against CloudWatch through cached sessions. Does not
/// cache responses or retry.
pub struct QueryContext {
    sessions: SessionCache,
}

impl QueryContext {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            sessions: SessionCache::new(provider),
        }
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub async fn query(&self, request: &Request) -> anyhow::Result<Response> {
        let api = self
            .sessions
            .get_session(request.profile(), request.region())
            .await?;

        let Ok(period) = i32::try_from(request.period()) else {
            anyhow::bail!(ErrorMetadata::bad_request(
                "InvalidPeriod",
                format!("Period of {}s is too long", request.period()),
            ));
        };
        let input = MetricDataInput {
            start: request.start(),
            end: request.end(),
            queries: vec![MetricDataQuery {
                id: QUERY_ID.to_owned(),
                namespace: request.namespace().to_owned(),
                metric: request.metric().to_owned(),
                dimensions: request.dimensions().to_vec(),
                period,
                stat: request.statistic().to_owned(),
            }],
        };
        let raw = match api.get_metric_data(input).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(
                    "CloudWatch query for {}/{} failed: {e:#}",
                    request.namespace(),
                    request.metric()
                );
                return Err(e);
            },
        };

        let tags: TagSet = request
            .dimensions()
            .iter()
            .map(|d| (d.name().to_owned(), d.value().to_owned()))
            .collect();
        Ok(Response {
            raw,
            tag_sets: HashMap::from([(QUERY_ID.to_owned(), tags)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{
        TimeZone,
        Utc,
    };
    use errors::{
        BackendError,
        ErrorMetadataAnyhowExt,
    };
    use parking_lot::Mutex;

    use super::{
        QueryContext,
        QUERY_ID,
    };
    use crate::{
        CloudWatchApi,
        Dimension,
        MetricDataInput,
        MetricDataOutput,
        MetricDataResult,
        Request,
        RequestParams,
        SessionProvider,
    };

    /// Records inputs and answers with a fixed result, or fails with `status`.
    struct FakeApi {
        inputs: Mutex<Vec<MetricDataInput>>,
        status: Option<u16>,
    }

    #[async_trait]
    impl CloudWatchApi for FakeApi {
        async fn get_metric_data(&self, input: MetricDataInput) -> anyhow::Result<MetricDataOutput> {
            let id = input.queries[0].id.clone();
            let start = input.start;
            self.inputs.lock().push(input);
            if let Some(status) = self.status {
                return Err(BackendError::new("cloudwatch", Some(status), "denied").into_anyhow());
            }
            Ok(MetricDataOutput {
                results: vec![MetricDataResult {
                    id,
                    label: None,
                    timestamps: vec![start],
                    values: vec![1.5],
                }],
            })
        }
    }

    struct FakeProvider(Arc<FakeApi>);

    #[async_trait]
    impl SessionProvider for FakeProvider {
        async fn new_session(
            &self,
            _profile: &str,
            _region: &str,
        ) -> anyhow::Result<Arc<dyn CloudWatchApi>> {
            Ok(self.0.clone())
        }
    }

    fn fake(status: Option<u16>) -> Arc<FakeApi> {
        Arc::new(FakeApi {
            inputs: Mutex::new(vec![]),
            status,
        })
    }

    fn request() -> anyhow::Result<Request> {
        Request::new(RequestParams {
            start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap(),
            region: "us-east-1".to_owned(),
            namespace: "AWS/ELB".to_owned(),
            metric: "RequestCount".to_owned(),
            period: 300,
            statistic: "Sum".to_owned(),
            dimensions: vec![
                Dimension::new("LoadBalancerName", "web"),
                Dimension::new("AvailabilityZone", "us-east-1a"),
            ],
            profile: "default".to_owned(),
        })
    }

    #[tokio::test]
    async fn test_query_builds_single_metric_query() -> anyhow::Result<()> {
        let api = fake(None);
        let context = QueryContext::new(Arc::new(FakeProvider(api.clone())));
        let request = request()?;
        let response = context.query(&request).await?;

        let inputs = api.inputs.lock();
        assert_eq!(inputs.len(), 1);
        let query = &inputs[0].queries[0];
        assert_eq!(query.id, QUERY_ID);
        assert_eq!(query.period, 300);
        assert_eq!(query.stat, "Sum");
        assert_eq!(query.dimensions, request.dimensions());
        assert_eq!(inputs[0].start, request.start());
        assert_eq!(inputs[0].end, request.end());

        assert_eq!(response.raw.results.len(), 1);
        let tags = &response.tag_sets[QUERY_ID];
        assert_eq!(tags["LoadBalancerName"], "web");
        assert_eq!(tags["AvailabilityZone"], "us-east-1a");
        Ok(())
    }

    #[tokio::test]
    async fn test_query_returns_backend_error_unmodified() -> anyhow::Result<()> {
        let context = QueryContext::new(Arc::new(FakeProvider(fake(Some(403)))));
        let err = context.query(&request()?).await.unwrap_err();
        assert_eq!(err.backend_status(), Some(403));
        assert!(err.is_forbidden());
        Ok(())
    }

    #[tokio::test]
    async fn test_query_reuses_session() -> anyhow::Result<()> {
        let context = QueryContext::new(Arc::new(FakeProvider(fake(None))));
        context.query(&request()?).await?;
        context.query(&request()?).await?;
        assert_eq!(context.sessions().len().await, 1);
        Ok(())
    }
}
