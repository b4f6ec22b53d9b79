use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_cloudwatch::{
    error::DisplayErrorContext,
    primitives::DateTime as AwsDateTime,
    types::{
        Dimension as AwsDimension,
        Metric,
        MetricDataQuery as AwsMetricDataQuery,
        MetricStat,
    },
};
use aws_smithy_types_convert::date_time::DateTimeExt;
use aws_utils::cloudwatch::{
    CloudWatchClient,
    GetMetricDataSdkError,
};
use errors::BackendError;

use crate::{
    CloudWatchApi,
    MetricDataInput,
    MetricDataOutput,
    MetricDataQuery,
    MetricDataResult,
    SessionProvider,
    SERVICE,
};

/// [`CloudWatchApi`] backed by the AWS SDK.
#[derive(Clone, Debug)]
pub struct AwsCloudWatch(CloudWatchClient);

impl AwsCloudWatch {
    pub fn new(client: CloudWatchClient) -> Self {
        Self(client)
    }
}

/// Creates [`AwsCloudWatch`] sessions from the shared AWS config.
#[derive(Clone, Copy, Debug, Default)]
pub struct AwsSessionProvider;

#[async_trait]
impl SessionProvider for AwsSessionProvider {
    async fn new_session(
        &self,
        profile: &str,
        region: &str,
    ) -> anyhow::Result<Arc<dyn CloudWatchApi>> {
        let client = CloudWatchClient::new(profile, region).await?;
        Ok(Arc::new(AwsCloudWatch::new(client)))
    }
}

fn to_aws_query(query: MetricDataQuery) -> anyhow::Result<AwsMetricDataQuery> {
    let mut metric = Metric::builder()
        .namespace(query.namespace)
        .metric_name(query.metric);
    for dimension in query.dimensions {
        metric = metric.dimensions(
            AwsDimension::builder()
                .name(dimension.name())
                .value(dimension.value())
                .build(),
        );
    }
    let stat = MetricStat::builder()
        .metric(metric.build())
        .period(query.period)
        .stat(query.stat)
        .build();
    Ok(AwsMetricDataQuery::builder()
        .id(query.id)
        .metric_stat(stat)
        .return_data(true)
        .build())
}

fn backend_error(e: GetMetricDataSdkError) -> anyhow::Error {
    let status = e.raw_response().map(|r| r.status().as_u16());
    BackendError::new(SERVICE, status, DisplayErrorContext(&e).to_string()).into_anyhow()
}

#[async_trait]
impl CloudWatchApi for AwsCloudWatch {
    async fn get_metric_data(&self, input: MetricDataInput) -> anyhow::Result<MetricDataOutput> {
        let CloudWatchClient(client) = &self.0;
        let mut request = client
            .get_metric_data()
            .start_time(AwsDateTime::from_chrono_utc(input.start))
            .end_time(AwsDateTime::from_chrono_utc(input.end));
        for query in input.queries {
            request = request.metric_data_queries(to_aws_query(query)?);
        }
        let pages = self
            .0
            .get_metric_data_pages(request)
            .await
            .map_err(backend_error)?;

        // Datapoints for one id may be split across pages.
        let mut results: Vec<MetricDataResult> = Vec::new();
        for page in pages {
            for result in page.metric_data_results() {
                let id = result.id().unwrap_or_default();
                let position = match results.iter().position(|r| r.id == id) {
                    Some(position) => position,
                    None => {
                        results.push(MetricDataResult {
                            id: id.to_owned(),
                            label: result.label().map(str::to_owned),
                            ..Default::default()
                        });
                        results.len() - 1
                    },
                };
                let merged = &mut results[position];
                for timestamp in result.timestamps() {
                    merged.timestamps.push(
                        timestamp
                            .to_chrono_utc()
                            .context("CloudWatch returned an out of range timestamp")?,
                    );
                }
                merged.values.extend_from_slice(result.values());
            }
        }
        Ok(MetricDataOutput { results })
    }
}
