use anyhow::Context;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_cloudwatch::{
    config::{
        http::HttpResponse,
        Builder as CloudWatchConfigBuilder,
    },
    error::SdkError,
    operation::get_metric_data::{
        builders::GetMetricDataFluentBuilder,
        GetMetricDataError,
        GetMetricDataOutput,
    },
    Client,
};
use aws_smithy_types_convert::stream::PaginationStreamExt;
use futures::TryStreamExt;

use crate::{
    config_loader_for_profile,
    CLOUDWATCH_ENDPOINT_URL,
};

pub type GetMetricDataSdkError = SdkError<GetMetricDataError, HttpResponse>;

#[derive(Clone, Debug)]
pub struct CloudWatchClient(pub Client);

impl CloudWatchClient {
    /// Build a client for `region` with credentials from `profile`.
    ///
    /// Credentials are resolved eagerly so that a missing or broken profile
    /// fails here rather than on the first query.
    pub async fn new(profile: &str, region: &str) -> anyhow::Result<Self> {
        let base_config = config_loader_for_profile(profile, region).load().await;
        let provider = base_config
            .credentials_provider()
            .with_context(|| format!("No credentials provider for profile {profile:?}"))?;
        provider
            .provide_credentials()
            .await
            .with_context(|| format!("Failed to load credentials for profile {profile:?}"))?;

        let mut config_builder = CloudWatchConfigBuilder::from(&base_config);
        if let Some(endpoint_url) = CLOUDWATCH_ENDPOINT_URL.clone() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        tracing::debug!("Created CloudWatch client for profile {profile:?} in {region}");
        Ok(Self(Client::from_conf(config_builder.build())))
    }

    /// Send a `GetMetricData` call, following `NextToken` until every page
    /// has been read.
    pub async fn get_metric_data_pages(
        &self,
        request: GetMetricDataFluentBuilder,
    ) -> Result<Vec<GetMetricDataOutput>, GetMetricDataSdkError> {
        request
            .into_paginator()
            .send()
            .into_stream_03x()
            .try_collect()
            .await
    }
}
