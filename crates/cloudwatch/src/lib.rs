//! Structures for querying CloudWatch metrics: the request model and its
//! cache key, per-profile sessions, and the context that runs a request.
mod client;
mod context;
mod dimension;
mod lookup;
mod metrics;
mod request;
mod response;
mod session;

pub use crate::{
    client::{
        AwsCloudWatch,
        AwsSessionProvider,
    },
    context::{
        QueryContext,
        QUERY_ID,
    },
    dimension::Dimension,
    lookup::{
        DimensionResolver,
        LookupRequest,
    },
    request::{
        Request,
        RequestParams,
    },
    response::{
        MetricDataInput,
        MetricDataOutput,
        MetricDataQuery,
        MetricDataResult,
        Response,
        TagSet,
    },
    session::{
        CloudWatchApi,
        SessionCache,
        SessionKey,
        SessionProvider,
    },
};

/// Service name used when reporting backend errors.
pub const SERVICE: &str = "cloudwatch";
