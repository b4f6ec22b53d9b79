use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use cloudwatch::{
    AwsSessionProvider,
    Dimension,
    DimensionResolver,
    LookupRequest,
    QueryContext,
};
use cmd_util::env::config_tool;
use errors::ErrorMetadata;
use expr::{
    new_response_cache,
    CloudWatchQuerier,
    EvaluationState,
};

/// Run one CloudWatch query and print the resulting series.
#[derive(Parser, Debug)]
struct Args {
    /// AWS profile, or "default" for the default credential chain
    #[clap(long, default_value = "default", env = "AWS_PROFILE")]
    profile: String,

    #[clap(long, env = "AWS_REGION")]
    region: String,

    #[clap(long)]
    namespace: String,

    #[clap(long)]
    metric: String,

    /// Aggregation period, e.g. `60` or `5m`
    #[clap(long, default_value = "60")]
    period: String,

    #[clap(long, default_value = "Average")]
    statistic: String,

    /// Comma separated `name:value` dimensions
    #[clap(long, default_value = "")]
    dimensions: String,

    /// How long ago the query starts, e.g. `1h`
    #[clap(long, default_value = "1h")]
    start: String,

    /// How long ago the query ends. Defaults to now.
    #[clap(long)]
    end: Option<String>,
}

/// Wildcard expansion needs a metric listing backend this tool doesn't have.
struct NoWildcards;

#[async_trait]
impl DimensionResolver for NoWildcards {
    async fn lookup_dimensions(
        &self,
        _request: &LookupRequest,
    ) -> anyhow::Result<Vec<Vec<Dimension>>> {
        anyhow::bail!(ErrorMetadata::bad_request(
            "WildcardUnsupported",
            "Wildcard dimensions are not supported by this tool",
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = config_tool();
    let args = Args::parse();

    let context = Arc::new(QueryContext::new(Arc::new(AwsSessionProvider)));
    let querier = CloudWatchQuerier::new(
        context,
        Arc::new(new_response_cache()),
        Arc::new(NoWildcards),
    );
    let mut state = EvaluationState::new(Utc::now());
    let results = querier
        .query(
            &mut state,
            &args.profile,
            &args.region,
            &args.namespace,
            &args.metric,
            &args.period,
            &args.statistic,
            &args.dimensions,
            &args.start,
            args.end.as_deref(),
        )
        .await?;

    for timing in state.timings() {
        tracing::info!("{}/{} took {:?}", timing.category, timing.operation, timing.duration);
    }
    if results.results.is_empty() {
        println!("No datapoints");
    }
    for result in results.results {
        let tags: Vec<_> = result.group.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("{{{}}}", tags.join(","));
        for (timestamp, value) in result.series {
            println!("  {} {value}", timestamp.to_rfc3339());
        }
    }
    Ok(())
}
