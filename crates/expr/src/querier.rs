use std::{
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use chrono::TimeDelta;
use cloudwatch::{
    DimensionResolver,
    LookupRequest,
    QueryContext,
    Request,
    RequestParams,
    Response,
};
use errors::{
    ErrorMetadata,
    ErrorMetadataAnyhowExt,
};
use futures::{
    future::join_all,
    FutureExt,
};

use crate::{
    backoff::{
        should_retry,
        ExponentialBackoff,
    },
    dimensions::{
        has_wildcard,
        parse_dimensions,
    },
    duration::TsdbDuration,
    knobs::CLOUDWATCH_QUERY_TIMEOUT,
    metrics::{
        cloudwatch_query_timer,
        log_cloudwatch_cache_request,
        log_cloudwatch_retry,
    },
    results::{
        Results,
        SeriesResult,
    },
    state::EvaluationState,
    ResponseCache,
};

/// Entry point for CloudWatch queries from the expression layer.
pub struct CloudWatchQuerier {
    context: Arc<QueryContext>,
    cache: Arc<dyn ResponseCache>,
    resolver: Arc<dyn DimensionResolver>,
    timeout: Duration,
}

impl CloudWatchQuerier {
    pub fn new(
        context: Arc<QueryContext>,
        cache: Arc<dyn ResponseCache>,
        resolver: Arc<dyn DimensionResolver>,
    ) -> Self {
        Self {
            context,
            cache,
            resolver,
            timeout: *CLOUDWATCH_QUERY_TIMEOUT,
        }
    }

    /// Bound on one backend query including all of its retries.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Query `metric` over `[now - start_offset, now - end_offset]`, one
    /// series per matching dimension group. `end_offset` defaults to now.
    pub async fn query(
        &self,
        state: &mut EvaluationState,
        profile: &str,
        region: &str,
        namespace: &str,
        metric: &str,
        period: &str,
        statistic: &str,
        dimensions: &str,
        start_offset: &str,
        end_offset: Option<&str>,
    ) -> anyhow::Result<Results> {
        let start_ago = start_offset.parse::<TsdbDuration>().map_err(|e| {
            e.context(ErrorMetadata::bad_request(
                "StartParseError",
                "Could not parse the start value",
            ))
        })?;
        let end_ago = match end_offset.map(str::trim) {
            None | Some("") => Duration::ZERO,
            Some(end_offset) => end_offset
                .parse::<TsdbDuration>()
                .map_err(|e| {
                    e.context(ErrorMetadata::bad_request(
                        "EndParseError",
                        "Could not parse the end value",
                    ))
                })?
                .as_duration(),
        };
        let period = parse_period(period)?;

        let mut groups = parse_dimensions(dimensions)?;
        if has_wildcard(dimensions) {
            let lookup = LookupRequest {
                region: region.to_owned(),
                namespace: namespace.to_owned(),
                metric: metric.to_owned(),
                dimensions: groups,
                profile: profile.to_owned(),
            };
            groups = self
                .resolver
                .lookup_dimensions(&lookup)
                .await
                .context("Failed to resolve wildcard dimensions")?;
            if groups.is_empty() {
                anyhow::bail!(ErrorMetadata::not_found(
                    "NoMatchingSeries",
                    "Wildcard dimension did not match any cloudwatch metrics",
                ));
            }
        }

        let start = offset_from(state, start_ago.as_duration())?;
        let end = offset_from(state, end_ago)?;
        let requests = groups
            .into_iter()
            .map(|dimensions| {
                Request::new(RequestParams {
                    start,
                    end,
                    region: region.to_owned(),
                    namespace: namespace.to_owned(),
                    metric: metric.to_owned(),
                    period,
                    statistic: statistic.to_owned(),
                    dimensions,
                    profile: profile.to_owned(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        for request in &requests {
            state.record_cloudwatch_query(request.clone());
        }

        // Every fetch is timed, failed ones included, before any error is
        // surfaced.
        let fetched = join_all(requests.iter().map(|request| self.fetch(request))).await;
        let mut responses = Vec::with_capacity(fetched.len());
        for (request, (response, elapsed)) in requests.iter().zip(fetched) {
            let detail = serde_json::to_string_pretty(request)?;
            state.record_timing("cloudwatch", "query", detail, elapsed);
            responses.push(response);
        }
        let mut results = Results::default();
        for (request, response) in requests.iter().zip(responses) {
            results.results.extend(parse_response(request, &*response?)?);
        }
        Ok(results)
    }

    /// Look `request` up in the cache, computing it on a miss. The elapsed
    /// time is reported whether or not the lookup succeeded.
    async fn fetch(&self, request: &Request) -> (anyhow::Result<Arc<Response>>, Duration) {
        let timer = cloudwatch_query_timer();
        let context = self.context.clone();
        let owned_request = request.clone();
        let timeout = self.timeout;
        let compute =
            async move { query_with_retries(&context, &owned_request, timeout).await }.boxed();

        let (result, hit) = self.cache.get(request.cache_key(), compute).await;
        log_cloudwatch_cache_request(hit);
        match result {
            Ok(response) => (Ok(response), timer.finish()),
            Err(e) => {
                let elapsed = timer.finish_with(e.metric_status_label_value());
                (Err(e), elapsed)
            },
        }
    }
}

fn parse_period(period: &str) -> anyhow::Result<u64> {
    let parsed = TsdbDuration::parse_period(period).map_err(|e| {
        e.context(ErrorMetadata::bad_request(
            "PeriodParseError",
            "Could not parse the period value",
        ))
    })?;
    let seconds = parsed.as_duration().as_secs();
    if seconds == 0 {
        anyhow::bail!(ErrorMetadata::bad_request(
            "PeriodParseError",
            format!("Period {period:?} is shorter than one second"),
        ));
    }
    Ok(seconds)
}

fn offset_from(
    state: &EvaluationState,
    ago: Duration,
) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    TimeDelta::from_std(ago)
        .ok()
        .and_then(|ago| state.now().checked_sub_signed(ago))
        .ok_or_else(|| {
            anyhow::anyhow!(ErrorMetadata::bad_request(
                "InvalidTimeRange",
                format!("{ago:?} before {} is out of range", state.now()),
            ))
        })
}

/// One backend query, retrying transient failures with backoff. The whole
/// loop, sleeps included, is bounded by `timeout`; a timeout carries the last
/// transient error seen, if any.
async fn query_with_retries(
    context: &QueryContext,
    request: &Request,
    timeout: Duration,
) -> anyhow::Result<Response> {
    let mut last_error = None;
    let attempts = async {
        let mut backoff = ExponentialBackoff::from_knobs();
        loop {
            let e = match context.query(request).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            if !should_retry(&e) {
                return Err(e);
            }
            let next_delay = backoff.next_delay(&mut rand::rng());
            let delay = match next_delay {
                Ok(delay) => delay,
                Err(exhausted) => return Err(e.context(exhausted.to_string())),
            };
            log_cloudwatch_retry();
            tracing::warn!(
                "Retrying CloudWatch query for {}/{} in {delay:?} (attempt {}): {e:#}",
                request.namespace(),
                request.metric(),
                backoff.attempts(),
            );
            last_error = Some(e);
            tokio::time::sleep(delay).await;
        }
    };
    let result = tokio::time::timeout(timeout, attempts).await;
    match result {
        Ok(result) => result,
        Err(_) => {
            let timed_out = ErrorMetadata::overloaded(
                "QueryTimeout",
                format!(
                    "CloudWatch query for {}/{} did not finish within {timeout:?}",
                    request.namespace(),
                    request.metric()
                ),
            );
            match last_error {
                Some(e) => Err(e.context(timed_out)),
                None => Err(anyhow::anyhow!(timed_out)),
            }
        },
    }
}

fn parse_response(request: &Request, response: &Response) -> anyhow::Result<Vec<SeriesResult>> {
    let mut results = Vec::new();
    for result in &response.raw.results {
        if result.timestamps.is_empty() {
            continue;
        }
        if result.timestamps.len() != result.values.len() {
            anyhow::bail!(
                "cloudwatch ParseError ({}): series {} has {} timestamps but {} values",
                request.metric(),
                result.id,
                result.timestamps.len(),
                result.values.len()
            );
        }
        let group = response
            .tag_sets
            .get(&result.id)
            .cloned()
            .unwrap_or_default();
        let series = result
            .timestamps
            .iter()
            .copied()
            .zip(result.values.iter().copied())
            .collect();
        results.push(SeriesResult { series, group });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
        },
        time::Duration,
    };

    use async_lru::AsyncLru;
    use async_trait::async_trait;
    use chrono::{
        DateTime,
        TimeZone,
        Utc,
    };
    use cloudwatch::{
        CloudWatchApi,
        Dimension,
        DimensionResolver,
        LookupRequest,
        MetricDataInput,
        MetricDataOutput,
        MetricDataResult,
        QueryContext,
        Response,
        SessionProvider,
    };
    use errors::{
        BackendError,
        ErrorMetadataAnyhowExt,
    };
    use parking_lot::Mutex;

    use super::CloudWatchQuerier;
    use crate::{
        metrics::CLOUDWATCH_CACHE_REQUESTS_TOTAL,
        EvaluationState,
        Results,
    };

    type Shape = fn(&MetricDataInput) -> MetricDataOutput;

    /// Fails with the scripted statuses in order, then answers with `shape`
    /// or keeps failing with `fallback`.
    struct FakeApi {
        calls: AtomicUsize,
        script: Mutex<VecDeque<u16>>,
        fallback: Option<u16>,
        latency: Duration,
        shape: Shape,
    }

    impl FakeApi {
        fn new(shape: Shape) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(VecDeque::new()),
                fallback: None,
                latency: Duration::ZERO,
                shape,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CloudWatchApi for FakeApi {
        async fn get_metric_data(&self, input: MetricDataInput) -> anyhow::Result<MetricDataOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let status = self.script.lock().pop_front().or(self.fallback);
            if let Some(status) = status {
                return Err(
                    BackendError::new("cloudwatch", Some(status), "scripted failure").into_anyhow(),
                );
            }
            Ok((self.shape)(&input))
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

    #[derive(Default)]
    struct FakeResolver {
        groups: Vec<Vec<Dimension>>,
        lookups: Mutex<Vec<LookupRequest>>,
    }

    #[async_trait]
    impl DimensionResolver for FakeResolver {
        async fn lookup_dimensions(
            &self,
            request: &LookupRequest,
        ) -> anyhow::Result<Vec<Vec<Dimension>>> {
            self.lookups.lock().push(request.clone());
            Ok(self.groups.clone())
        }
    }

    fn two_points(input: &MetricDataInput) -> MetricDataOutput {
        let start = input.start;
        MetricDataOutput {
            results: input
                .queries
                .iter()
                .map(|query| MetricDataResult {
                    id: query.id.clone(),
                    label: Some(query.metric.clone()),
                    timestamps: vec![
                        start + chrono::Duration::minutes(1),
                        start + chrono::Duration::minutes(2),
                    ],
                    values: vec![1.0, 2.0],
                })
                .collect(),
        }
    }

    fn no_points(input: &MetricDataInput) -> MetricDataOutput {
        MetricDataOutput {
            results: vec![MetricDataResult {
                id: input.queries[0].id.clone(),
                ..Default::default()
            }],
        }
    }

    fn mismatched(input: &MetricDataInput) -> MetricDataOutput {
        MetricDataOutput {
            results: vec![MetricDataResult {
                id: input.queries[0].id.clone(),
                label: None,
                timestamps: vec![input.start, input.end],
                values: vec![1.0],
            }],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap()
    }

    fn querier(api: Arc<FakeApi>, resolver: Arc<FakeResolver>) -> CloudWatchQuerier {
        let context = Arc::new(QueryContext::new(Arc::new(FakeProvider(api))));
        let cache: Arc<AsyncLru<String, Response>> = Arc::new(AsyncLru::new(1_000, "test"));
        CloudWatchQuerier::new(context, cache, resolver)
    }

    async fn run(
        querier: &CloudWatchQuerier,
        state: &mut EvaluationState,
        dimensions: &str,
    ) -> anyhow::Result<Results> {
        querier
            .query(
                state,
                "default",
                "us-east-1",
                "AWS/EC2",
                "CPUUtilization",
                "60",
                "Average",
                dimensions,
                "1h",
                None,
            )
            .await
    }

    #[tokio::test]
    async fn test_query_parses_tagged_series() -> anyhow::Result<()> {
        cmd_util::env::config_test();
        let api = Arc::new(FakeApi::new(two_points));
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        let mut state = EvaluationState::new(now());

        let results = run(&querier, &mut state, "InstanceId:i-123").await?;
        assert_eq!(results.results.len(), 1);
        let result = &results.results[0];
        assert_eq!(
            result.group.iter().collect::<Vec<_>>(),
            vec![(&"InstanceId".to_owned(), &"i-123".to_owned())]
        );
        let start = now() - chrono::Duration::hours(1);
        assert_eq!(
            result.series.iter().map(|(t, v)| (*t, *v)).collect::<Vec<_>>(),
            vec![
                (start + chrono::Duration::minutes(1), 1.0),
                (start + chrono::Duration::minutes(2), 2.0),
            ]
        );

        let queries = state.cloudwatch_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].start(), start);
        assert_eq!(queries[0].end(), now());
        assert_eq!(queries[0].period(), 60);
        let timings = state.timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].category, "cloudwatch");
        assert_eq!(timings[0].operation, "query");
        assert!(timings[0].detail.contains("CPUUtilization"));
        Ok(())
    }

    #[tokio::test]
    async fn test_query_without_dimensions_has_empty_group() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::new(two_points));
        let querier = querier(api, Arc::new(FakeResolver::default()));
        let results = run(&querier, &mut EvaluationState::new(now()), "").await?;
        assert_eq!(results.results.len(), 1);
        assert!(results.results[0].group.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_end_offset_moves_end() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::new(two_points));
        let querier = querier(api, Arc::new(FakeResolver::default()));
        let mut state = EvaluationState::new(now());
        querier
            .query(
                &mut state,
                "default",
                "us-east-1",
                "AWS/EC2",
                "CPUUtilization",
                "5m",
                "Sum",
                "",
                "2h",
                Some("1h"),
            )
            .await?;
        let request = &state.cloudwatch_queries()[0];
        assert_eq!(request.end(), now() - chrono::Duration::hours(1));
        assert_eq!(request.period(), 300);
        Ok(())
    }

    #[tokio::test]
    async fn test_series_without_timestamps_are_dropped() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::new(no_points));
        let querier = querier(api, Arc::new(FakeResolver::default()));
        let results = run(&querier, &mut EvaluationState::new(now()), "").await?;
        assert!(results.results.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_value_count_mismatch_is_parse_error() {
        let api = Arc::new(FakeApi::new(mismatched));
        let querier = querier(api, Arc::new(FakeResolver::default()));
        let err = run(&querier, &mut EvaluationState::new(now()), "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ParseError"), "{err:#}");
    }

    #[tokio::test]
    async fn test_wildcard_queries_each_resolved_group() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::new(two_points));
        let resolver = Arc::new(FakeResolver {
            groups: vec![
                vec![Dimension::new("InstanceId", "i-1")],
                vec![Dimension::new("InstanceId", "i-2")],
            ],
            ..Default::default()
        });
        let querier = querier(api.clone(), resolver.clone());
        let mut state = EvaluationState::new(now());

        let results = run(&querier, &mut state, "InstanceId:*").await?;
        assert_eq!(api.calls(), 2);
        let ids: Vec<_> = results
            .results
            .iter()
            .map(|r| r.group["InstanceId"].clone())
            .collect();
        assert_eq!(ids, vec!["i-1", "i-2"]);
        assert_eq!(state.cloudwatch_queries().len(), 2);

        let lookups = resolver.lookups.lock();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].dimensions, vec![vec![Dimension::new("InstanceId", "*")]]);
        assert_eq!(lookups[0].profile, "default");
        Ok(())
    }

    #[tokio::test]
    async fn test_wildcard_without_matches_is_not_found() {
        let api = Arc::new(FakeApi::new(two_points));
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        let err = run(&querier, &mut EvaluationState::new(now()), "InstanceId:*")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.short_msg(), "NoMatchingSeries");
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_argument_parse_errors() {
        let api = Arc::new(FakeApi::new(two_points));
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        let cases = [
            ("60", "", "bogus", None, "StartParseError"),
            ("60", "", "1h", Some("soon"), "EndParseError"),
            ("sixty", "", "1h", None, "PeriodParseError"),
            ("0", "", "1h", None, "PeriodParseError"),
            ("500ms", "", "1h", None, "PeriodParseError"),
            ("60", "InstanceId", "1h", None, "DimensionParseError"),
            ("60", "", "1h", Some("2h"), "InvalidTimeRange"),
        ];
        for (period, dimensions, start, end, expected) in cases {
            let err = querier
                .query(
                    &mut EvaluationState::new(now()),
                    "default",
                    "us-east-1",
                    "AWS/EC2",
                    "CPUUtilization",
                    period,
                    "Average",
                    dimensions,
                    start,
                    end,
                )
                .await
                .unwrap_err();
            assert!(err.is_bad_request(), "{expected}: {err:#}");
            assert_eq!(err.short_msg(), expected);
        }
        assert_eq!(api.calls(), 0);
    }

    fn cache_requests(hit: &str) -> u64 {
        CLOUDWATCH_CACHE_REQUESTS_TOTAL
            .with_label_values(&[hit])
            .get()
    }

    #[tokio::test]
    async fn test_identical_query_is_served_from_cache() -> anyhow::Result<()> {
        let api = Arc::new(FakeApi::new(two_points));
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));

        // Other tests share the counters, so only check that they moved.
        let misses = cache_requests("false");
        let first = run(&querier, &mut EvaluationState::new(now()), "InstanceId:i-1").await?;
        assert!(cache_requests("false") > misses);

        let hits = cache_requests("true");
        let second = run(&querier, &mut EvaluationState::new(now()), "InstanceId:i-1").await?;
        assert!(cache_requests("true") > hits);

        assert_eq!(first, second);
        assert_eq!(api.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_identical_queries_share_backend_call() -> anyhow::Result<()> {
        let mut api = FakeApi::new(two_points);
        api.latency = Duration::from_millis(50);
        let api = Arc::new(api);
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        let mut first_state = EvaluationState::new(now());
        let mut second_state = EvaluationState::new(now());
        let (first, second) = tokio::join!(
            run(&querier, &mut first_state, "InstanceId:i-1"),
            run(&querier, &mut second_state, "InstanceId:i-1"),
        );
        assert_eq!(first?, second?);
        assert_eq!(api.calls(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() -> anyhow::Result<()> {
        let api = FakeApi::new(two_points);
        api.script.lock().push_back(503);
        let api = Arc::new(api);
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        let results = run(&querier, &mut EvaluationState::new(now()), "").await?;
        assert_eq!(results.results.len(), 1);
        assert_eq!(api.calls(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let mut api = FakeApi::new(two_points);
        api.fallback = Some(403);
        let api = Arc::new(api);
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        let err = run(&querier, &mut EvaluationState::new(now()), "")
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(err.backend_status(), Some(403));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_query_is_still_timed() {
        let mut api = FakeApi::new(two_points);
        api.fallback = Some(403);
        let querier = querier(Arc::new(api), Arc::new(FakeResolver::default()));
        let mut state = EvaluationState::new(now());
        let err = run(&querier, &mut state, "InstanceId:i-1")
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
        let timings = state.timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].operation, "query");
        assert!(timings[0].detail.contains("i-1"), "{}", timings[0].detail);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_surfaces_last_error() {
        let mut api = FakeApi::new(two_points);
        api.fallback = Some(503);
        let api = Arc::new(api);
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        let err = run(&querier, &mut EvaluationState::new(now()), "")
            .await
            .unwrap_err();
        assert_eq!(api.calls(), 4);
        assert!(format!("{err:#}").contains("retries exhausted"), "{err:#}");
        assert_eq!(err.backend_status(), Some(503));
        assert!(err.is_overloaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let mut api = FakeApi::new(two_points);
        api.latency = Duration::from_secs(3600);
        let api = Arc::new(api);
        let querier = querier(api, Arc::new(FakeResolver::default()))
            .with_timeout(Duration::from_secs(5));
        let err = run(&querier, &mut EvaluationState::new(now()), "")
            .await
            .unwrap_err();
        assert!(err.is_overloaded());
        assert_eq!(err.short_msg(), "QueryTimeout");
        assert_eq!(err.backend_status(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_last_backend_error() {
        // Every call takes a second, so retries can't be exhausted in time.
        let mut api = FakeApi::new(two_points);
        api.fallback = Some(503);
        api.latency = Duration::from_secs(1);
        let querier = querier(Arc::new(api), Arc::new(FakeResolver::default()))
            .with_timeout(Duration::from_millis(1500));
        let err = run(&querier, &mut EvaluationState::new(now()), "")
            .await
            .unwrap_err();
        assert_eq!(err.short_msg(), "QueryTimeout");
        assert!(err.is_overloaded());
        assert_eq!(err.backend_status(), Some(503));
        assert!(format!("{err:#}").contains("scripted failure"), "{err:#}");
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() -> anyhow::Result<()> {
        let api = FakeApi::new(two_points);
        api.script.lock().push_back(400);
        let api = Arc::new(api);
        let querier = querier(api.clone(), Arc::new(FakeResolver::default()));
        assert!(run(&querier, &mut EvaluationState::new(now()), "")
            .await
            .is_err());
        run(&querier, &mut EvaluationState::new(now()), "").await?;
        assert_eq!(api.calls(), 2);
        Ok(())
    }
}
