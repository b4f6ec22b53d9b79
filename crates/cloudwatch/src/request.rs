use chrono::{
    DateTime,
    Utc,
};
use errors::ErrorMetadata;
use serde::Serialize;

use crate::Dimension;

/// Unvalidated fields of a [`Request`].
#[derive(Clone, Debug)]
pub struct RequestParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub region: String,
    pub namespace: String,
    pub metric: String,
    /// Aggregation period in seconds.
    pub period: u64,
    pub statistic: String,
    pub dimensions: Vec<Dimension>,
    pub profile: String,
}

/// One CloudWatch query over an absolute time range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    region: String,
    namespace: String,
    metric: String,
    period: u64,
    statistic: String,
    dimensions: Vec<Dimension>,
    profile: String,
}

impl Request {
    pub fn new(params: RequestParams) -> anyhow::Result<Self> {
        let RequestParams {
            start,
            end,
            region,
            namespace,
            metric,
            period,
            statistic,
            dimensions,
            profile,
        } = params;
        if start >= end {
            anyhow::bail!(ErrorMetadata::bad_request(
                "InvalidTimeRange",
                format!("Query start {start} must be before its end {end}"),
            ));
        }
        if period == 0 {
            anyhow::bail!(ErrorMetadata::bad_request(
                "InvalidPeriod",
                "Query period must be at least one second",
            ));
        }
        Ok(Self {
            start,
            end,
            region,
            namespace,
            metric,
            period,
            statistic,
            dimensions,
            profile,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Aggregation period in seconds.
    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn statistic(&self) -> &str {
        &self.statistic
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Key under which the response to this request is memoized.
    ///
    /// Layout:
    /// `cloudwatch-<start>-<end>-<region>-<namespace>-<metric>-<period>-<statistic>-[<dim> ...]-<profile>`
    /// with separator characters in free-text parts percent-escaped, so two
    /// requests share a key only if all their fields are equal.
    pub fn cache_key(&self) -> String {
        let mut key = format!(
            "cloudwatch-{}-{}-",
            self.start.timestamp(),
            self.end.timestamp()
        );
        for part in [&self.region, &self.namespace, &self.metric] {
            push_escaped(&mut key, part);
            key.push('-');
        }
        key.push_str(&self.period.to_string());
        key.push('-');
        push_escaped(&mut key, &self.statistic);
        key.push_str("-[");
        for (i, dimension) in self.dimensions.iter().enumerate() {
            if i > 0 {
                key.push(' ');
            }
            push_escaped(&mut key, dimension.name());
            key.push(':');
            push_escaped(&mut key, dimension.value());
        }
        key.push_str("]-");
        push_escaped(&mut key, &self.profile);
        key
    }
}

fn push_escaped(key: &mut String, part: &str) {
    for c in part.chars() {
        match c {
            '%' => key.push_str("%25"),
            '-' => key.push_str("%2D"),
            ':' => key.push_str("%3A"),
            ' ' => key.push_str("%20"),
            '[' => key.push_str("%5B"),
            ']' => key.push_str("%5D"),
            c => key.push(c),
        }
    }
}
