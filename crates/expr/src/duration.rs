use std::{
    str::FromStr,
    sync::LazyLock,
    time::Duration,
};

use regex::Regex;

static DURATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(ms|s|m|h|d|w|n|y)$").unwrap());

static BARE_NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

const SECOND: f64 = 1.0;
const MINUTE: f64 = 60.0 * SECOND;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

/// A relative duration in OpenTSDB syntax: a number followed by one of
/// `ms s m h d w n y`, where `n` is 30 days and `y` is 365 days.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TsdbDuration(Duration);

impl TsdbDuration {
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Parse an aggregation period, where a bare integer means seconds.
    pub fn parse_period(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if BARE_NUMBER_REGEX.is_match(s) {
            format!("{s}s").parse()
        } else {
            s.parse()
        }
    }
}

impl FromStr for TsdbDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(captures) = DURATION_REGEX.captures(s.trim()) else {
            anyhow::bail!("{s:?} is not a valid duration");
        };
        let amount: f64 = captures[1].parse()?;
        let seconds = match &captures[2] {
            "ms" => amount / 1000.0,
            unit => amount * unit_seconds(unit)?,
        };
        Ok(Self(Duration::try_from_secs_f64(seconds)?))
    }
}

fn unit_seconds(unit: &str) -> anyhow::Result<f64> {
    let seconds = match unit {
        "s" => SECOND,
        "m" => MINUTE,
        "h" => HOUR,
        "d" => DAY,
        "w" => 7.0 * DAY,
        "n" => 30.0 * DAY,
        "y" => 365.0 * DAY,
        unit => anyhow::bail!("Unknown duration unit {unit:?}"),
    };
    Ok(seconds)
}
