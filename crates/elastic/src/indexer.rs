use std::{
    fmt::{
        Debug,
        Write,
    },
    sync::Arc,
};

use chrono::{
    DateTime,
    Datelike,
    Days,
    NaiveDate,
    Utc,
};
use errors::ErrorMetadata;

/// Maps a time range to the indices a search over that range must touch.
pub trait IndexNameGenerator: Debug + Send + Sync {
    fn generate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String>;
}

/// An index generator paired with the document field holding the event time.
#[derive(Clone, Debug)]
pub struct EsIndexer {
    pub time_field: String,
    pub generator: Arc<dyn IndexNameGenerator>,
}

impl EsIndexer {
    pub fn new(time_field: impl Into<String>, generator: impl IndexNameGenerator + 'static) -> Self {
        Self {
            time_field: time_field.into(),
            generator: Arc::new(generator),
        }
    }

    pub fn generate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
        self.generator.generate(start, end)
    }
}

/// Every calendar day in `[start, end)` plus the day containing `end`, in
/// order.
fn touched_days(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut instant = start;
    while instant < end {
        days.push(instant.date_naive());
        match instant.checked_add_days(Days::new(1)) {
            Some(next) => instant = next,
            None => break,
        }
    }
    days.push(end.date_naive());
    days
}

/// Names arrive in chronological order, so duplicates are always adjacent.
fn push_unique(names: &mut Vec<String>, name: String) {
    if names.last() != Some(&name) {
        names.push(name);
    }
}

/// One index per ISO week, named `<prefix>-<year>.<week>`.
///
/// Weeks spanning a new year belong to the year holding most of their days,
/// so 2018-12-31 is in `2019.01`.
#[derive(Clone, Debug)]
pub struct WeeklyIndexer {
    prefix: String,
}

impl WeeklyIndexer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl IndexNameGenerator for WeeklyIndexer {
    fn generate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
        let mut names = Vec::new();
        for day in touched_days(start, end) {
            let week = day.iso_week();
            push_unique(
                &mut names,
                format!("{}-{:04}.{:02}", self.prefix, week.year(), week.week()),
            );
        }
        names
    }
}

/// Cross-cluster search: every cluster's indices matching the prefix,
/// regardless of the time range.
#[derive(Clone, Debug)]
pub struct CrossClusterIndexer {
    prefix: String,
}

impl CrossClusterIndexer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl IndexNameGenerator for CrossClusterIndexer {
    fn generate(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Vec<String> {
        vec![format!("*:{}*", self.prefix)]
    }
}

/// One index per day, named `<prefix><date>` with the date rendered by a
/// strftime layout, e.g. prefix `logstash-` and layout `%Y.%m.%d`.
#[derive(Clone, Debug)]
pub struct DailyIndexer {
    prefix: String,
    layout: String,
}

impl DailyIndexer {
    pub fn new(prefix: impl Into<String>, layout: impl Into<String>) -> anyhow::Result<Self> {
        let layout = layout.into();
        // Layouts that can't render a date (bad specifiers, time fields) fail
        // here instead of when generating.
        let mut rendered = String::new();
        if write!(rendered, "{}", NaiveDate::MIN.format(&layout)).is_err() {
            anyhow::bail!(ErrorMetadata::bad_request(
                "InvalidIndexLayout",
                format!("{layout:?} is not a valid date layout"),
            ));
        }
        Ok(Self {
            prefix: prefix.into(),
            layout,
        })
    }
}

impl IndexNameGenerator for DailyIndexer {
    fn generate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
        let mut names = Vec::new();
        for day in touched_days(start, end) {
            push_unique(
                &mut names,
                format!("{}{}", self.prefix, day.format(&self.layout)),
            );
        }
        names
    }
}

/// A fixed list of indices.
#[derive(Clone, Debug)]
pub struct StaticIndexer {
    indices: Vec<String>,
}

impl StaticIndexer {
    pub fn new(indices: Vec<String>) -> Self {
        Self { indices }
    }
}

impl IndexNameGenerator for StaticIndexer {
    fn generate(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Vec<String> {
        self.indices.clone()
    }
}
