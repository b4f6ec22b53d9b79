use std::fmt;

use serde::Serialize;

/// A name/value pair scoping a metric, e.g. `InstanceId:i-123`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[cfg_attr(
    any(test, feature = "testing"),
    derive(proptest_derive::Arbitrary)
)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    name: String,
    value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}
