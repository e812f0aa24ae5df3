//! The closed set of values a check function yields.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CheckResult, Metric, State};

/// Marker that discards the results of the current check cycle.
///
/// Used when a plugin cannot produce meaningful output yet, e.g. a counter
/// that has only been seen once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreResults {
    reason: String,
}

impl IgnoreResults {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Default for IgnoreResults {
    fn default() -> Self {
        Self::new("currently no results")
    }
}

impl fmt::Display for IgnoreResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// The service has no usable results this cycle.
///
/// The engine does not submit a new state for the service; the previous one
/// stays in place until it goes stale.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct IgnoreResultsError(pub String);

impl From<IgnoreResults> for IgnoreResultsError {
    fn from(ignore: IgnoreResults) -> Self {
        IgnoreResultsError(ignore.reason)
    }
}

/// One element of a check function's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutput {
    Result(CheckResult),
    Metric(Metric),
    IgnoreResults(IgnoreResults),
}

impl CheckOutput {
    /// The state of this output, if it is a result.
    pub fn state(&self) -> Option<State> {
        match self {
            CheckOutput::Result(result) => Some(result.state()),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<&CheckResult> {
        match self {
            CheckOutput::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_metric(&self) -> Option<&Metric> {
        match self {
            CheckOutput::Metric(metric) => Some(metric),
            _ => None,
        }
    }
}

impl From<CheckResult> for CheckOutput {
    fn from(result: CheckResult) -> Self {
        CheckOutput::Result(result)
    }
}

impl From<Metric> for CheckOutput {
    fn from(metric: Metric) -> Self {
        CheckOutput::Metric(metric)
    }
}

impl From<IgnoreResults> for CheckOutput {
    fn from(ignore: IgnoreResults) -> Self {
        CheckOutput::IgnoreResults(ignore)
    }
}
