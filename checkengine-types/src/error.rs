//! Error types for constructing check values.

use thiserror::Error;

/// A name did not match `^[A-Za-z0-9_]+$`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name was empty.
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    /// The name contained a forbidden character.
    #[error("invalid {kind} {name:?}: invalid character {invalid:?}")]
    InvalidCharacter {
        kind: &'static str,
        name: String,
        invalid: char,
    },
}

/// Errors constructing a [`CheckResult`](crate::CheckResult) or [`Metric`](crate::Metric).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutputError {
    /// Summary, notice or details text was empty.
    #[error("{0} must not be empty")]
    EmptyText(&'static str),

    /// A summary must fit on one line.
    #[error("summary must not contain newlines: {0:?}")]
    NewlineInSummary(String),

    /// Metric names must be non-empty and free of whitespace and perfdata separators.
    #[error("invalid metric name: {0:?}")]
    InvalidMetricName(String),

    /// Metric values, levels and boundaries must be finite numbers.
    #[error("metric {name:?}: {what} must be a finite number, got {value}")]
    NonFinite {
        name: String,
        what: &'static str,
        value: f64,
    },
}

/// Errors reading a value out of [`Parameters`](crate::Parameters).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    /// The parameter was not present.
    #[error("missing parameter: {0}")]
    Missing(String),

    /// The parameter had an unexpected shape.
    #[error("invalid parameter {key}: {reason}")]
    Invalid { key: String, reason: String },
}
