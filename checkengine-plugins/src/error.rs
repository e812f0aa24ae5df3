//! Error types for the bundled plugins.

use thiserror::Error;

/// Errors raised while parsing agent sections.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A row has fewer columns than the section format needs.
    #[error("Malformed line: {0:?}")]
    MalformedLine(Vec<String>),

    /// A column that should hold a number does not.
    #[error("Invalid number {value:?} for {field}")]
    InvalidNumber { field: String, value: String },

    /// A required row is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

pub(crate) fn number(field: &str, value: &str) -> Result<f64, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}
