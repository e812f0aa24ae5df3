//! Check results: one line of check output with a state.

use serde::{Deserialize, Serialize};

use crate::{OutputError, State};

/// One line of check output.
///
/// A result is created either from a *summary*, which is always shown, or
/// from a *notice*, which only shows up in the service summary when its state
/// is not OK. Both always end up in the long output ("details").
///
/// # Example
///
/// ```rust
/// use checkengine_types::{CheckResult, State};
///
/// let result = CheckResult::new(State::Warn, "Used: 85.00").unwrap();
/// assert_eq!(result.summary(), "Used: 85.00");
///
/// let notice = CheckResult::notice(State::Ok, "Swap: 0 B").unwrap();
/// assert_eq!(notice.summary(), "");
/// assert_eq!(notice.details(), "Swap: 0 B");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    state: State,
    summary: String,
    details: String,
}

impl CheckResult {
    /// Create a result that is always shown in the summary.
    pub fn new(state: State, summary: impl Into<String>) -> Result<Self, OutputError> {
        let summary = summary.into().trim().to_string();
        if summary.is_empty() {
            return Err(OutputError::EmptyText("summary"));
        }
        if summary.contains('\n') {
            return Err(OutputError::NewlineInSummary(summary));
        }
        Ok(Self {
            state,
            details: summary.clone(),
            summary,
        })
    }

    /// Create a result that only appears in the summary if its state is not OK.
    ///
    /// Multi-line notices are joined with `", "` for the summary.
    pub fn notice(state: State, notice: impl Into<String>) -> Result<Self, OutputError> {
        let notice = notice.into().trim().to_string();
        if notice.is_empty() {
            return Err(OutputError::EmptyText("notice"));
        }
        let summary = if state == State::Ok {
            String::new()
        } else {
            notice.replace('\n', ", ")
        };
        Ok(Self {
            state,
            summary,
            details: notice,
        })
    }

    /// Replace the long output of this result.
    pub fn with_details(mut self, details: impl Into<String>) -> Result<Self, OutputError> {
        let details = details.into().trim().to_string();
        if details.is_empty() {
            return Err(OutputError::EmptyText("details"));
        }
        self.details = details;
        Ok(self)
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The summary text; empty for OK notices.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn details(&self) -> &str {
        &self.details
    }
}
