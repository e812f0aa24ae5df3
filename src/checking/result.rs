//! Aggregation of a check function's output into one service result.

use std::fmt;

use checkengine_types::{CheckOutput, CheckResult, IgnoreResultsError, Metric, State};
use serde::{Deserialize, Serialize};

/// The state and output of one service, as handed to the monitoring core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCheckResult {
    pub state: State,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

impl ServiceCheckResult {
    pub fn new(state: State, summary: impl Into<String>) -> Self {
        Self {
            state,
            summary: summary.into(),
            details: Vec::new(),
            metrics: Vec::new(),
        }
    }

    /// The check function ran but produced no results.
    pub fn item_not_found() -> Self {
        Self::new(State::Unknown, "Item not found in monitoring data")
    }

    /// None of the plugin's sections had data.
    pub fn received_no_data() -> Self {
        Self::new(State::Unknown, "Check plugin received no monitoring data")
    }

    /// No plugin is registered for the service.
    pub fn not_implemented() -> Self {
        Self::new(State::Unknown, "Check plugin not implemented")
    }

    /// Summary line followed by the details, one per line.
    pub fn output(&self) -> String {
        std::iter::once(self.summary.as_str())
            .chain(self.details.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// The metrics as performance data, space separated.
    pub fn perfdata(&self) -> String {
        self.metrics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ServiceCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.state, self.output())?;
        if !self.metrics.is_empty() {
            write!(f, " | {}", self.perfdata())?;
        }
        Ok(())
    }
}

fn add_state_marker(text: &str, marker: &str) -> String {
    if text.contains(marker) {
        text.to_string()
    } else {
        format!("{text}{marker}")
    }
}

/// Combine the output of a check function into one service result.
///
/// All output is consumed first; if it contained an
/// [`IgnoreResults`](checkengine_types::IgnoreResults), the reason of the
/// last one is returned as an error. The service state is the worst state
/// of all results. State markers are appended only when there is more than
/// one result.
pub fn aggregate_results(outputs: Vec<CheckOutput>) -> Result<ServiceCheckResult, IgnoreResultsError> {
    let mut results: Vec<CheckResult> = Vec::new();
    let mut metrics = Vec::new();
    let mut ignore = None;

    for output in outputs {
        match output {
            CheckOutput::Result(result) => results.push(result),
            CheckOutput::Metric(metric) => metrics.push(metric),
            CheckOutput::IgnoreResults(reason) => ignore = Some(reason),
        }
    }

    if let Some(reason) = ignore {
        return Err(reason.into());
    }

    if results.is_empty() {
        return Ok(ServiceCheckResult::item_not_found());
    }

    let needs_marker = results.len() > 1;
    let mut summaries = Vec::new();
    let mut details = Vec::new();
    let mut state = State::Ok;

    for result in &results {
        state = state.worst(result.state());
        let marker = if needs_marker {
            result.state().marker()
        } else {
            ""
        };
        if !result.summary().is_empty() {
            summaries.push(add_state_marker(result.summary(), marker));
        }
        details.push(add_state_marker(result.details(), marker));
    }

    let summary = if summaries.is_empty() {
        let count = details.len();
        format!(
            "Everything looks OK - {} detail{} available",
            count,
            if count == 1 { "" } else { "s" }
        )
    } else {
        summaries.join(", ")
    };

    Ok(ServiceCheckResult {
        state,
        summary,
        details,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkengine_types::IgnoreResults;

    fn result(state: State, summary: &str) -> CheckOutput {
        CheckResult::new(state, summary).unwrap().into()
    }

    fn notice(state: State, text: &str) -> CheckOutput {
        CheckResult::notice(state, text).unwrap().into()
    }

    #[test]
    fn test_single_result_has_no_marker() {
        let aggregated = aggregate_results(vec![result(State::Warn, "Used: 85.00")]).unwrap();
        assert_eq!(aggregated.state, State::Warn);
        assert_eq!(aggregated.summary, "Used: 85.00");
        assert_eq!(aggregated.details, ["Used: 85.00"]);
    }

    #[test]
    fn test_markers_and_worst_state() {
        let aggregated = aggregate_results(vec![
            result(State::Ok, "Speed: 1 GBit/s"),
            result(State::Crit, "Operational state: down"),
            notice(State::Warn, "Errors: 3"),
            notice(State::Ok, "Discards: 0"),
        ])
        .unwrap();

        assert_eq!(aggregated.state, State::Crit);
        assert_eq!(
            aggregated.summary,
            "Speed: 1 GBit/s, Operational state: down(!!), Errors: 3(!)"
        );
        assert_eq!(
            aggregated.details,
            [
                "Speed: 1 GBit/s",
                "Operational state: down(!!)",
                "Errors: 3(!)",
                "Discards: 0"
            ]
        );
    }

    #[test]
    fn test_existing_marker_is_not_repeated() {
        let aggregated = aggregate_results(vec![
            result(State::Warn, "Load high(!)"),
            result(State::Ok, "5 CPUs"),
        ])
        .unwrap();
        assert_eq!(aggregated.summary, "Load high(!), 5 CPUs");
    }

    #[test]
    fn test_only_notices() {
        let aggregated = aggregate_results(vec![
            notice(State::Ok, "Swap: 0 B"),
            notice(State::Ok, "Cache: 1 GiB"),
        ])
        .unwrap();
        assert_eq!(aggregated.state, State::Ok);
        assert_eq!(aggregated.summary, "Everything looks OK - 2 details available");
        assert_eq!(
            aggregated.output(),
            "Everything looks OK - 2 details available\nSwap: 0 B\nCache: 1 GiB"
        );

        let single = aggregate_results(vec![notice(State::Ok, "Swap: 0 B")]).unwrap();
        assert_eq!(single.summary, "Everything looks OK - 1 detail available");
    }

    #[test]
    fn test_no_results_is_item_not_found() {
        let metric = Metric::new("used", 1.0).unwrap();
        let aggregated = aggregate_results(vec![metric.into()]).unwrap();
        assert_eq!(aggregated, ServiceCheckResult::item_not_found());
        assert_eq!(aggregated.state, State::Unknown);
    }

    #[test]
    fn test_ignore_results_wins_after_consuming_everything() {
        let err = aggregate_results(vec![
            result(State::Crit, "Something"),
            IgnoreResults::new("first").into(),
            IgnoreResults::new("counters initialized").into(),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "counters initialized");
    }

    #[test]
    fn test_display_with_perfdata() {
        let aggregated = aggregate_results(vec![
            result(State::Ok, "Used: 70.00"),
            Metric::new("mem_used", 70.0)
                .unwrap()
                .with_levels(80.0, 90.0)
                .unwrap()
                .into(),
        ])
        .unwrap();
        assert_eq!(
            aggregated.to_string(),
            "OK - Used: 70.00\nUsed: 70.00 | mem_used=70;80;90"
        );
        assert_eq!(aggregated.perfdata(), "mem_used=70;80;90");
    }
}
