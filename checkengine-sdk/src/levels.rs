//! Threshold evaluation for numeric values.
//!
//! [`check_levels`] turns a value and its configured levels into the
//! standard output of a check: one [`CheckResult`] describing the value, an
//! optional [`Metric`], and prediction metrics for predictive levels.
//!
//! ## Semantics
//!
//! - Upper levels `(warn, crit)`: CRIT if `value >= crit`, WARN if `value >= warn`
//! - Lower levels `(warn, crit)`: CRIT if `value < crit`, WARN if `value < warn`
//! - The overall state is the worst of both directions
//! - Level text is only added for a direction that is not OK
//!
//! ## Example
//!
//! ```rust
//! use checkengine_sdk::{check_levels, Levels};
//! use checkengine_types::State;
//!
//! let outputs = check_levels(85.0)
//!     .upper(Levels::fixed(80.0, 90.0))
//!     .metric("mem_used_percent")
//!     .label("Used")
//!     .evaluate()
//!     .unwrap();
//!
//! let result = outputs[0].as_result().unwrap();
//! assert_eq!(result.state(), State::Warn);
//! assert_eq!(result.summary(), "Used: 85.00 (warn/crit at 80.00/90.00)");
//! ```

use checkengine_types::{CheckOutput, CheckResult, Metric, OutputError, State};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::render;

/// Levels given in an unsupported shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid levels specification: {0}")]
pub struct LevelsError(String);

/// Levels that were computed from historic data.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictiveLevels {
    /// Metric the prediction was made for; prediction metrics derive their name from it.
    pub metric_name: String,
    /// Predicted value, `None` while there is no reference data yet.
    pub prediction: Option<f64>,
    /// Levels computed around the prediction.
    pub levels: Option<(f64, f64)>,
}

/// Levels for one direction (upper or lower).
///
/// Deserializes from the parameter forms `["no_levels", null]`,
/// `["fixed", [warn, crit]]`, `["predictive", [metric, prediction, [warn, crit]]]`
/// and the legacy bare pair `[warn, crit]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Levels {
    #[default]
    NoLevels,
    Fixed(f64, f64),
    Predictive(PredictiveLevels),
}

impl Levels {
    pub fn fixed(warn: f64, crit: f64) -> Self {
        Levels::Fixed(warn, crit)
    }

    pub fn predictive(
        metric_name: impl Into<String>,
        prediction: Option<f64>,
        levels: Option<(f64, f64)>,
    ) -> Self {
        Levels::Predictive(PredictiveLevels {
            metric_name: metric_name.into(),
            prediction,
            levels,
        })
    }

    /// The effective warn/crit pair, if any.
    pub fn thresholds(&self) -> Option<(f64, f64)> {
        match self {
            Levels::NoLevels => None,
            Levels::Fixed(warn, crit) => Some((*warn, *crit)),
            Levels::Predictive(p) => p.levels,
        }
    }
}

fn pair(value: &Value) -> Result<(f64, f64), LevelsError> {
    serde_json::from_value::<(f64, f64)>(value.clone())
        .map_err(|_| LevelsError(format!("expected [warn, crit], got {value}")))
}

impl TryFrom<Value> for Levels {
    type Error = LevelsError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Levels::try_from(&value)
    }
}

impl TryFrom<&Value> for Levels {
    type Error = LevelsError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let Some([kind, spec]) = value.as_array().and_then(|a| <&[Value; 2]>::try_from(a.as_slice()).ok())
        else {
            return match value {
                Value::Null => Ok(Levels::NoLevels),
                other => Err(LevelsError(format!("expected a pair, got {other}"))),
            };
        };

        match kind.as_str() {
            Some("no_levels") => Ok(Levels::NoLevels),
            Some("fixed") => {
                let (warn, crit) = pair(spec)?;
                Ok(Levels::Fixed(warn, crit))
            }
            Some("predictive") => {
                let Some([metric, prediction, levels]) = spec
                    .as_array()
                    .and_then(|a| <&[Value; 3]>::try_from(a.as_slice()).ok())
                else {
                    return Err(LevelsError(format!(
                        "expected [metric, prediction, levels], got {spec}"
                    )));
                };
                let metric_name = metric
                    .as_str()
                    .ok_or_else(|| LevelsError(format!("expected metric name, got {metric}")))?;
                let prediction = match prediction {
                    Value::Null => None,
                    p => Some(
                        p.as_f64()
                            .ok_or_else(|| LevelsError(format!("expected prediction, got {p}")))?,
                    ),
                };
                let levels = match levels {
                    Value::Null => None,
                    l => Some(pair(l)?),
                };
                Ok(Levels::predictive(metric_name, prediction, levels))
            }
            Some(other) => Err(LevelsError(format!("unknown levels type {other:?}"))),
            // Legacy bare [warn, crit]
            None => {
                let (warn, crit) = pair(value)?;
                Ok(Levels::Fixed(warn, crit))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upper,
    Lower,
}

impl Direction {
    fn evaluate(self, value: f64, warn: f64, crit: f64) -> State {
        match self {
            Direction::Upper if value >= crit => State::Crit,
            Direction::Upper if value >= warn => State::Warn,
            Direction::Lower if value < crit => State::Crit,
            Direction::Lower if value < warn => State::Warn,
            _ => State::Ok,
        }
    }

    fn text(self, warn: &str, crit: &str) -> String {
        match self {
            Direction::Upper => format!(" (warn/crit at {warn}/{crit})"),
            Direction::Lower => format!(" (warn/crit below {warn}/{crit})"),
        }
    }

    fn prediction_prefix(self) -> &'static str {
        match self {
            Direction::Upper => "predict_",
            Direction::Lower => "predict_lower_",
        }
    }
}

/// Start a level check for `value`.
pub fn check_levels<'a>(value: f64) -> CheckLevels<'a> {
    CheckLevels::new(value)
}

/// Builder for a level check. Created with [`check_levels`].
pub struct CheckLevels<'a> {
    value: f64,
    upper: Levels,
    lower: Levels,
    metric_name: Option<String>,
    render: Box<dyn Fn(f64) -> String + 'a>,
    label: Option<String>,
    boundaries: Option<(Option<f64>, Option<f64>)>,
    notice_only: bool,
}

impl<'a> CheckLevels<'a> {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            upper: Levels::NoLevels,
            lower: Levels::NoLevels,
            metric_name: None,
            render: Box::new(render::number),
            label: None,
            boundaries: None,
            notice_only: false,
        }
    }

    /// Upper levels: the value is bad when it gets too high.
    pub fn upper(mut self, levels: Levels) -> Self {
        self.upper = levels;
        self
    }

    /// Lower levels: the value is bad when it gets too low.
    pub fn lower(mut self, levels: Levels) -> Self {
        self.lower = levels;
        self
    }

    /// Also emit a metric with this name.
    pub fn metric(mut self, name: impl Into<String>) -> Self {
        self.metric_name = Some(name.into());
        self
    }

    /// How to render the value and the levels in the summary.
    pub fn render(mut self, render: impl Fn(f64) -> String + 'a) -> Self {
        self.render = Box::new(render);
        self
    }

    /// Text in front of the rendered value (`"label: value"`).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Boundaries of the emitted metric.
    pub fn boundaries(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.boundaries = Some((min, max));
        self
    }

    /// Emit a notice instead of a summary.
    pub fn notice_only(mut self) -> Self {
        self.notice_only = true;
        self
    }

    fn check_direction(&self, levels: &Levels, direction: Direction) -> (State, String) {
        let mut text = String::new();
        let thresholds = match levels {
            Levels::NoLevels => None,
            Levels::Fixed(warn, crit) => Some((*warn, *crit)),
            Levels::Predictive(p) => {
                match p.prediction {
                    Some(prediction) => {
                        text.push_str(&format!(" (prediction: {})", (self.render)(prediction)))
                    }
                    None => text.push_str(" (no reference for prediction yet)"),
                }
                p.levels
            }
        };

        let Some((warn, crit)) = thresholds else {
            return (State::Ok, text);
        };
        let state = direction.evaluate(self.value, warn, crit);
        if state != State::Ok {
            text.push_str(&direction.text(&(self.render)(warn), &(self.render)(crit)));
        }
        (state, text)
    }

    fn prediction_metric(
        levels: &Levels,
        direction: Direction,
    ) -> Result<Option<Metric>, OutputError> {
        let Levels::Predictive(p) = levels else {
            return Ok(None);
        };
        let Some(prediction) = p.prediction else {
            return Ok(None);
        };
        let name = format!("{}{}", direction.prediction_prefix(), p.metric_name);
        let metric = Metric::new(name, prediction)?;
        Ok(Some(match p.levels {
            Some((warn, crit)) => metric.with_levels(warn, crit)?,
            None => metric,
        }))
    }

    /// Evaluate the levels and produce the outputs.
    ///
    /// Outputs are ordered: the result, then the metric (if requested), then
    /// prediction metrics for upper and lower predictive levels.
    pub fn evaluate(self) -> Result<Vec<CheckOutput>, OutputError> {
        let (upper_state, upper_text) = self.check_direction(&self.upper, Direction::Upper);
        let (lower_state, lower_text) = self.check_direction(&self.lower, Direction::Lower);
        let state = upper_state.worst(lower_state);

        let rendered = (self.render)(self.value);
        let mut text = match &self.label {
            Some(label) => format!("{label}: {rendered}"),
            None => rendered,
        };
        text.push_str(&upper_text);
        text.push_str(&lower_text);

        let result = if self.notice_only {
            CheckResult::notice(state, text)?
        } else {
            CheckResult::new(state, text)?
        };

        let mut outputs = vec![CheckOutput::Result(result)];

        if let Some(name) = &self.metric_name {
            let mut metric = Metric::new(name.clone(), self.value)?;
            if let Some((warn, crit)) = self.upper.thresholds() {
                metric = metric.with_levels(warn, crit)?;
            }
            if let Some((min, max)) = self.boundaries {
                metric = metric.with_boundaries(min, max)?;
            }
            outputs.push(metric.into());
        }

        for (levels, direction) in [(&self.upper, Direction::Upper), (&self.lower, Direction::Lower)] {
            if let Some(metric) = Self::prediction_metric(levels, direction)? {
                outputs.push(metric.into());
            }
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_of(outputs: &[CheckOutput]) -> State {
        outputs[0].state().unwrap()
    }

    fn summary_of(outputs: &[CheckOutput]) -> &str {
        outputs[0].as_result().unwrap().summary()
    }

    #[test]
    fn test_upper_levels_boundaries() {
        let eval = |v: f64| {
            check_levels(v)
                .upper(Levels::fixed(10.0, 20.0))
                .evaluate()
                .unwrap()
        };
        assert_eq!(state_of(&eval(9.0)), State::Ok);
        assert_eq!(state_of(&eval(10.0)), State::Warn);
        assert_eq!(state_of(&eval(19.99)), State::Warn);
        assert_eq!(state_of(&eval(20.0)), State::Crit);
    }

    #[test]
    fn test_upper_levels_are_monotone() {
        let mut last = State::Ok;
        for i in 0..300 {
            let v = f64::from(i) / 10.0;
            let outputs = check_levels(v)
                .upper(Levels::fixed(10.0, 20.0))
                .evaluate()
                .unwrap();
            let state = state_of(&outputs);
            assert!(state >= last, "state decreased at {v}");
            last = state;
        }
    }

    #[test]
    fn test_lower_levels() {
        let eval = |v: f64| {
            check_levels(v)
                .lower(Levels::fixed(10.0, 5.0))
                .evaluate()
                .unwrap()
        };
        assert_eq!(state_of(&eval(10.0)), State::Ok);
        assert_eq!(state_of(&eval(9.0)), State::Warn);
        assert_eq!(state_of(&eval(5.0)), State::Warn);
        let crit = eval(4.0);
        assert_eq!(state_of(&crit), State::Crit);
        assert_eq!(summary_of(&crit), "4.00 (warn/crit below 10.00/5.00)");
    }

    #[test]
    fn test_no_levels_text_when_ok() {
        let outputs = check_levels(70.0)
            .upper(Levels::fixed(80.0, 90.0))
            .label("Used")
            .evaluate()
            .unwrap();
        assert_eq!(summary_of(&outputs), "Used: 70.00");
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_worst_of_both_directions() {
        let outputs = check_levels(95.0)
            .upper(Levels::fixed(80.0, 90.0))
            .lower(Levels::fixed(100.0, 50.0))
            .evaluate()
            .unwrap();
        assert_eq!(state_of(&outputs), State::Crit);
        assert_eq!(
            summary_of(&outputs),
            "95.00 (warn/crit at 80.00/90.00) (warn/crit below 100.00/50.00)"
        );
    }

    #[test]
    fn test_metric_carries_upper_levels_and_boundaries() {
        let outputs = check_levels(42.0)
            .upper(Levels::fixed(80.0, 90.0))
            .lower(Levels::fixed(10.0, 5.0))
            .metric("util")
            .boundaries(Some(0.0), Some(100.0))
            .evaluate()
            .unwrap();
        let metric = outputs[1].as_metric().unwrap();
        assert_eq!(metric.name(), "util");
        assert_eq!(metric.value(), 42.0);
        assert_eq!(metric.levels(), Some((80.0, 90.0)));
        assert_eq!(metric.boundaries(), Some((Some(0.0), Some(100.0))));
    }

    #[test]
    fn test_custom_render_applies_to_levels() {
        let outputs = check_levels(2048.0)
            .upper(Levels::fixed(1024.0, 4096.0))
            .render(render::bytes)
            .evaluate()
            .unwrap();
        assert_eq!(summary_of(&outputs), "2.00 KiB (warn/crit at 1.00 KiB/4.00 KiB)");
    }

    #[test]
    fn test_notice_only() {
        let ok = check_levels(1.0).notice_only().evaluate().unwrap();
        assert_eq!(summary_of(&ok), "");
        assert_eq!(ok[0].as_result().unwrap().details(), "1.00");

        let warn = check_levels(1.0)
            .upper(Levels::fixed(0.5, 2.0))
            .notice_only()
            .evaluate()
            .unwrap();
        assert_eq!(summary_of(&warn), "1.00 (warn/crit at 0.50/2.00)");
    }

    #[test]
    fn test_predictive_without_levels() {
        let outputs = check_levels(5.0)
            .upper(Levels::predictive("load1", Some(4.0), None))
            .metric("load1")
            .evaluate()
            .unwrap();
        assert_eq!(state_of(&outputs), State::Ok);
        assert_eq!(summary_of(&outputs), "5.00 (prediction: 4.00)");
        assert_eq!(outputs.len(), 3);
        let prediction = outputs[2].as_metric().unwrap();
        assert_eq!(prediction.name(), "predict_load1");
        assert_eq!(prediction.value(), 4.0);
    }

    #[test]
    fn test_predictive_with_levels() {
        let outputs = check_levels(9.0)
            .upper(Levels::predictive("load1", Some(4.0), Some((6.0, 8.0))))
            .lower(Levels::predictive("load1", Some(4.0), Some((2.0, 1.0))))
            .metric("load1")
            .evaluate()
            .unwrap();
        assert_eq!(state_of(&outputs), State::Crit);
        assert_eq!(
            summary_of(&outputs),
            "9.00 (prediction: 4.00) (warn/crit at 6.00/8.00) (prediction: 4.00)"
        );
        let names: Vec<_> = outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .map(Metric::name)
            .collect();
        assert_eq!(names, ["load1", "predict_load1", "predict_lower_load1"]);
        assert_eq!(outputs[1].as_metric().unwrap().levels(), Some((6.0, 8.0)));
    }

    #[test]
    fn test_predictive_without_reference() {
        let outputs = check_levels(5.0)
            .upper(Levels::predictive("load1", None, None))
            .evaluate()
            .unwrap();
        assert_eq!(summary_of(&outputs), "5.00 (no reference for prediction yet)");
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_invalid_metric_name() {
        let err = check_levels(1.0).metric("bad name").evaluate().unwrap_err();
        assert!(matches!(err, OutputError::InvalidMetricName(_)));
    }

    #[test]
    fn test_non_finite_boundary_is_rejected() {
        let err = check_levels(1.0)
            .metric("load1")
            .boundaries(Some(0.0), Some(f64::INFINITY))
            .evaluate()
            .unwrap_err();
        assert!(matches!(err, OutputError::NonFinite { what: "upper boundary", .. }));
    }

    #[test]
    fn test_levels_from_parameters() {
        let parse = |v: Value| Levels::try_from(&v);
        assert_eq!(parse(json!(["fixed", [80, 90]])), Ok(Levels::fixed(80.0, 90.0)));
        assert_eq!(parse(json!([80.0, 90.0])), Ok(Levels::fixed(80.0, 90.0)));
        assert_eq!(parse(json!(["no_levels", null])), Ok(Levels::NoLevels));
        assert_eq!(parse(Value::Null), Ok(Levels::NoLevels));
        assert_eq!(
            parse(json!(["predictive", ["mem_used", 50.0, [60.0, 70.0]]])),
            Ok(Levels::predictive("mem_used", Some(50.0), Some((60.0, 70.0))))
        );
        assert_eq!(
            parse(json!(["predictive", ["mem_used", null, null]])),
            Ok(Levels::predictive("mem_used", None, None))
        );
        assert!(parse(json!(["bogus", [1, 2]])).is_err());
        assert!(parse(json!("fixed")).is_err());
        assert!(parse(json!(["fixed", [1]])).is_err());
    }

    #[test]
    fn test_levels_deserialize() {
        let levels: Levels = serde_json::from_value(json!(["fixed", [1.0, 2.0]])).unwrap();
        assert_eq!(levels.thresholds(), Some((1.0, 2.0)));
    }
}
