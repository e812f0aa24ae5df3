//! Metrics: named measurements attached to a service.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::OutputError;

/// A named measurement with optional warn/crit levels and boundaries.
///
/// Renders as a performance data token: `name=value;warn;crit;min;max`.
///
/// # Example
///
/// ```rust
/// use checkengine_types::Metric;
///
/// let metric = Metric::new("mem_used", 70.0)
///     .unwrap()
///     .with_levels(80.0, 90.0)
///     .unwrap()
///     .with_boundaries(Some(0.0), Some(100.0))
///     .unwrap();
/// assert_eq!(metric.to_string(), "mem_used=70;80;90;0;100");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    name: String,
    value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    levels: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boundaries: Option<(Option<f64>, Option<f64>)>,
}

impl Metric {
    /// Create a metric, validating its name and value.
    pub fn new(name: impl Into<String>, value: f64) -> Result<Self, OutputError> {
        let name = name.into();
        if name.is_empty()
            || name
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '=' | ';' | '\'' | '"'))
        {
            return Err(OutputError::InvalidMetricName(name));
        }
        check_finite(&name, "value", value)?;
        Ok(Self {
            name,
            value,
            levels: None,
            boundaries: None,
        })
    }

    /// Attach warn/crit levels.
    pub fn with_levels(mut self, warn: f64, crit: f64) -> Result<Self, OutputError> {
        check_finite(&self.name, "warn level", warn)?;
        check_finite(&self.name, "crit level", crit)?;
        self.levels = Some((warn, crit));
        Ok(self)
    }

    /// Attach lower/upper boundaries; either side may be open.
    pub fn with_boundaries(
        mut self,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Self, OutputError> {
        if let Some(min) = min {
            check_finite(&self.name, "lower boundary", min)?;
        }
        if let Some(max) = max {
            check_finite(&self.name, "upper boundary", max)?;
        }
        self.boundaries = if min.is_none() && max.is_none() {
            None
        } else {
            Some((min, max))
        };
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn levels(&self) -> Option<(f64, f64)> {
        self.levels
    }

    pub fn boundaries(&self) -> Option<(Option<f64>, Option<f64>)> {
        self.boundaries
    }
}

fn check_finite(name: &str, what: &'static str, value: f64) -> Result<(), OutputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(OutputError::NonFinite {
            name: name.to_string(),
            what,
            value,
        })
    }
}

fn perf_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (warn, crit) = match self.levels {
            Some((warn, crit)) => (Some(warn), Some(crit)),
            None => (None, None),
        };
        let (min, max) = self.boundaries.unwrap_or((None, None));
        let token = format!(
            "{}={};{};{};{};{}",
            self.name,
            self.value,
            perf_value(warn),
            perf_value(crit),
            perf_value(min),
            perf_value(max),
        );
        f.write_str(token.trim_end_matches(';'))
    }
}
