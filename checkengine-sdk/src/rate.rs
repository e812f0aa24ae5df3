//! Rates and averages derived from successive observations.
//!
//! Both helpers keep their previous observation in a [`ValueStore`] under a
//! caller-chosen key. Keys only need to be unique within one service.

use checkengine_types::IgnoreResultsError;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::ValueStore;

/// What [`get_rate`] does when a counter decreases.
///
/// There is no default: whether a decrease means "wrapped" or "restarted"
/// depends on the counter, so every call site chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnOverflow {
    /// Fail with [`GetRateError::Overflow`].
    Raise,
    /// Take the new value as the baseline and report a rate of `0.0`.
    ResetAndContinue,
}

/// No rate can be computed this cycle.
///
/// Every variant except [`NonFinite`](Self::NonFinite) means "not enough
/// data yet", which the engine treats like [`IgnoreResultsError`]. See
/// [`is_not_enough_data`](Self::is_not_enough_data).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GetRateError {
    /// First observation for this key.
    #[error("Initialized: {key:?}")]
    Initialized { key: String },

    /// Two observations with the same timestamp.
    #[error("No time difference: {key:?}")]
    NoTimeDifference { key: String },

    /// The timestamp went backwards.
    #[error("Time anomaly: {key:?} (now {now} is before {last_time})")]
    TimeAnomaly {
        key: String,
        now: f64,
        last_time: f64,
    },

    /// The counter decreased and the caller asked to raise.
    #[error("Value overflow: {key:?} ({last_value} -> {value})")]
    Overflow {
        key: String,
        last_value: f64,
        value: f64,
    },

    /// The timestamp or the value is NaN or infinite. Nothing was stored.
    #[error("Invalid observation: {key:?} (time {now}, value {value})")]
    NonFinite { key: String, now: f64, value: f64 },
}

impl GetRateError {
    /// Whether the error only means that the next cycle can succeed.
    pub fn is_not_enough_data(&self) -> bool {
        !matches!(self, GetRateError::NonFinite { .. })
    }
}

impl From<GetRateError> for IgnoreResultsError {
    fn from(err: GetRateError) -> Self {
        IgnoreResultsError(err.to_string())
    }
}

/// Compute the per-second rate of a counter.
///
/// A finite observation `(now, value)` is always stored, so the next call has
/// a baseline even when this one fails. Non-finite observations are rejected
/// and leave the stored baseline alone.
///
/// # Example
///
/// ```rust
/// use checkengine_sdk::{get_rate, GetRateError, OnOverflow, ValueStore};
///
/// let store = ValueStore::new();
/// let first = get_rate(&store, "in_octets", 100.0, 1000.0, OnOverflow::Raise);
/// assert!(matches!(first, Err(GetRateError::Initialized { .. })));
///
/// let rate = get_rate(&store, "in_octets", 110.0, 3000.0, OnOverflow::Raise).unwrap();
/// assert_eq!(rate, 200.0);
/// ```
pub fn get_rate(
    store: &ValueStore,
    key: &str,
    now: f64,
    value: f64,
    on_overflow: OnOverflow,
) -> Result<f64, GetRateError> {
    if !now.is_finite() || !value.is_finite() {
        return Err(GetRateError::NonFinite {
            key: key.to_string(),
            now,
            value,
        });
    }

    let previous = store.get_as::<(f64, f64)>(key);
    store.set(key, json!([now, value]));

    let Some((last_time, last_value)) = previous else {
        return Err(GetRateError::Initialized {
            key: key.to_string(),
        });
    };

    let elapsed = now - last_time;
    if elapsed < 0.0 {
        return Err(GetRateError::TimeAnomaly {
            key: key.to_string(),
            now,
            last_time,
        });
    }
    if elapsed == 0.0 {
        return Err(GetRateError::NoTimeDifference {
            key: key.to_string(),
        });
    }

    let delta = value - last_value;
    if delta < 0.0 {
        return match on_overflow {
            OnOverflow::Raise => Err(GetRateError::Overflow {
                key: key.to_string(),
                last_value,
                value,
            }),
            OnOverflow::ResetAndContinue => Ok(0.0),
        };
    }

    Ok(delta / elapsed)
}

#[derive(Debug, Deserialize)]
struct AverageState {
    last_time: f64,
    average: f64,
}

/// Exponentially weighted moving average over a time horizon.
///
/// Observations older than `backlog_minutes` together carry half of the
/// weight. The first call returns `value` unchanged; a call whose timestamp
/// is not newer than the previous one returns the stored average. A NaN or
/// infinite observation is returned as is and leaves the stored average
/// untouched.
///
/// # Example
///
/// ```rust
/// use checkengine_sdk::{get_average, ValueStore};
///
/// let store = ValueStore::new();
/// assert_eq!(get_average(&store, "util", 0.0, 10.0, 1.0), 10.0);
/// // One minute later, with a one minute backlog: halfway to the new value
/// let avg = get_average(&store, "util", 60.0, 20.0, 1.0);
/// assert!((avg - 15.0).abs() < 1e-9);
/// ```
pub fn get_average(
    store: &ValueStore,
    key: &str,
    now: f64,
    value: f64,
    backlog_minutes: f64,
) -> f64 {
    if !now.is_finite() || !value.is_finite() {
        return value;
    }

    let Some(previous) = store.get_as::<AverageState>(key) else {
        store_average(store, key, now, value);
        return value;
    };

    if now <= previous.last_time {
        return previous.average;
    }

    let weight_per_minute = 0.5_f64.powf(1.0 / backlog_minutes.max(f64::MIN_POSITIVE));
    let weight = weight_per_minute.powf((now - previous.last_time) / 60.0);
    let average = previous.average * weight + value * (1.0 - weight);

    store_average(store, key, now, average);
    average
}

fn store_average(store: &ValueStore, key: &str, last_time: f64, average: f64) {
    store.set(key, json!({"last_time": last_time, "average": average}));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_never_returns_a_rate() {
        let store = ValueStore::new();
        let err = get_rate(&store, "c", 0.0, 42.0, OnOverflow::Raise).unwrap_err();
        assert_eq!(
            err,
            GetRateError::Initialized {
                key: "c".to_string()
            }
        );
        assert!(store.contains_key("c"));
    }

    #[test]
    fn test_rate_for_increasing_counter() {
        let store = ValueStore::new();
        let _ = get_rate(&store, "c", 0.0, 0.0, OnOverflow::Raise);
        assert_eq!(get_rate(&store, "c", 10.0, 50.0, OnOverflow::Raise), Ok(5.0));
        assert_eq!(get_rate(&store, "c", 20.0, 50.0, OnOverflow::Raise), Ok(0.0));
        assert_eq!(get_rate(&store, "c", 30.0, 150.0, OnOverflow::Raise), Ok(10.0));
    }

    #[test]
    fn test_rates_are_non_negative_for_monotone_counters() {
        let store = ValueStore::new();
        let samples = [(0.0, 5.0), (1.0, 5.0), (3.0, 9.0), (7.0, 100.0), (8.0, 100.5)];
        for (i, (now, value)) in samples.into_iter().enumerate() {
            let rate = get_rate(&store, "c", now, value, OnOverflow::Raise);
            if i == 0 {
                assert!(rate.is_err());
            } else {
                assert!(rate.unwrap() >= 0.0);
            }
        }
    }

    #[test]
    fn test_same_timestamp_is_no_time_difference() {
        let store = ValueStore::new();
        let _ = get_rate(&store, "c", 10.0, 1.0, OnOverflow::Raise);
        assert!(matches!(
            get_rate(&store, "c", 10.0, 2.0, OnOverflow::Raise),
            Err(GetRateError::NoTimeDifference { .. })
        ));
    }

    #[test]
    fn test_time_going_backwards() {
        let store = ValueStore::new();
        let _ = get_rate(&store, "c", 10.0, 1.0, OnOverflow::Raise);
        assert!(matches!(
            get_rate(&store, "c", 5.0, 2.0, OnOverflow::Raise),
            Err(GetRateError::TimeAnomaly { .. })
        ));
        // The anomalous sample became the new baseline
        assert_eq!(get_rate(&store, "c", 6.0, 4.0, OnOverflow::Raise), Ok(2.0));
    }

    #[test]
    fn test_overflow_raises() {
        let store = ValueStore::new();
        let _ = get_rate(&store, "c", 0.0, 100.0, OnOverflow::Raise);
        let err = get_rate(&store, "c", 10.0, 10.0, OnOverflow::Raise).unwrap_err();
        assert!(matches!(err, GetRateError::Overflow { .. }));
        assert!(err.to_string().starts_with("Value overflow"));
    }

    #[test]
    fn test_overflow_reset_and_continue() {
        let store = ValueStore::new();
        let _ = get_rate(&store, "c", 0.0, 100.0, OnOverflow::ResetAndContinue);
        assert_eq!(
            get_rate(&store, "c", 10.0, 10.0, OnOverflow::ResetAndContinue),
            Ok(0.0)
        );
        assert_eq!(
            get_rate(&store, "c", 20.0, 30.0, OnOverflow::ResetAndContinue),
            Ok(2.0)
        );
    }

    #[test]
    fn test_corrupt_entry_counts_as_first_observation() {
        let store = ValueStore::new();
        store.set("c", "garbage");
        assert!(matches!(
            get_rate(&store, "c", 0.0, 1.0, OnOverflow::Raise),
            Err(GetRateError::Initialized { .. })
        ));
    }

    #[test]
    fn test_non_finite_observation_keeps_baseline() {
        let store = ValueStore::new();
        let _ = get_rate(&store, "c", 0.0, 10.0, OnOverflow::Raise);

        let err = get_rate(&store, "c", 10.0, f64::NAN, OnOverflow::Raise).unwrap_err();
        assert!(matches!(err, GetRateError::NonFinite { .. }));
        assert!(!err.is_not_enough_data());
        assert!(matches!(
            get_rate(&store, "c", f64::INFINITY, 20.0, OnOverflow::Raise),
            Err(GetRateError::NonFinite { .. })
        ));

        assert_eq!(store.get("c"), Some(json!([0.0, 10.0])));
        assert_eq!(get_rate(&store, "c", 10.0, 30.0, OnOverflow::Raise), Ok(2.0));
    }

    #[test]
    fn test_rate_error_is_ignore_results() {
        let err: IgnoreResultsError = GetRateError::Initialized {
            key: "x".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Initialized: \"x\"");
    }

    #[test]
    fn test_average_skips_non_finite_values() {
        let store = ValueStore::new();
        get_average(&store, "a", 0.0, 10.0, 1.0);
        assert!(get_average(&store, "a", 60.0, f64::NAN, 1.0).is_nan());

        let avg = get_average(&store, "a", 60.0, 20.0, 1.0);
        assert!((avg - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_converges() {
        let store = ValueStore::new();
        assert_eq!(get_average(&store, "a", 0.0, 0.0, 5.0), 0.0);
        let mut last = 0.0;
        for minute in 1..=60 {
            let avg = get_average(&store, "a", f64::from(minute) * 60.0, 100.0, 5.0);
            assert!(avg > last);
            assert!(avg <= 100.0);
            last = avg;
        }
        assert!(last > 99.0);
    }

    #[test]
    fn test_average_ignores_stale_timestamps() {
        let store = ValueStore::new();
        get_average(&store, "a", 100.0, 10.0, 1.0);
        let avg = get_average(&store, "a", 160.0, 20.0, 1.0);
        assert_eq!(get_average(&store, "a", 160.0, 1000.0, 1.0), avg);
        assert_eq!(get_average(&store, "a", 50.0, 1000.0, 1.0), avg);
    }
}
