//! Immutable check and discovery parameters.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ParameterError;

/// An immutable mapping of parameter names to JSON values.
///
/// Plugins receive parameters read-only; the engine builds them by merging
/// defaults, discovered parameters and configured rules.
///
/// # Example
///
/// ```rust
/// use checkengine_types::Parameters;
/// use serde_json::json;
///
/// let defaults = Parameters::from_value(json!({"levels": [80.0, 90.0], "average": 5}))
///     .unwrap();
/// let rule = Parameters::from_value(json!({"levels": [70.0, 80.0]})).unwrap();
///
/// let merged = defaults.merged_with(&rule);
/// assert_eq!(merged.get("levels"), Some(&json!([70.0, 80.0])));
/// assert_eq!(merged.get_as::<u32>("average").unwrap(), Some(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    /// Create empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create parameters from a JSON object. Returns `None` for other values.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map.into_iter().collect())),
            _ => None,
        }
    }

    /// Builder-style insertion, used when declaring defaults.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserialize a parameter into `T`. `Ok(None)` if it is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ParameterError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ParameterError::Invalid {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Like [`get_as`](Self::get_as), but a missing key is an error.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, ParameterError> {
        self.get_as(key)?
            .ok_or_else(|| ParameterError::Missing(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// A copy of `self` with every key of `other` written on top.
    pub fn merged_with(&self, other: &Parameters) -> Parameters {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Parameters(merged)
    }

    /// The parameters as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
