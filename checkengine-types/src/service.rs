//! Discovered services.

use serde::{Deserialize, Serialize};

use crate::Parameters;

/// Placeholder for the item in a service name template.
pub const ITEM_PLACEHOLDER: &str = "%s";

/// A service found by a discovery function.
///
/// `item` is present exactly when the plugin's service name contains the
/// item placeholder; the engine checks this when discovery runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

impl Service {
    /// A service without an item.
    pub fn new() -> Self {
        Self::default()
    }

    /// A service for the given item.
    pub fn with_item(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            parameters: Parameters::new(),
        }
    }

    /// Attach discovered parameters.
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Render a service description from a template and an optional item.
pub fn service_description(service_name: &str, item: Option<&str>) -> String {
    match item {
        Some(item) => service_name.replacen(ITEM_PLACEHOLDER, item, 1),
        None => service_name.to_string(),
    }
}
