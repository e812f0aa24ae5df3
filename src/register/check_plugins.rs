//! Validated check plugins and their registry.

use std::borrow::Cow;
use std::collections::BTreeMap;

use checkengine_sdk::plugin::{
    CheckArgs, CheckFunction, ClusterCheckArgs, ClusterCheckFunction, DiscoveryArgs,
    DiscoveryFunction, RuleSetType,
};
use checkengine_types::{
    service_description, CheckOutput, CheckPluginName, Parameters, ParsedSectionName,
    RuleSetName, Service, ITEM_PLACEHOLDER, MANAGEMENT_DESCR_PREFIX,
};
use tracing::debug;

use crate::error::{PluginError, RegistrationError};

/// A validated check plugin. Created by
/// [`create_check_plugin`](super::create_check_plugin).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckPlugin {
    pub name: CheckPluginName,
    pub sections: Vec<ParsedSectionName>,
    pub service_name: String,
    pub discovery_function: DiscoveryFunction,
    pub discovery_default_parameters: Option<Parameters>,
    pub discovery_ruleset_name: Option<RuleSetName>,
    pub discovery_ruleset_type: RuleSetType,
    pub check_function: CheckFunction,
    pub check_default_parameters: Option<Parameters>,
    pub check_ruleset_name: Option<RuleSetName>,
    pub cluster_check_function: Option<ClusterCheckFunction>,
    pub location: String,
}

impl CheckPlugin {
    /// Whether services of this plugin carry an item.
    pub fn requires_item(&self) -> bool {
        self.service_name.contains(ITEM_PLACEHOLDER)
    }

    pub fn is_management(&self) -> bool {
        self.name.is_management_name()
    }

    pub fn service_description(&self, item: Option<&str>) -> String {
        service_description(&self.service_name, item)
    }

    /// Run the discovery function.
    ///
    /// Every discovered service must carry an item exactly when the service
    /// name has a placeholder; anything else is a bug in the plugin and
    /// fails the whole discovery.
    pub fn discover(&self, args: &DiscoveryArgs) -> Result<Vec<Service>, PluginError> {
        let services = self
            .discovery_function
            .call(args)
            .map_err(|source| PluginError::Function {
                plugin: self.name.clone(),
                source,
            })?;

        let requires_item = self.requires_item();
        if let Some(bad) = services.iter().find(|s| s.item.is_some() != requires_item) {
            return Err(PluginError::ItemMismatch {
                plugin: self.name.clone(),
                service_name: self.service_name.clone(),
                item: bad.item.clone(),
            });
        }
        Ok(services)
    }

    /// Run the check function.
    pub fn check(&self, args: &CheckArgs) -> anyhow::Result<Vec<CheckOutput>> {
        self.check_function.call(args)
    }

    /// Run the cluster check function, if the plugin has one.
    pub fn cluster_check(&self, args: &ClusterCheckArgs) -> Option<anyhow::Result<Vec<CheckOutput>>> {
        self.cluster_check_function.as_ref().map(|f| f.call(args))
    }
}

/// Derive the management board variant of a plugin.
///
/// The variant shares sections and functions with the original; only the
/// name and service name change.
pub fn derive_management_variant(plugin: &CheckPlugin) -> CheckPlugin {
    let service_name = if plugin.is_management() {
        plugin.service_name.clone()
    } else {
        format!("{MANAGEMENT_DESCR_PREFIX}{}", plugin.service_name)
    };
    CheckPlugin {
        name: plugin.name.create_management_name(),
        service_name,
        ..plugin.clone()
    }
}

/// All registered check plugins.
#[derive(Debug, Default)]
pub struct CheckPluginRegistry {
    plugins: BTreeMap<CheckPluginName, CheckPlugin>,
}

impl CheckPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: CheckPlugin) -> Result<(), RegistrationError> {
        if self.plugins.contains_key(&plugin.name) {
            return Err(RegistrationError::DuplicateCheckPlugin(plugin.name));
        }
        debug!(plugin = %plugin.name, location = %plugin.location, "Registered check plugin");
        self.plugins.insert(plugin.name.clone(), plugin);
        Ok(())
    }

    /// Look up a plugin.
    ///
    /// Management names without a registered plugin of their own resolve to
    /// a variant derived from the basic plugin. Derived variants are built
    /// on every lookup and never stored.
    pub fn get_check_plugin(&self, name: &CheckPluginName) -> Option<Cow<'_, CheckPlugin>> {
        if let Some(plugin) = self.plugins.get(name) {
            return Some(Cow::Borrowed(plugin));
        }
        if !name.is_management_name() {
            return None;
        }
        let basic = name.create_basic_name().ok()?;
        self.plugins
            .get(&basic)
            .map(|plugin| Cow::Owned(derive_management_variant(plugin)))
    }

    pub fn contains(&self, name: &CheckPluginName) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckPlugin> {
        self.plugins.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &CheckPluginName> {
        self.plugins.keys()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
