//! Service discovery.
//!
//! Discovery runs the discovery function of every plugin that may find
//! something in a host's data and collects the services they yield.

use std::collections::{BTreeMap, BTreeSet};

use checkengine_sdk::plugin::DiscoveryArgs;
use checkengine_types::{CheckPluginName, Service};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::autochecks::AutocheckEntry;
use crate::error::PluginError;
use crate::params::{compute_discovery_parameters, Rules};
use crate::register::{CheckPlugin, CheckPluginRegistry};
use crate::sections::{HostKey, ParsedSectionsBroker, SourceType};

/// Result of running one plugin's discovery.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    /// None of the plugin's sections had data; the function was not called.
    NoSectionData,
    /// The function ran and found nothing.
    NoServices,
    Services(Vec<Service>),
}

/// What to do when discovering a single plugin fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Abort host discovery with the error.
    Raise,
    /// Log the error and continue with the next plugin.
    #[default]
    Warn,
    /// Continue silently.
    Ignore,
}

/// Run the discovery function of `plugin` on `host`.
pub fn discover_plugin(
    plugin: &CheckPlugin,
    host: &str,
    broker: &mut ParsedSectionsBroker<'_>,
    rules: &Rules,
) -> Result<DiscoveryOutcome, PluginError> {
    let key = HostKey::for_plugin(host, &plugin.name);
    let sections = broker.get_sections(&key, &plugin.sections)?;
    if !sections.has_data() {
        return Ok(DiscoveryOutcome::NoSectionData);
    }

    let args = DiscoveryArgs {
        params: compute_discovery_parameters(plugin, host, rules),
        sections,
    };
    let services = plugin.discover(&args)?;
    debug!(host, plugin = %plugin.name, services = services.len(), "Discovery finished");

    if services.is_empty() {
        Ok(DiscoveryOutcome::NoServices)
    } else {
        Ok(DiscoveryOutcome::Services(services))
    }
}

/// Plugins worth running discovery for on `host`.
///
/// Host candidates are the plugins with a section available from the host
/// itself; management plugins are never host candidates. Management
/// candidates are the management variants of all plugins with a section
/// available from the management board.
pub fn find_candidates(
    host: &str,
    registry: &CheckPluginRegistry,
    broker: &ParsedSectionsBroker<'_>,
) -> BTreeSet<CheckPluginName> {
    let host_sections = broker.available_parsed_sections(&HostKey::new(host, SourceType::Host));
    let mgmt_sections =
        broker.available_parsed_sections(&HostKey::new(host, SourceType::Management));

    let mut candidates = BTreeSet::new();
    for plugin in registry.iter() {
        if !plugin.is_management() && plugin.sections.iter().any(|s| host_sections.contains(s)) {
            candidates.insert(plugin.name.clone());
        }
        if plugin.sections.iter().any(|s| mgmt_sections.contains(s)) {
            candidates.insert(plugin.name.create_management_name());
        }
    }
    candidates
}

/// Discover all services of `host`.
///
/// A service discovered twice by the same plugin keeps its first position
/// and its last parameters. A plugin yielding services with a wrong item
/// shape always fails the discovery; other plugin failures are handled
/// according to `on_error`.
pub fn discover_host(
    host: &str,
    registry: &CheckPluginRegistry,
    broker: &mut ParsedSectionsBroker<'_>,
    rules: &Rules,
    on_error: OnError,
) -> Result<Vec<AutocheckEntry>, PluginError> {
    let candidates = find_candidates(host, registry, broker);
    debug!(host, candidates = candidates.len(), "Executing discovery plugins");

    let mut entries: Vec<AutocheckEntry> = Vec::new();
    let mut positions: BTreeMap<(CheckPluginName, Option<String>), usize> = BTreeMap::new();

    for name in &candidates {
        let Some(plugin) = registry.get_check_plugin(name) else {
            warn!(host, plugin = %name, "Missing check plugin");
            continue;
        };

        let services = match discover_plugin(&plugin, host, broker, rules) {
            Ok(DiscoveryOutcome::Services(services)) => services,
            Ok(_) => continue,
            Err(e @ PluginError::ItemMismatch { .. }) => return Err(e),
            Err(e) => match on_error {
                OnError::Raise => return Err(e),
                OnError::Warn => {
                    warn!(host, plugin = %name, error = %e, "Discovery failed");
                    continue;
                }
                OnError::Ignore => continue,
            },
        };

        for service in services {
            let entry = AutocheckEntry::new(plugin.name.clone(), service);
            let id = (entry.check_plugin_name.clone(), entry.item.clone());
            match positions.get(&id) {
                Some(&index) => entries[index] = entry,
                None => {
                    positions.insert(id, entries.len());
                    entries.push(entry);
                }
            }
        }
    }

    info!(host, services = entries.len(), "Discovery complete");
    Ok(entries)
}
