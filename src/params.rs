//! Configured parameter rules and the parameter-merging contract.
//!
//! A check function sees, in increasing precedence: the plugin's default
//! parameters, the parameters stored at discovery time, and the values of
//! all matching rules of the plugin's check ruleset, where the first matching
//! rule wins per key. Rule values may be time specific; those are resolved
//! against the set of currently active time periods.

use std::collections::{BTreeMap, BTreeSet};

use checkengine_sdk::plugin::{DiscoveryParams, RuleSetType};
use checkengine_types::Parameters;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::register::CheckPlugin;

const TP_DEFAULT_VALUE: &str = "tp_default_value";
const TP_VALUES: &str = "tp_values";

/// One configured rule.
///
/// A rule applies to a host if `hosts` is empty or names the host, and to an
/// item if `items` is empty or one of the patterns matches the start of the
/// item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRule {
    pub ruleset: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
    pub value: Parameters,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    hosts: BTreeSet<String>,
    items: Vec<Regex>,
    value: Parameters,
}

impl CompiledRule {
    fn matches_host(&self, host: &str) -> bool {
        self.hosts.is_empty() || self.hosts.contains(host)
    }

    fn matches_item(&self, item: Option<&str>) -> bool {
        if self.items.is_empty() {
            return true;
        }
        item.is_some_and(|item| self.items.iter().any(|re| re.is_match(item)))
    }
}

/// Rules grouped by ruleset, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    rulesets: BTreeMap<String, Vec<CompiledRule>>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile item patterns. Patterns are anchored at the start of the item.
    pub fn compile(rules: &[ParameterRule]) -> Result<Self, ConfigError> {
        let mut rulesets: BTreeMap<String, Vec<CompiledRule>> = BTreeMap::new();
        for rule in rules {
            let items = rule
                .items
                .iter()
                .map(|pattern| {
                    Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
                        ConfigError::Pattern {
                            ruleset: rule.ruleset.clone(),
                            pattern: pattern.clone(),
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rulesets
                .entry(rule.ruleset.clone())
                .or_default()
                .push(CompiledRule {
                    hosts: rule.hosts.iter().cloned().collect(),
                    items,
                    value: rule.value.clone(),
                });
        }
        Ok(Self { rulesets })
    }

    /// Values of the rules of `ruleset` matching `host`, ignoring item conditions.
    pub fn host_values(&self, ruleset: &str, host: &str) -> Vec<&Parameters> {
        self.rulesets
            .get(ruleset)
            .into_iter()
            .flatten()
            .filter(|rule| rule.matches_host(host))
            .map(|rule| &rule.value)
            .collect()
    }

    /// Values of the rules of `ruleset` matching `host` and `item`.
    pub fn service_values(&self, ruleset: &str, host: &str, item: Option<&str>) -> Vec<&Parameters> {
        self.rulesets
            .get(ruleset)
            .into_iter()
            .flatten()
            .filter(|rule| rule.matches_host(host) && rule.matches_item(item))
            .map(|rule| &rule.value)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rulesets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve a time-specific value.
///
/// A value of the form `{"tp_default_value": {..}, "tp_values": [[period, {..}], ..]}`
/// becomes its default value updated with the values of all active periods,
/// the first listed period winning. Other values are returned unchanged.
pub fn resolve_timespecific(entry: &Parameters, active_periods: &BTreeSet<String>) -> Parameters {
    let Some(default) = entry.get(TP_DEFAULT_VALUE) else {
        return entry.clone();
    };
    let combined = Parameters::from_value(default.clone()).unwrap_or_default();
    let tp_values: Vec<(String, Parameters)> = entry
        .get_as(TP_VALUES)
        .ok()
        .flatten()
        .unwrap_or_default();

    tp_values
        .iter()
        .rev()
        .filter(|(period, _)| active_periods.contains(period))
        .fold(combined, |acc, (_, values)| acc.merged_with(values))
}

/// Parameters passed to the check function of `plugin` for one service.
///
/// Returns `None` for plugins without default check parameters; their
/// check functions take no parameters.
pub fn compute_check_parameters(
    plugin: &CheckPlugin,
    host: &str,
    item: Option<&str>,
    discovered: &Parameters,
    rules: &Rules,
    active_periods: &BTreeSet<String>,
) -> Option<Parameters> {
    let defaults = plugin.check_default_parameters.as_ref()?;
    let base = resolve_timespecific(&defaults.merged_with(discovered), active_periods);

    let entries = plugin
        .check_ruleset_name
        .as_ref()
        .map(|ruleset| rules.service_values(ruleset.as_str(), host, item))
        .unwrap_or_default();

    // Apply from last to first so the first matching rule wins
    Some(entries.into_iter().rev().fold(base, |acc, entry| {
        acc.merged_with(&resolve_timespecific(entry, active_periods))
    }))
}

/// Parameters passed to the discovery function of `plugin` on `host`.
///
/// `Merged` rulesets give the defaults updated with all matching rules, the
/// first rule winning per key. `All` rulesets give the value of every
/// matching rule followed by the defaults.
pub fn compute_discovery_parameters(
    plugin: &CheckPlugin,
    host: &str,
    rules: &Rules,
) -> Option<DiscoveryParams> {
    let defaults = plugin.discovery_default_parameters.as_ref()?;
    let values = plugin
        .discovery_ruleset_name
        .as_ref()
        .map(|ruleset| rules.host_values(ruleset.as_str(), host))
        .unwrap_or_default();

    Some(match plugin.discovery_ruleset_type {
        RuleSetType::Merged => DiscoveryParams::Merged(
            values
                .into_iter()
                .rev()
                .fold(defaults.clone(), |acc, value| acc.merged_with(value)),
        ),
        RuleSetType::All => DiscoveryParams::All(
            values
                .into_iter()
                .cloned()
                .chain(std::iter::once(defaults.clone()))
                .collect(),
        ),
    })
}
