//! Checking: run the check function of a discovered service.
//!
//! Every service ends in a [`ServiceOutcome`]. Whatever goes wrong inside a
//! plugin only affects that plugin's service: errors become an UNKNOWN
//! result, unless debug mode asks for them to be propagated.

mod result;

pub use result::{aggregate_results, ServiceCheckResult};

use std::collections::{BTreeMap, BTreeSet};

use anyhow::anyhow;
use checkengine_sdk::plugin::{CheckArgs, ClusterCheckArgs, Sections};
use checkengine_sdk::{GetRateError, ValueStoreManager};
use checkengine_types::{CheckOutput, CheckPluginName, IgnoreResultsError, State};
use serde::Serialize;
use tracing::{debug, warn};

use crate::autochecks::AutocheckEntry;
use crate::error::{PluginError, SectionError};
use crate::params::{compute_check_parameters, Rules};
use crate::register::CheckPlugin;
use crate::sections::{HostKey, ParsedSectionsBroker, SourceType};

/// Everything a check needs besides the plugin and the service.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub rules: &'a Rules,
    pub value_store: &'a ValueStoreManager,
    pub active_periods: &'a BTreeSet<String>,
    /// Time of this check cycle, seconds since the Unix epoch.
    pub now: f64,
    /// Propagate plugin errors instead of turning them into UNKNOWN results.
    pub debug: bool,
}

/// How checking one service ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutcome {
    /// The check function ran; its aggregated result.
    Checked(ServiceCheckResult),
    /// None of the plugin's sections had data.
    Stale,
    /// The plugin asked to discard this cycle's results.
    Ignored { reason: String },
    /// No plugin is registered for the service.
    PluginMissing,
    /// The plugin failed.
    Failed { error: String },
}

impl ServiceOutcome {
    /// The result to show for this outcome.
    pub fn result(&self) -> ServiceCheckResult {
        match self {
            ServiceOutcome::Checked(result) => result.clone(),
            ServiceOutcome::Stale => ServiceCheckResult::received_no_data(),
            ServiceOutcome::Ignored { reason } => ServiceCheckResult::new(State::Ok, reason),
            ServiceOutcome::PluginMissing => ServiceCheckResult::not_implemented(),
            ServiceOutcome::Failed { error } => {
                ServiceCheckResult::new(State::Unknown, format!("Check failed: {error}"))
            }
        }
    }

    pub fn state(&self) -> State {
        match self {
            ServiceOutcome::Checked(result) => result.state,
            ServiceOutcome::Ignored { .. } => State::Ok,
            _ => State::Unknown,
        }
    }

    /// Whether the result replaces the service's current state.
    pub fn submit(&self) -> bool {
        matches!(
            self,
            ServiceOutcome::Checked(_) | ServiceOutcome::Failed { .. }
        )
    }

    /// Whether any data reached the plugin.
    pub fn data_received(&self) -> bool {
        !matches!(self, ServiceOutcome::Stale)
    }
}

/// One checked service, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReport {
    pub host: String,
    pub check_plugin_name: CheckPluginName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub description: String,
    pub submit: bool,
    pub result: ServiceCheckResult,
}

impl ServiceReport {
    pub fn new(
        host: &str,
        service: &AutocheckEntry,
        description: String,
        outcome: &ServiceOutcome,
    ) -> Self {
        Self {
            host: host.to_string(),
            check_plugin_name: service.check_plugin_name.clone(),
            item: service.item.clone(),
            description,
            submit: outcome.submit(),
            result: outcome.result(),
        }
    }
}

/// The reason to ignore this cycle's results, if `error` is an ignore signal.
fn ignore_reason(error: &anyhow::Error) -> Option<String> {
    error.chain().find_map(|cause| {
        if let Some(ignore) = cause.downcast_ref::<IgnoreResultsError>() {
            Some(ignore.to_string())
        } else {
            cause
                .downcast_ref::<GetRateError>()
                .filter(|e| e.is_not_enough_data())
                .map(ToString::to_string)
        }
    })
}

/// Turn the output of a check function into an outcome.
fn evaluate(
    plugin: &CheckPluginName,
    outputs: anyhow::Result<Vec<CheckOutput>>,
    debug: bool,
) -> Result<ServiceOutcome, PluginError> {
    let outputs = match outputs {
        Ok(outputs) => outputs,
        Err(error) => {
            if let Some(reason) = ignore_reason(&error) {
                return Ok(ignored(reason));
            }
            let error = PluginError::Function {
                plugin: plugin.clone(),
                source: error,
            };
            return fail(error, debug);
        }
    };

    match aggregate_results(outputs) {
        Ok(result) => Ok(ServiceOutcome::Checked(result)),
        Err(ignore) => Ok(ignored(ignore.0)),
    }
}

fn ignored(reason: String) -> ServiceOutcome {
    let reason = if reason.is_empty() {
        "No service summary available".to_string()
    } else {
        reason
    };
    ServiceOutcome::Ignored { reason }
}

fn fail(error: PluginError, debug: bool) -> Result<ServiceOutcome, PluginError> {
    if debug {
        return Err(error);
    }
    warn!(error = %error, "Check failed");
    Ok(ServiceOutcome::Failed {
        error: error.to_string(),
    })
}

/// Sections of `plugin` on `host`.
///
/// Plugins with a basic name may have been discovered on the management
/// board; if the host itself has no data, the management board is tried.
fn host_sections(
    plugin: &CheckPlugin,
    service_plugin: &CheckPluginName,
    host: &str,
    broker: &mut ParsedSectionsBroker<'_>,
) -> Result<Option<Sections>, SectionError> {
    let key = HostKey::for_plugin(host, service_plugin);
    let sections = broker.get_sections(&key, &plugin.sections)?;
    if sections.has_data() {
        return Ok(Some(sections));
    }
    if service_plugin.is_management_name() {
        return Ok(None);
    }
    let mgmt_key = HostKey::new(host, SourceType::Management);
    let sections = broker.get_sections(&mgmt_key, &plugin.sections)?;
    Ok(sections.has_data().then_some(sections))
}

/// Check one service of `host`.
///
/// `plugin` is the plugin registered under the service's plugin name, if any.
pub fn check_service(
    host: &str,
    plugin: Option<&CheckPlugin>,
    service: &AutocheckEntry,
    broker: &mut ParsedSectionsBroker<'_>,
    ctx: &CheckContext<'_>,
) -> Result<ServiceOutcome, PluginError> {
    let Some(plugin) = plugin else {
        return Ok(ServiceOutcome::PluginMissing);
    };

    let sections = match host_sections(plugin, &service.check_plugin_name, host, broker) {
        Ok(Some(sections)) => sections,
        Ok(None) => return Ok(ServiceOutcome::Stale),
        Err(e) => return fail(e.into(), ctx.debug),
    };

    let item = service.item.as_deref();
    let args = CheckArgs {
        item: service.item.clone(),
        params: compute_check_parameters(
            plugin,
            host,
            item,
            &service.parameters,
            ctx.rules,
            ctx.active_periods,
        ),
        sections,
        value_store: ctx.value_store.scope(host, &service.check_plugin_name, item),
        now: ctx.now,
    };

    debug!(host, plugin = %plugin.name, item = ?item, "Executing check");
    evaluate(&plugin.name, plugin.check(&args), ctx.debug)
}

/// Check one service of a cluster from the data of its nodes.
pub fn check_cluster_service(
    cluster: &str,
    nodes: &[String],
    plugin: Option<&CheckPlugin>,
    service: &AutocheckEntry,
    broker: &mut ParsedSectionsBroker<'_>,
    ctx: &CheckContext<'_>,
) -> Result<ServiceOutcome, PluginError> {
    let Some(plugin) = plugin else {
        return Ok(ServiceOutcome::PluginMissing);
    };

    let mut node_sections = BTreeMap::new();
    for node in nodes {
        match host_sections(plugin, &service.check_plugin_name, node, broker) {
            Ok(Some(sections)) => {
                node_sections.insert(node.clone(), sections);
            }
            Ok(None) => {}
            Err(e) => return fail(e.into(), ctx.debug),
        }
    }
    if node_sections.is_empty() {
        return Ok(ServiceOutcome::Stale);
    }

    let item = service.item.as_deref();
    let args = ClusterCheckArgs {
        item: service.item.clone(),
        params: compute_check_parameters(
            plugin,
            cluster,
            item,
            &service.parameters,
            ctx.rules,
            ctx.active_periods,
        ),
        node_sections,
        value_store: ctx.value_store.scope(cluster, &service.check_plugin_name, item),
        now: ctx.now,
    };

    debug!(cluster, plugin = %plugin.name, item = ?item, nodes = nodes.len(), "Executing cluster check");
    match plugin.cluster_check(&args) {
        Some(outputs) => evaluate(&plugin.name, outputs, ctx.debug),
        None => fail(
            PluginError::Function {
                plugin: plugin.name.clone(),
                source: anyhow!("this plugin does not support clustered services"),
            },
            ctx.debug,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{
        create_agent_section_plugin, create_check_plugin, CheckPluginRegistry, SectionRegistry,
    };
    use crate::sections::RawSections;
    use checkengine_sdk::plugin::{
        AgentSectionSpec, CheckFunction, CheckPluginSpec, ClusterCheckFunction, DiscoveryFunction,
        ParsedSection, Signature,
    };
    use checkengine_sdk::{get_rate, OnOverflow};
    use checkengine_types::{CheckResult, Parameters, SectionName, Service, StringTable};

    struct Fixture {
        sections: SectionRegistry,
        rules: Rules,
        value_store: ValueStoreManager,
        periods: BTreeSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut sections = SectionRegistry::new();
            let spec = AgentSectionSpec::new("counter", |t: &StringTable| {
                let value: f64 = t[0][0].parse()?;
                Ok(Some(ParsedSection::new(value)))
            });
            sections
                .register(create_agent_section_plugin(spec).unwrap())
                .unwrap();
            Self {
                sections,
                rules: Rules::new(),
                value_store: ValueStoreManager::new(),
                periods: BTreeSet::new(),
            }
        }

        fn ctx(&self, now: f64, debug: bool) -> CheckContext<'_> {
            CheckContext {
                rules: &self.rules,
                value_store: &self.value_store,
                active_periods: &self.periods,
                now,
                debug,
            }
        }
    }

    fn raw(value: &str) -> RawSections {
        RawSections::from([(
            SectionName::new("counter").unwrap(),
            vec![vec![value.to_string()]],
        )])
    }

    fn plugin_with(check: impl Fn(&CheckArgs) -> anyhow::Result<Vec<CheckOutput>> + Send + Sync + 'static) -> CheckPlugin {
        let spec = CheckPluginSpec::new(
            "counter",
            "Counter",
            DiscoveryFunction::new(Signature::new().section(), |_| Ok(vec![Service::new()])),
            CheckFunction::new(Signature::new().params().section(), check),
        )
        .check_default_parameters(Parameters::new().with("warn", 100.0))
        .check_ruleset_name("counter");
        create_check_plugin(spec).unwrap()
    }

    fn rate_plugin() -> CheckPlugin {
        plugin_with(|args: &CheckArgs| {
            let value = args.sections.first::<f64>()?.copied().unwrap_or_default();
            let rate = get_rate(&args.value_store, "counter", args.now, value, OnOverflow::Raise)?;
            let warn: f64 = args.params().require("warn")?;
            let state = if rate >= warn { State::Warn } else { State::Ok };
            Ok(vec![CheckResult::new(state, format!("Rate: {rate:.2}/s"))?.into()])
        })
    }

    fn entry(name: &str) -> AutocheckEntry {
        AutocheckEntry::new(CheckPluginName::new(name).unwrap(), Service::new())
    }

    #[test]
    fn test_rate_check_over_two_cycles() {
        let fixture = Fixture::new();
        let plugin = rate_plugin();
        let service = entry("counter");

        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("1000"));
        let first = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(100.0, false))
            .unwrap();
        assert!(matches!(first, ServiceOutcome::Ignored { .. }));
        assert!(!first.submit());
        assert_eq!(first.state(), State::Ok);

        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("6000"));
        let second = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(110.0, false))
            .unwrap();
        let ServiceOutcome::Checked(result) = &second else {
            panic!("expected a result, got {second:?}");
        };
        assert_eq!(result.state, State::Warn);
        assert_eq!(result.summary, "Rate: 500.00/s");
        assert!(second.submit());
    }

    #[test]
    fn test_non_finite_counter_fails_instead_of_reinitializing() {
        let fixture = Fixture::new();
        let plugin = rate_plugin();
        let service = entry("counter");

        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("1000"));
        let _ = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(100.0, false));

        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("NaN"));
        let outcome = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(110.0, false))
            .unwrap();
        assert!(matches!(&outcome, ServiceOutcome::Failed { error } if error.contains("Invalid observation")));
        assert!(outcome.submit());

        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("2000"));
        let outcome = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(120.0, false))
            .unwrap();
        assert_eq!(outcome.result().summary, "Rate: 50.00/s");
    }

    #[test]
    fn test_missing_plugin_and_missing_data() {
        let fixture = Fixture::new();
        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        let service = entry("counter");

        let missing = check_service("h", None, &service, &mut broker, &fixture.ctx(0.0, false)).unwrap();
        assert_eq!(missing, ServiceOutcome::PluginMissing);
        assert!(!missing.submit());
        assert_eq!(missing.result().summary, "Check plugin not implemented");

        let plugin = rate_plugin();
        let stale = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert_eq!(stale, ServiceOutcome::Stale);
        assert!(!stale.submit());
        assert!(!stale.data_received());
        assert_eq!(stale.result().summary, "Check plugin received no monitoring data");
        assert_eq!(stale.state(), State::Unknown);
    }

    #[test]
    fn test_failures_are_isolated_unless_debugging() {
        let fixture = Fixture::new();
        let plugin = plugin_with(|_| anyhow::bail!("division by zero"));
        let service = entry("counter");
        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("1"));

        let outcome = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert!(matches!(&outcome, ServiceOutcome::Failed { error } if error.contains("division by zero")));
        assert!(outcome.submit());
        assert_eq!(outcome.state(), State::Unknown);

        let err = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, true))
            .unwrap_err();
        assert!(matches!(err, PluginError::Function { .. }));
    }

    #[test]
    fn test_parse_errors_fail_the_service() {
        let fixture = Fixture::new();
        let plugin = rate_plugin();
        let service = entry("counter");
        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("not-a-number"));

        let outcome = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert!(matches!(&outcome, ServiceOutcome::Failed { error } if error.contains("section counter")));
    }

    #[test]
    fn test_empty_output_is_item_not_found() {
        let fixture = Fixture::new();
        let plugin = plugin_with(|_| Ok(vec![]));
        let service = entry("counter");
        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("1"));

        let outcome = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert_eq!(outcome, ServiceOutcome::Checked(ServiceCheckResult::item_not_found()));
        assert!(outcome.submit());
    }

    #[test]
    fn test_ignore_results_error_from_plugin() {
        let fixture = Fixture::new();
        let plugin = plugin_with(|_| Err(IgnoreResultsError(String::new()).into()));
        let service = entry("counter");
        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("1"));

        let outcome = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, true))
            .unwrap();
        assert_eq!(
            outcome,
            ServiceOutcome::Ignored {
                reason: "No service summary available".to_string()
            }
        );
    }

    #[test]
    fn test_management_variant_reads_management_data() {
        let fixture = Fixture::new();
        let mut registry = CheckPluginRegistry::new();
        registry.register(rate_plugin()).unwrap();
        let mgmt_name = CheckPluginName::new("mgmt_counter").unwrap();
        let derived = registry.get_check_plugin(&mgmt_name).unwrap();
        let plugin: &CheckPlugin = &derived;
        let service = entry("mgmt_counter");

        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Host), raw("1"));
        let outcome = check_service("h", Some(plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert_eq!(outcome, ServiceOutcome::Stale);

        broker.add_raw_sections(HostKey::new("h", SourceType::Management), raw("1"));
        let outcome = check_service("h", Some(plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert!(matches!(outcome, ServiceOutcome::Ignored { .. }));
    }

    #[test]
    fn test_basic_plugin_falls_back_to_management_data() {
        let fixture = Fixture::new();
        let plugin = rate_plugin();
        let service = entry("counter");
        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("h", SourceType::Management), raw("1"));

        let outcome = check_service("h", Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert!(matches!(outcome, ServiceOutcome::Ignored { .. }));
    }

    #[test]
    fn test_cluster_check() {
        let fixture = Fixture::new();
        let spec = CheckPluginSpec::new(
            "counter",
            "Counter",
            DiscoveryFunction::new(Signature::new().section(), |_| Ok(vec![Service::new()])),
            CheckFunction::new(Signature::new().section(), |_| Ok(vec![])),
        )
        .cluster_check_function(ClusterCheckFunction::new(
            Signature::new().section(),
            |args: &ClusterCheckArgs| {
                let values = args.first_section::<f64>()?;
                let total: f64 = values.values().copied().sum();
                Ok(vec![CheckResult::new(
                    State::Ok,
                    format!("Total: {total:.0} on {} nodes", values.len()),
                )?
                .into()])
            },
        ));
        let plugin = create_check_plugin(spec).unwrap();
        let nodes = vec!["n1".to_string(), "n2".to_string(), "n3".to_string()];
        let service = entry("counter");

        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("n1", SourceType::Host), raw("3"));
        broker.add_raw_sections(HostKey::new("n2", SourceType::Host), raw("4"));

        let outcome = check_cluster_service("c", &nodes, Some(&plugin), &service, &mut broker, &fixture.ctx(0.0, false))
            .unwrap();
        assert_eq!(outcome.result().summary, "Total: 7 on 2 nodes");

        let stale = check_cluster_service(
            "c",
            &["n3".to_string()],
            Some(&plugin),
            &service,
            &mut broker,
            &fixture.ctx(0.0, false),
        )
        .unwrap();
        assert_eq!(stale, ServiceOutcome::Stale);
    }

    #[test]
    fn test_cluster_check_without_cluster_function() {
        let fixture = Fixture::new();
        let plugin = rate_plugin();
        let service = entry("counter");
        let mut broker = ParsedSectionsBroker::new(&fixture.sections);
        broker.add_raw_sections(HostKey::new("n1", SourceType::Host), raw("3"));

        let outcome = check_cluster_service(
            "c",
            &["n1".to_string()],
            Some(&plugin),
            &service,
            &mut broker,
            &fixture.ctx(0.0, false),
        )
        .unwrap();
        assert!(matches!(&outcome, ServiceOutcome::Failed { error } if error.contains("clustered")));
    }

    #[test]
    fn test_service_report() {
        let service = AutocheckEntry::new(
            CheckPluginName::new("counter").unwrap(),
            Service::with_item("x"),
        );
        let report = ServiceReport::new("h", &service, "Counter x".to_string(), &ServiceOutcome::Stale);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["description"], "Counter x");
        assert_eq!(json["submit"], false);
        assert_eq!(json["result"]["state"], "UNKNOWN");
    }
}
