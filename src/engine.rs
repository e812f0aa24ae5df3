//! The check engine: registries, configuration and value store in one place.

use std::path::Path;

use checkengine_sdk::{ValueStoreError, ValueStoreManager};
use tracing::{debug, info};

use crate::autochecks::AutocheckEntry;
use crate::checking::{
    check_cluster_service, check_service, CheckContext, ServiceOutcome, ServiceReport,
};
use crate::config::EngineConfig;
use crate::discovery::{discover_host, OnError};
use crate::error::{ConfigError, PluginError};
use crate::params::Rules;
use crate::register::{CheckPluginRegistry, SectionRegistry};
use crate::sections::ParsedSectionsBroker;

/// Owns everything that lives longer than one check cycle.
#[derive(Debug)]
pub struct Engine {
    sections: SectionRegistry,
    plugins: CheckPluginRegistry,
    config: EngineConfig,
    check_rules: Rules,
    discovery_rules: Rules,
    value_store: ValueStoreManager,
}

impl Engine {
    pub fn new(
        sections: SectionRegistry,
        plugins: CheckPluginRegistry,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            check_rules: config.check_rules()?,
            discovery_rules: config.discovery_rules()?,
            sections,
            plugins,
            config,
            value_store: ValueStoreManager::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn plugins(&self) -> &CheckPluginRegistry {
        &self.plugins
    }

    pub fn sections(&self) -> &SectionRegistry {
        &self.sections
    }

    pub fn value_store(&self) -> &ValueStoreManager {
        &self.value_store
    }

    /// A broker for one cycle.
    pub fn broker(&self) -> ParsedSectionsBroker<'_> {
        ParsedSectionsBroker::new(&self.sections)
    }

    pub fn load_value_store(&mut self, path: &Path) -> Result<(), ValueStoreError> {
        self.value_store = ValueStoreManager::load(path)?;
        debug!(path = %path.display(), scopes = self.value_store.len(), "Loaded value store");
        Ok(())
    }

    pub fn save_value_store(&self, path: &Path) -> Result<(), ValueStoreError> {
        self.value_store.save(path)
    }

    /// Discover the services of `host` from the data in `broker`.
    pub fn discover(
        &self,
        host: &str,
        broker: &mut ParsedSectionsBroker<'_>,
    ) -> Result<Vec<AutocheckEntry>, PluginError> {
        let on_error = if self.config.debug {
            OnError::Raise
        } else {
            OnError::Warn
        };
        discover_host(host, &self.plugins, broker, &self.discovery_rules, on_error)
    }

    /// Check the services of `host`. Clusters are checked from their nodes' data.
    pub fn check(
        &self,
        host: &str,
        services: &[AutocheckEntry],
        broker: &mut ParsedSectionsBroker<'_>,
        now: f64,
    ) -> Result<Vec<ServiceReport>, PluginError> {
        let ctx = CheckContext {
            rules: &self.check_rules,
            value_store: &self.value_store,
            active_periods: &self.config.active_timeperiods,
            now,
            debug: self.config.debug,
        };
        let nodes = self.config.clusters.get(host);

        let mut reports = Vec::with_capacity(services.len());
        for service in services {
            let plugin = self.plugins.get_check_plugin(&service.check_plugin_name);
            let outcome = match nodes {
                Some(nodes) => {
                    check_cluster_service(host, nodes, plugin.as_deref(), service, broker, &ctx)?
                }
                None => check_service(host, plugin.as_deref(), service, broker, &ctx)?,
            };

            let description = match &plugin {
                Some(plugin) => plugin.service_description(service.item.as_deref()),
                None => service.check_plugin_name.to_string(),
            };
            if let ServiceOutcome::Ignored { reason } = &outcome {
                debug!(host, service = %description, reason = %reason, "Results ignored");
            }
            reports.push(ServiceReport::new(host, service, description, &outcome));
        }

        let submitted = reports.iter().filter(|r| r.submit).count();
        info!(host, services = reports.len(), submitted, "Check cycle complete");
        Ok(reports)
    }
}
