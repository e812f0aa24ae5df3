//! Engine configuration.
//!
//! Loaded from a TOML file, with `CHECKENGINE__*` environment variables
//! overriding individual keys (for example `CHECKENGINE__DEBUG=true`).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::{ParameterRule, Rules};

fn default_value_store() -> PathBuf {
    PathBuf::from("counters.json")
}

fn default_autochecks_dir() -> PathBuf {
    PathBuf::from("autochecks")
}

/// Runtime configuration of the check engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// File the value store is loaded from and saved to.
    #[serde(default = "default_value_store")]
    pub value_store: PathBuf,

    /// Directory holding one autochecks file per host.
    #[serde(default = "default_autochecks_dir")]
    pub autochecks_dir: PathBuf,

    /// Propagate plugin failures instead of degrading the affected service.
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub check_parameters: Vec<ParameterRule>,

    #[serde(default)]
    pub discovery_parameters: Vec<ParameterRule>,

    /// Cluster name to node names.
    #[serde(default)]
    pub clusters: BTreeMap<String, Vec<String>>,

    /// Time periods considered active when resolving time-specific parameters.
    #[serde(default)]
    pub active_timeperiods: BTreeSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            value_store: default_value_store(),
            autochecks_dir: default_autochecks_dir(),
            debug: false,
            check_parameters: Vec::new(),
            discovery_parameters: Vec::new(),
            clusters: BTreeMap::new(),
            active_timeperiods: BTreeSet::new(),
        }
    }
}

impl EngineConfig {
    /// Load the configuration from `path` plus environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("CHECKENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// The autochecks file of `host`.
    pub fn autochecks_path(&self, host: &str) -> PathBuf {
        self.autochecks_dir.join(format!("{host}.json"))
    }

    pub fn check_rules(&self) -> Result<Rules, ConfigError> {
        Rules::compile(&self.check_parameters)
    }

    pub fn discovery_rules(&self) -> Result<Rules, ConfigError> {
        Rules::compile(&self.discovery_parameters)
    }
}
