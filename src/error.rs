//! Error types for the engine.

use std::fmt;
use std::path::PathBuf;

use checkengine_sdk::plugin::{SectionTypeError, Signature};
use checkengine_types::{CheckPluginName, NameError, SectionName};
use thiserror::Error;

/// Which plugin function a validation error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Discovery,
    Check,
    ClusterCheck,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FunctionKind::Discovery => "discovery",
            FunctionKind::Check => "check",
            FunctionKind::ClusterCheck => "cluster check",
        })
    }
}

/// A plugin declaration violates the plugin contract.
///
/// Raised when the plugin is created; an invalid plugin is never registered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid name: {0}")]
    Name(#[from] NameError),

    #[error("{plugin}: service name must not be empty")]
    EmptyServiceName { plugin: String },

    #[error("{plugin}: service name {service_name:?} must contain the item placeholder '%s' at most once")]
    MultipleItemPlaceholders { plugin: String, service_name: String },

    #[error(
        "{plugin}: service name {service_name:?} must start with \"Management Interface: \" \
         if and only if the plugin name starts with \"mgmt_\""
    )]
    ManagementMismatch { plugin: String, service_name: String },

    #[error("{plugin}: must subscribe to at least one section")]
    NoSections { plugin: String },

    #[error("{plugin}: subscribes to section {section} more than once")]
    DuplicateSection { plugin: String, section: String },

    #[error("{plugin}: {function} function must declare arguments {expected}, declared {declared}")]
    SignatureMismatch {
        plugin: String,
        function: FunctionKind,
        expected: Signature,
        declared: Signature,
    },

    #[error("{plugin}: default {function} parameters require a ruleset name")]
    MissingRulesetName { plugin: String, function: FunctionKind },

    #[error("{plugin}: {function} ruleset {ruleset} requires default parameters")]
    MissingDefaultParameters {
        plugin: String,
        function: FunctionKind,
        ruleset: String,
    },

    #[error("section {section}: cannot supersede itself")]
    SupersedesItself { section: String },
}

/// Registering a plugin failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("duplicate check plugin: {0}")]
    DuplicateCheckPlugin(CheckPluginName),

    #[error("duplicate section plugin: {0}")]
    DuplicateSection(SectionName),
}

/// A section could not be provided to a plugin.
#[derive(Debug, Error)]
pub enum SectionError {
    /// The parse function of a section failed.
    #[error("Parsing of section {section} failed: {source:#}")]
    Parse {
        section: SectionName,
        #[source]
        source: anyhow::Error,
    },
}

/// Running a plugin function failed.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A discovery function produced a service whose item does not fit the
    /// plugin's service name. This is a programming error in the plugin.
    #[error(
        "{plugin}: discovered {} for service name {service_name:?}",
        describe_item(.item)
    )]
    ItemMismatch {
        plugin: CheckPluginName,
        service_name: String,
        item: Option<String>,
    },

    #[error(transparent)]
    Section(#[from] SectionError),

    #[error(transparent)]
    SectionType(#[from] SectionTypeError),

    #[error("{plugin}: {source:#}")]
    Function {
        plugin: CheckPluginName,
        #[source]
        source: anyhow::Error,
    },
}

fn describe_item(item: &Option<String>) -> String {
    match item {
        Some(item) => format!("item {item:?}"),
        None => "no item".to_string(),
    }
}

/// Loading the configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid item pattern {pattern:?} in rule for {ruleset}: {source}")]
    Pattern {
        ruleset: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Reading agent output failed.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("agent output {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("agent output {path} holds no sections")]
    NoSections { path: PathBuf },
}

/// Reading or writing discovered services failed.
#[derive(Debug, Error)]
pub enum AutochecksError {
    #[error("autochecks {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("autochecks {path} are invalid: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
