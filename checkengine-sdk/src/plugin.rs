//! Plugin declarations: what a plugin author hands to the engine.
//!
//! A plugin consists of plain functions plus metadata. Instead of inspecting
//! function parameters at runtime, each function carries a [`Signature`]
//! that declares which arguments it consumes. The engine validates the
//! declaration against the plugin's metadata when the plugin is registered.
//!
//! ## Example
//!
//! ```rust
//! use checkengine_sdk::plugin::{
//!     AgentSectionSpec, CheckFunction, CheckPluginSpec, DiscoveryFunction, ParsedSection,
//!     Signature,
//! };
//! use checkengine_types::{CheckResult, Service, State};
//!
//! let section = AgentSectionSpec::new("uptime", |table| {
//!     let seconds = table
//!         .first()
//!         .and_then(|row| row.first())
//!         .map(|word| word.parse::<f64>())
//!         .transpose()?;
//!     Ok(seconds.map(ParsedSection::new))
//! });
//!
//! let plugin = CheckPluginSpec::new(
//!     "uptime",
//!     "Uptime",
//!     DiscoveryFunction::new(Signature::new().section(), |_args| Ok(vec![Service::new()])),
//!     CheckFunction::new(Signature::new().section(), |args| {
//!         let Some(seconds) = args.sections.first::<f64>()? else {
//!             return Ok(vec![]);
//!         };
//!         Ok(vec![CheckResult::new(State::Ok, format!("Up since {seconds} s"))?.into()])
//!     }),
//! );
//! assert_eq!(plugin.name, "uptime");
//! ```

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use checkengine_types::{CheckOutput, Parameters, Service, StringTable};
use thiserror::Error;

use crate::ValueStore;

// ============================================================================
// Parsed sections
// ============================================================================

/// The output of a parse function, with its concrete type erased.
///
/// Each plugin knows the type its own parse function produces and gets it
/// back with [`downcast_ref`](Self::downcast_ref).
#[derive(Clone)]
pub struct ParsedSection(Arc<dyn Any + Send + Sync>);

impl ParsedSection {
    pub fn new<T: Any + Send + Sync>(section: T) -> Self {
        Self(Arc::new(section))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ParsedSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParsedSection(..)")
    }
}

/// A section was requested as a different type than its parse function produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("section {section:?} does not contain a {expected}")]
pub struct SectionTypeError {
    pub section: String,
    pub expected: &'static str,
}

/// The parsed sections handed to a plugin function, in subscription order.
///
/// Sections without data this cycle are present with no value; functions of
/// plugins that subscribe to several sections must cope with that.
#[derive(Debug, Clone, Default)]
pub struct Sections {
    entries: Vec<(String, Option<ParsedSection>)>,
}

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, section: Option<ParsedSection>) -> Self {
        self.insert(name, section);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, section: Option<ParsedSection>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = section,
            None => self.entries.push((name, section)),
        }
    }

    /// The section called `name`, if it has data.
    pub fn get<T: Any>(&self, name: &str) -> Result<Option<&T>, SectionTypeError> {
        let section = self
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, s)| s.as_ref());
        downcast(name, section)
    }

    /// The first subscribed section, for plugins that subscribe to exactly one.
    pub fn first<T: Any>(&self) -> Result<Option<&T>, SectionTypeError> {
        match self.entries.first() {
            Some((name, section)) => downcast(name, section.as_ref()),
            None => Ok(None),
        }
    }

    /// Whether at least one section has data.
    pub fn has_data(&self) -> bool {
        self.entries.iter().any(|(_, s)| s.is_some())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn downcast<'a, T: Any>(
    name: &str,
    section: Option<&'a ParsedSection>,
) -> Result<Option<&'a T>, SectionTypeError> {
    match section {
        None => Ok(None),
        Some(section) => section
            .downcast_ref::<T>()
            .map(Some)
            .ok_or_else(|| SectionTypeError {
                section: name.to_string(),
                expected: type_name::<T>(),
            }),
    }
}

// ============================================================================
// Function arguments
// ============================================================================

/// Declared arguments of a plugin function.
///
/// Arguments are declared in the order `item`, `params`, then sections.
/// A function consuming a single section declares [`section`](Self::section);
/// one consuming several declares [`section_named`](Self::section_named) for
/// each, in subscription order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    arguments: Vec<String>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(self) -> Self {
        self.arg("item")
    }

    pub fn params(self) -> Self {
        self.arg("params")
    }

    pub fn section(self) -> Self {
        self.arg("section")
    }

    pub fn section_named(self, name: &str) -> Self {
        self.arg(&format!("section_{name}"))
    }

    fn arg(mut self, name: &str) -> Self {
        self.arguments.push(name.to_string());
        self
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.arguments.join(", "))
    }
}

/// How discovery parameters from several matching rules are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetType {
    /// All matching rules are merged into one mapping; the first rule wins per key.
    #[default]
    Merged,
    /// Each matching rule yields its own mapping.
    All,
}

/// Parameters passed to a discovery function.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryParams {
    Merged(Parameters),
    All(Vec<Parameters>),
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryArgs {
    pub params: Option<DiscoveryParams>,
    pub sections: Sections,
}

impl DiscoveryArgs {
    /// The merged parameters of a `Merged` ruleset.
    pub fn merged_params(&self) -> Option<&Parameters> {
        match &self.params {
            Some(DiscoveryParams::Merged(params)) => Some(params),
            _ => None,
        }
    }

    /// Every parameter set of an `All` ruleset.
    pub fn all_params(&self) -> &[Parameters] {
        match &self.params {
            Some(DiscoveryParams::All(params)) => params,
            _ => &[],
        }
    }
}

/// Arguments passed to a check function.
#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
    pub item: Option<String>,
    pub params: Option<Parameters>,
    pub sections: Sections,
    /// This service's partition of the value store.
    pub value_store: ValueStore,
    /// Time of this check cycle, seconds since the Unix epoch.
    pub now: f64,
}

impl CheckArgs {
    /// The item; empty for item-less services.
    pub fn item(&self) -> &str {
        self.item.as_deref().unwrap_or_default()
    }

    /// The parameters; empty if the plugin has no default parameters.
    pub fn params(&self) -> Parameters {
        self.params.clone().unwrap_or_default()
    }
}

/// Arguments passed to a cluster check function.
#[derive(Debug, Clone, Default)]
pub struct ClusterCheckArgs {
    pub item: Option<String>,
    pub params: Option<Parameters>,
    /// Parsed sections per node.
    pub node_sections: BTreeMap<String, Sections>,
    pub value_store: ValueStore,
    pub now: f64,
}

impl ClusterCheckArgs {
    /// The section called `name` on every node that has data for it.
    pub fn section<T: Any>(&self, name: &str) -> Result<BTreeMap<&str, &T>, SectionTypeError> {
        let mut found = BTreeMap::new();
        for (node, sections) in &self.node_sections {
            if let Some(section) = sections.get::<T>(name)? {
                found.insert(node.as_str(), section);
            }
        }
        Ok(found)
    }

    /// Like [`section`](Self::section), for the first subscribed section.
    pub fn first_section<T: Any>(&self) -> Result<BTreeMap<&str, &T>, SectionTypeError> {
        let mut found = BTreeMap::new();
        for (node, sections) in &self.node_sections {
            if let Some(section) = sections.first::<T>()? {
                found.insert(node.as_str(), section);
            }
        }
        Ok(found)
    }
}

// ============================================================================
// Functions
// ============================================================================

/// A plugin function together with its declared signature.
pub struct PluginFunction<A, O> {
    signature: Signature,
    func: Arc<dyn Fn(&A) -> anyhow::Result<O> + Send + Sync>,
}

impl<A, O> PluginFunction<A, O> {
    pub fn new(
        signature: Signature,
        func: impl Fn(&A) -> anyhow::Result<O> + Send + Sync + 'static,
    ) -> Self {
        Self {
            signature,
            func: Arc::new(func),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, args: &A) -> anyhow::Result<O> {
        (self.func)(args)
    }

    /// Whether two handles point at the same function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl<A, O> Clone for PluginFunction<A, O> {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature.clone(),
            func: self.func.clone(),
        }
    }
}

/// Two handles are equal when they share the function and its declaration.
impl<A, O> PartialEq for PluginFunction<A, O> {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature && self.ptr_eq(other)
    }
}

impl<A, O> fmt::Debug for PluginFunction<A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginFunction{}", self.signature)
    }
}

pub type DiscoveryFunction = PluginFunction<DiscoveryArgs, Vec<Service>>;
pub type CheckFunction = PluginFunction<CheckArgs, Vec<CheckOutput>>;
pub type ClusterCheckFunction = PluginFunction<ClusterCheckArgs, Vec<CheckOutput>>;

/// Parses a raw string table. `Ok(None)` means "no data", which is not an error.
pub type ParseFunction =
    Arc<dyn Fn(&StringTable) -> anyhow::Result<Option<ParsedSection>> + Send + Sync>;

// ============================================================================
// Plugin specs
// ============================================================================

/// Declaration of an agent section plugin.
#[derive(Clone)]
pub struct AgentSectionSpec {
    pub name: String,
    /// Defaults to `name`.
    pub parsed_section_name: Option<String>,
    pub parse_function: ParseFunction,
    /// Raw sections this one takes precedence over when both are present.
    pub supersedes: Vec<String>,
}

impl AgentSectionSpec {
    pub fn new(
        name: impl Into<String>,
        parse_function: impl Fn(&StringTable) -> anyhow::Result<Option<ParsedSection>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parsed_section_name: None,
            parse_function: Arc::new(parse_function),
            supersedes: Vec::new(),
        }
    }

    pub fn parsed_section_name(mut self, name: impl Into<String>) -> Self {
        self.parsed_section_name = Some(name.into());
        self
    }

    pub fn supersedes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supersedes = names.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for AgentSectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSectionSpec")
            .field("name", &self.name)
            .field("parsed_section_name", &self.parsed_section_name)
            .field("supersedes", &self.supersedes)
            .finish_non_exhaustive()
    }
}

/// Declaration of a check plugin, before validation.
#[derive(Debug, Clone)]
pub struct CheckPluginSpec {
    pub name: String,
    /// Parsed sections to subscribe to. Defaults to `[name]`.
    pub sections: Option<Vec<String>>,
    /// Service name template; contains `%s` iff the plugin has items.
    pub service_name: String,
    pub discovery_function: DiscoveryFunction,
    pub discovery_default_parameters: Option<Parameters>,
    pub discovery_ruleset_name: Option<String>,
    pub discovery_ruleset_type: RuleSetType,
    pub check_function: CheckFunction,
    pub check_default_parameters: Option<Parameters>,
    pub check_ruleset_name: Option<String>,
    pub cluster_check_function: Option<ClusterCheckFunction>,
    /// Where the plugin was declared, for diagnostics.
    pub location: String,
    /// Set to `false` to skip argument validation for migrated plugins.
    pub validate_kwargs: bool,
}

impl CheckPluginSpec {
    pub fn new(
        name: impl Into<String>,
        service_name: impl Into<String>,
        discovery_function: DiscoveryFunction,
        check_function: CheckFunction,
    ) -> Self {
        Self {
            name: name.into(),
            sections: None,
            service_name: service_name.into(),
            discovery_function,
            discovery_default_parameters: None,
            discovery_ruleset_name: None,
            discovery_ruleset_type: RuleSetType::default(),
            check_function,
            check_default_parameters: None,
            check_ruleset_name: None,
            cluster_check_function: None,
            location: String::new(),
            validate_kwargs: true,
        }
    }

    pub fn sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections = Some(sections.into_iter().map(Into::into).collect());
        self
    }

    pub fn discovery_default_parameters(mut self, params: Parameters) -> Self {
        self.discovery_default_parameters = Some(params);
        self
    }

    pub fn discovery_ruleset(mut self, name: impl Into<String>, ruleset_type: RuleSetType) -> Self {
        self.discovery_ruleset_name = Some(name.into());
        self.discovery_ruleset_type = ruleset_type;
        self
    }

    pub fn check_default_parameters(mut self, params: Parameters) -> Self {
        self.check_default_parameters = Some(params);
        self
    }

    pub fn check_ruleset_name(mut self, name: impl Into<String>) -> Self {
        self.check_ruleset_name = Some(name.into());
        self
    }

    pub fn cluster_check_function(mut self, function: ClusterCheckFunction) -> Self {
        self.cluster_check_function = Some(function);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn skip_validation(mut self) -> Self {
        self.validate_kwargs = false;
        self
    }
}
