//! Raw and parsed sections of the hosts in one check cycle.
//!
//! The [`ParsedSectionsBroker`] holds the raw sections fetched for each host
//! and hands parsed sections to plugins. Parsing happens on first request
//! and is cached for the rest of the cycle.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use checkengine_sdk::plugin::{ParsedSection, Sections};
use checkengine_types::{CheckPluginName, ParsedSectionName, SectionName, StringTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SectionError;
use crate::register::{AgentSectionPlugin, SectionRegistry};

/// Where raw data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// The host's own agent.
    Host,
    /// The host's management board.
    Management,
}

/// Identifies the raw data of one host from one source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostKey {
    pub hostname: String,
    pub source_type: SourceType,
}

impl HostKey {
    pub fn new(hostname: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            hostname: hostname.into(),
            source_type,
        }
    }

    /// The key a plugin reads from: management plugins read the management board.
    pub fn for_plugin(hostname: &str, plugin: &CheckPluginName) -> Self {
        let source_type = if plugin.is_management_name() {
            SourceType::Management
        } else {
            SourceType::Host
        };
        Self::new(hostname, source_type)
    }
}

/// Raw sections of one host, keyed by section name.
pub type RawSections = BTreeMap<SectionName, StringTable>;

/// A parse outcome kept for the rest of the cycle.
#[derive(Debug, Clone)]
enum CachedSection {
    Parsed(Option<ParsedSection>),
    Failed { section: SectionName, message: String },
}

impl CachedSection {
    fn new(parsed: &Result<Option<ParsedSection>, SectionError>) -> Self {
        match parsed {
            Ok(parsed) => CachedSection::Parsed(parsed.clone()),
            Err(SectionError::Parse { section, source }) => CachedSection::Failed {
                section: section.clone(),
                message: format!("{source:#}"),
            },
        }
    }

    fn to_result(&self) -> Result<Option<ParsedSection>, SectionError> {
        match self {
            CachedSection::Parsed(parsed) => Ok(parsed.clone()),
            CachedSection::Failed { section, message } => Err(SectionError::Parse {
                section: section.clone(),
                source: anyhow::anyhow!("{message}"),
            }),
        }
    }
}

/// Resolves and caches parsed sections for one check cycle.
///
/// Parse failures are cached like results: a broken section is parsed once
/// and every subscriber gets the same error.
#[derive(Debug)]
pub struct ParsedSectionsBroker<'r> {
    registry: &'r SectionRegistry,
    raw: BTreeMap<HostKey, RawSections>,
    cache: HashMap<(HostKey, ParsedSectionName), CachedSection>,
}

impl<'r> ParsedSectionsBroker<'r> {
    pub fn new(registry: &'r SectionRegistry) -> Self {
        Self {
            registry,
            raw: BTreeMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Add raw sections for a host. Sections already present are replaced.
    pub fn add_raw_sections(&mut self, key: HostKey, sections: RawSections) {
        self.cache.retain(|(cached_key, _), _| cached_key != &key);
        self.raw.entry(key).or_default().extend(sections);
    }

    pub fn host_keys(&self) -> impl Iterator<Item = &HostKey> {
        self.raw.keys()
    }

    pub fn has_raw_data(&self, key: &HostKey) -> bool {
        self.raw.get(key).is_some_and(|sections| !sections.is_empty())
    }

    /// Section plugins with data for `key`, honoring `supersedes`.
    fn candidates(&self, key: &HostKey) -> Vec<Cow<'r, AgentSectionPlugin>> {
        let Some(raw) = self.raw.get(key) else {
            return Vec::new();
        };
        let registry: &'r SectionRegistry = self.registry;
        let with_data = |name: &SectionName| raw.get(name).is_some_and(|t| !t.is_empty());

        let mut candidates: Vec<Cow<'r, AgentSectionPlugin>> = registry
            .iter()
            .filter(|plugin| with_data(&plugin.name))
            .map(Cow::Borrowed)
            .collect();
        // Raw sections without a registered plugin pass through unparsed
        candidates.extend(
            raw.keys()
                .filter(|name| with_data(name) && registry.get(name).is_none())
                .map(|name| Cow::Owned(AgentSectionPlugin::trivial(name.clone()))),
        );

        let superseded: BTreeSet<SectionName> = candidates
            .iter()
            .flat_map(|plugin| plugin.supersedes.iter().cloned())
            .collect();
        candidates.retain(|plugin| !superseded.contains(&plugin.name));
        candidates
    }

    /// Parsed sections that could be produced for `key`, without parsing anything.
    pub fn available_parsed_sections(&self, key: &HostKey) -> BTreeSet<ParsedSectionName> {
        self.candidates(key)
            .into_iter()
            .map(|plugin| plugin.parsed_section_name.clone())
            .collect()
    }

    /// The parsed section `name` for `key`.
    ///
    /// The first producer in registration order with data wins. `Ok(None)`
    /// means there is no data, which is not an error.
    pub fn get_parsed_section(
        &mut self,
        key: &HostKey,
        name: &ParsedSectionName,
    ) -> Result<Option<ParsedSection>, SectionError> {
        let cache_key = (key.clone(), name.clone());
        if let Some(cached) = self.cache.get(&cache_key) {
            return cached.to_result();
        }

        let producer = self
            .candidates(key)
            .into_iter()
            .find(|plugin| &plugin.parsed_section_name == name);

        let parsed = match producer {
            None => Ok(None),
            Some(plugin) => {
                let empty = StringTable::new();
                let table = self
                    .raw
                    .get(key)
                    .and_then(|raw| raw.get(&plugin.name))
                    .unwrap_or(&empty);
                debug!(
                    host = %key.hostname,
                    section = %plugin.name,
                    parsed = %name,
                    rows = table.len(),
                    "Parsing section"
                );
                plugin.parse(table)
            }
        };
        if let Err(err) = &parsed {
            warn!(host = %key.hostname, error = %err, "Section could not be parsed");
        }

        self.cache.insert(cache_key, CachedSection::new(&parsed));
        parsed
    }

    /// The subscribed sections of a plugin, in subscription order.
    pub fn get_sections(
        &mut self,
        key: &HostKey,
        names: &[ParsedSectionName],
    ) -> Result<Sections, SectionError> {
        let mut sections = Sections::new();
        for name in names {
            let parsed = self.get_parsed_section(key, name)?;
            sections.insert(name.as_str(), parsed);
        }
        Ok(sections)
    }
}
