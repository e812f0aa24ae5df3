//! Agent section plugins and their registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use checkengine_sdk::plugin::{AgentSectionSpec, ParseFunction, ParsedSection};
use checkengine_types::{ParsedSectionName, SectionName, StringTable};

use crate::error::{RegistrationError, SectionError, ValidationError};

/// A validated agent section plugin.
#[derive(Clone)]
pub struct AgentSectionPlugin {
    pub name: SectionName,
    pub parsed_section_name: ParsedSectionName,
    pub parse_function: ParseFunction,
    pub supersedes: BTreeSet<SectionName>,
}

impl AgentSectionPlugin {
    /// Parse a raw section. `Ok(None)` means the section carries no data.
    pub fn parse(&self, table: &StringTable) -> Result<Option<ParsedSection>, SectionError> {
        (self.parse_function)(table).map_err(|source| SectionError::Parse {
            section: self.name.clone(),
            source,
        })
    }

    /// Section plugin for raw sections nobody registered: hands the string
    /// table through unchanged.
    pub fn trivial(name: SectionName) -> Self {
        Self {
            parsed_section_name: name.clone().into(),
            name,
            parse_function: Arc::new(
                |table: &StringTable| -> anyhow::Result<Option<ParsedSection>> {
                    Ok(Some(ParsedSection::new(table.clone())))
                },
            ),
            supersedes: BTreeSet::new(),
        }
    }
}

impl fmt::Debug for AgentSectionPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSectionPlugin")
            .field("name", &self.name)
            .field("parsed_section_name", &self.parsed_section_name)
            .field("supersedes", &self.supersedes)
            .finish_non_exhaustive()
    }
}

/// Validate a section declaration.
pub fn create_agent_section_plugin(
    spec: AgentSectionSpec,
) -> Result<AgentSectionPlugin, ValidationError> {
    let name = SectionName::new(spec.name)?;
    let parsed_section_name = match spec.parsed_section_name {
        Some(parsed) => ParsedSectionName::new(parsed)?,
        None => name.clone().into(),
    };
    let supersedes = spec
        .supersedes
        .into_iter()
        .map(SectionName::new)
        .collect::<Result<BTreeSet<_>, _>>()?;
    if supersedes.contains(&name) {
        return Err(ValidationError::SupersedesItself {
            section: name.to_string(),
        });
    }

    Ok(AgentSectionPlugin {
        name,
        parsed_section_name,
        parse_function: spec.parse_function,
        supersedes,
    })
}

/// All registered section plugins, in registration order.
#[derive(Debug, Default)]
pub struct SectionRegistry {
    sections: Vec<AgentSectionPlugin>,
    index: BTreeMap<SectionName, usize>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: AgentSectionPlugin) -> Result<(), RegistrationError> {
        if self.index.contains_key(&plugin.name) {
            return Err(RegistrationError::DuplicateSection(plugin.name));
        }
        self.index.insert(plugin.name.clone(), self.sections.len());
        self.sections.push(plugin);
        Ok(())
    }

    pub fn get(&self, name: &SectionName) -> Option<&AgentSectionPlugin> {
        self.index.get(name).map(|&i| &self.sections[i])
    }

    /// Section plugins producing `parsed`, in registration order.
    pub fn producers<'a>(
        &'a self,
        parsed: &'a ParsedSectionName,
    ) -> impl Iterator<Item = &'a AgentSectionPlugin> + 'a {
        self.sections
            .iter()
            .filter(move |s| &s.parsed_section_name == parsed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentSectionPlugin> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
