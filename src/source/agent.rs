//! Parser for the agent's plain-text output.
//!
//! The output is a sequence of sections, each introduced by a header line
//! `<<<name>>>` optionally followed by `:option(value)` pairs, for example
//! `<<<df:sep(9)>>>`. Recognised options are `sep(N)`, the decimal code of
//! the column separator, and `nostrip()`. Other options are accepted and
//! ignored.
//!
//! Piggyback blocks (`<<<<host>>>>` .. `<<<<>>>>`) carry data for other
//! hosts and are skipped.

use checkengine_types::{SectionName, StringTable};
use tracing::warn;

use crate::sections::RawSections;

/// Header of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: SectionName,
    pub separator: Option<char>,
    pub nostrip: bool,
}

impl SectionHeader {
    /// Parse the text between `<<<` and `>>>`.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(':');
        let name = SectionName::new(parts.next()?).ok()?;

        let mut separator = None;
        let mut nostrip = false;
        for option in parts {
            let (key, value) = match option.split_once('(') {
                Some((key, rest)) => (key, rest.strip_suffix(')').unwrap_or(rest)),
                None => (option, ""),
            };
            match key {
                "sep" => separator = Some(char::from_u32(value.trim().parse().ok()?)?),
                "nostrip" => nostrip = true,
                _ => {}
            }
        }

        Some(Self {
            name,
            separator,
            nostrip,
        })
    }

    fn split_line(&self, line: &str) -> Vec<String> {
        let line = if self.nostrip { line } else { line.trim() };
        match self.separator {
            Some(sep) => line.split(sep).map(str::to_string).collect(),
            None => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

fn section_marker(line: &str) -> Option<&str> {
    line.strip_prefix("<<<")?.strip_suffix(">>>")
}

fn piggyback_marker(line: &str) -> Option<&str> {
    line.strip_prefix("<<<<")?.strip_suffix(">>>>")
}

enum ParserState {
    /// Outside any section, or inside one with an invalid header.
    Idle,
    Section(SectionHeader),
    Piggyback,
}

/// Split agent output into raw sections.
///
/// Sections that appear more than once are concatenated in order of
/// appearance. Blank lines are dropped.
pub fn parse_agent_output(text: &str) -> RawSections {
    let mut sections = RawSections::new();
    let mut state = ParserState::Idle;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(host) = piggyback_marker(trimmed) {
            state = if host.is_empty() {
                ParserState::Idle
            } else {
                ParserState::Piggyback
            };
            continue;
        }

        if let ParserState::Piggyback = state {
            continue;
        }

        if let Some(header) = section_marker(trimmed) {
            state = if header.is_empty() {
                ParserState::Idle
            } else {
                match SectionHeader::parse(header) {
                    Some(header) => {
                        sections.entry(header.name.clone()).or_default();
                        ParserState::Section(header)
                    }
                    None => {
                        warn!(header = %trimmed, "Ignoring section with invalid header");
                        ParserState::Idle
                    }
                }
            };
            continue;
        }

        if let ParserState::Section(header) = &state {
            let row = header.split_line(line);
            sections.entry(header.name.clone()).or_default().push(row);
        }
    }

    sections.retain(|_, table: &mut StringTable| !table.is_empty());
    sections
}
