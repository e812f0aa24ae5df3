//! Memory usage.
//!
//! Agent section:
//!
//! ```text
//! <<<mem>>>
//! used 70
//! total 100
//! ```

use checkengine_sdk::plugin::{
    AgentSectionSpec, CheckArgs, CheckFunction, CheckPluginSpec, DiscoveryFunction, ParsedSection,
    Signature,
};
use checkengine_sdk::{check_levels, Levels};
use checkengine_types::{Parameters, Service, StringTable};
use serde_json::json;

use crate::error::{number, ParseError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Memory {
    pub used: f64,
    pub total: f64,
}

pub fn parse_mem(table: &StringTable) -> Result<Option<Memory>, ParseError> {
    if table.is_empty() {
        return Ok(None);
    }

    let mut used = None;
    let mut total = None;
    for row in table {
        let [key, value, ..] = row.as_slice() else {
            return Err(ParseError::MalformedLine(row.clone()));
        };
        match key.as_str() {
            "used" => used = Some(number(key, value)?),
            "total" => total = Some(number(key, value)?),
            _ => {}
        }
    }

    Ok(Some(Memory {
        used: used.ok_or(ParseError::MissingField("used"))?,
        total: total.ok_or(ParseError::MissingField("total"))?,
    }))
}

pub fn section() -> AgentSectionSpec {
    AgentSectionSpec::new("mem", |table: &StringTable| {
        Ok(parse_mem(table)?.map(ParsedSection::new))
    })
}

pub fn check_plugin() -> CheckPluginSpec {
    CheckPluginSpec::new(
        "mem_used",
        "Memory",
        DiscoveryFunction::new(Signature::new().section(), |args| {
            Ok(match args.sections.first::<Memory>()? {
                Some(_) => vec![Service::new()],
                None => vec![],
            })
        }),
        CheckFunction::new(Signature::new().params().section(), check_mem),
    )
    .sections(["mem"])
    .check_default_parameters(
        Parameters::new().with("levels_upper", json!(["fixed", [80.0, 90.0]])),
    )
    .check_ruleset_name("memory")
    .location(module_path!())
}

fn check_mem(args: &CheckArgs) -> anyhow::Result<Vec<checkengine_types::CheckOutput>> {
    let Some(memory) = args.sections.first::<Memory>()? else {
        return Ok(vec![]);
    };
    let levels: Levels = args.params().get_as("levels_upper")?.unwrap_or_default();

    Ok(check_levels(memory.used)
        .upper(levels)
        .metric("used")
        .label("Used")
        .boundaries(Some(0.0), Some(memory.total))
        .evaluate()?)
}
