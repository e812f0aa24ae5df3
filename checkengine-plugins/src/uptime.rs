//! System uptime.
//!
//! Management boards report the same section, which makes this plugin's
//! management variant (`mgmt_uptime`) available without further declaration.

use checkengine_sdk::plugin::{
    AgentSectionSpec, CheckArgs, CheckFunction, CheckPluginSpec, DiscoveryFunction, ParsedSection,
    Signature,
};
use checkengine_sdk::{check_levels, render};
use checkengine_types::{CheckOutput, Service, StringTable};

use crate::error::{number, ParseError};

/// Seconds since boot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uptime(pub f64);

pub fn parse_uptime(table: &StringTable) -> Result<Option<Uptime>, ParseError> {
    let Some(row) = table.first() else {
        return Ok(None);
    };
    let seconds = row.first().ok_or(ParseError::MissingField("seconds"))?;
    Ok(Some(Uptime(number("seconds", seconds)?)))
}

pub fn section() -> AgentSectionSpec {
    AgentSectionSpec::new("uptime", |table: &StringTable| {
        Ok(parse_uptime(table)?.map(ParsedSection::new))
    })
}

pub fn check_plugin() -> CheckPluginSpec {
    CheckPluginSpec::new(
        "uptime",
        "Uptime",
        DiscoveryFunction::new(Signature::new().section(), |_| Ok(vec![Service::new()])),
        CheckFunction::new(Signature::new().section(), check_uptime),
    )
    .location(module_path!())
}

fn check_uptime(args: &CheckArgs) -> anyhow::Result<Vec<CheckOutput>> {
    let Some(Uptime(seconds)) = args.sections.first::<Uptime>()?.copied() else {
        return Ok(vec![]);
    };
    Ok(check_levels(seconds)
        .render(render::timespan)
        .label("Uptime")
        .metric("uptime")
        .evaluate()?)
}
