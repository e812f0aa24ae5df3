//! Network interfaces: operational state and traffic.
//!
//! Agent section, one interface per line:
//!
//! ```text
//! <<<lnx_if>>>
//! eth0 up 1000000000 1234567 7654321
//! ```
//!
//! Columns are name, operational state, speed in bit/s, received and sent
//! octets. Traffic rates are derived from the octet counters, so the first
//! check after discovery reports nothing.

use std::collections::BTreeMap;

use checkengine_sdk::plugin::{
    AgentSectionSpec, CheckArgs, CheckFunction, CheckPluginSpec, ClusterCheckArgs,
    ClusterCheckFunction, DiscoveryArgs, DiscoveryFunction, ParsedSection, RuleSetType, Signature,
};
use checkengine_sdk::{check_levels, get_average, get_rate, render, Levels, OnOverflow, ValueStore};
use checkengine_types::{CheckOutput, CheckResult, Parameters, Service, State, StringTable};
use serde_json::json;

use crate::error::{number, ParseError};

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub oper_status: String,
    /// Bit/s, `0` when unknown.
    pub speed: f64,
    pub in_octets: f64,
    pub out_octets: f64,
}

/// Interfaces by name.
pub type Interfaces = BTreeMap<String, Interface>;

pub fn parse_interfaces(table: &StringTable) -> Result<Option<Interfaces>, ParseError> {
    if table.is_empty() {
        return Ok(None);
    }

    let mut interfaces = Interfaces::new();
    for row in table {
        let [name, oper_status, speed, in_octets, out_octets, ..] = row.as_slice() else {
            return Err(ParseError::MalformedLine(row.clone()));
        };
        interfaces.insert(
            name.clone(),
            Interface {
                oper_status: oper_status.clone(),
                speed: number("speed", speed)?,
                in_octets: number("in_octets", in_octets)?,
                out_octets: number("out_octets", out_octets)?,
            },
        );
    }
    Ok(Some(interfaces))
}

pub fn section() -> AgentSectionSpec {
    AgentSectionSpec::new("lnx_if", |table: &StringTable| {
        Ok(parse_interfaces(table)?.map(ParsedSection::new))
    })
    .parsed_section_name("interfaces")
}

pub fn check_plugin() -> CheckPluginSpec {
    CheckPluginSpec::new(
        "interfaces",
        "Interface %s",
        DiscoveryFunction::new(Signature::new().params().section(), discover_interfaces),
        CheckFunction::new(Signature::new().item().params().section(), check_interface),
    )
    .discovery_default_parameters(Parameters::new().with("discover_down", false))
    .discovery_ruleset("inventory_if_rules", RuleSetType::Merged)
    .check_default_parameters(Parameters::new().with("state", json!(["up"])))
    .check_ruleset_name("if")
    .cluster_check_function(ClusterCheckFunction::new(
        Signature::new().item().params().section(),
        cluster_check_interface,
    ))
    .location(module_path!())
}

/// Interfaces that are up, or all of them with `discover_down`. The state at
/// discovery time becomes the expected state.
fn discover_interfaces(args: &DiscoveryArgs) -> anyhow::Result<Vec<Service>> {
    let Some(interfaces) = args.sections.first::<Interfaces>()? else {
        return Ok(vec![]);
    };
    let discover_down = args
        .merged_params()
        .map(|params| params.get_as::<bool>("discover_down"))
        .transpose()?
        .flatten()
        .unwrap_or(false);

    Ok(interfaces
        .iter()
        .filter(|(_, iface)| discover_down || iface.oper_status == "up")
        .map(|(name, iface)| {
            Service::with_item(name.clone())
                .parameters(Parameters::new().with("state", json!([iface.oper_status])))
        })
        .collect())
}

fn check_interface(args: &CheckArgs) -> anyhow::Result<Vec<CheckOutput>> {
    let Some(interfaces) = args.sections.first::<Interfaces>()? else {
        return Ok(vec![]);
    };
    let Some(iface) = interfaces.get(args.item()) else {
        return Ok(vec![]);
    };
    evaluate(iface, &args.params(), &args.value_store, "", args.now)
}

/// A clustered interface is checked on the first node where it is in an
/// expected state, falling back to the first node that has it at all.
fn cluster_check_interface(args: &ClusterCheckArgs) -> anyhow::Result<Vec<CheckOutput>> {
    let item = args.item.as_deref().unwrap_or_default();
    let params = args.params.clone().unwrap_or_default();
    let expected = expected_states(&params)?;

    let candidates: Vec<(&str, &Interface)> = args
        .first_section::<Interfaces>()?
        .into_iter()
        .filter_map(|(node, interfaces)| interfaces.get(item).map(|iface| (node, iface)))
        .collect();
    let Some((node, iface)) = candidates
        .iter()
        .find(|(_, iface)| expected.contains(&iface.oper_status))
        .or_else(|| candidates.first())
    else {
        return Ok(vec![]);
    };

    let mut outputs: Vec<CheckOutput> =
        vec![CheckResult::new(State::Ok, format!("Node: {node}"))?.into()];
    outputs.extend(evaluate(iface, &params, &args.value_store, &format!("{node}."), args.now)?);
    Ok(outputs)
}

fn expected_states(params: &Parameters) -> anyhow::Result<Vec<String>> {
    Ok(params
        .get_as::<Vec<String>>("state")?
        .unwrap_or_else(|| vec!["up".to_string()]))
}

fn evaluate(
    iface: &Interface,
    params: &Parameters,
    store: &ValueStore,
    key_prefix: &str,
    now: f64,
) -> anyhow::Result<Vec<CheckOutput>> {
    let mut outputs = Vec::new();

    let state = if expected_states(params)?.contains(&iface.oper_status) {
        State::Ok
    } else {
        State::Crit
    };
    outputs.push(CheckResult::new(state, format!("Operational state: {}", iface.oper_status))?.into());
    if iface.speed > 0.0 {
        let speed = render::networkbandwidth(iface.speed / 8.0);
        outputs.push(CheckResult::new(State::Ok, format!("Speed: {speed}"))?.into());
    }

    // Both counters are stored before either error is returned.
    let in_rate = get_rate(
        store,
        &format!("{key_prefix}in_octets"),
        now,
        iface.in_octets,
        OnOverflow::ResetAndContinue,
    );
    let out_rate = get_rate(
        store,
        &format!("{key_prefix}out_octets"),
        now,
        iface.out_octets,
        OnOverflow::ResetAndContinue,
    );
    let (in_rate, out_rate) = (in_rate?, out_rate?);

    let levels: Levels = params.get_as("traffic_levels")?.unwrap_or_default();
    let average: Option<f64> = params.get_as("average")?;
    let max = (iface.speed > 0.0).then_some(iface.speed / 8.0);

    for (label, metric, rate) in [("In", "in", in_rate), ("Out", "out", out_rate)] {
        let rate = match average {
            Some(minutes) => {
                get_average(store, &format!("{key_prefix}{metric}_avg"), now, rate, minutes)
            }
            None => rate,
        };
        outputs.extend(
            check_levels(rate)
                .upper(levels.clone())
                .metric(metric)
                .render(render::networkbandwidth)
                .label(label)
                .boundaries(Some(0.0), max)
                .evaluate()?,
        );
    }
    Ok(outputs)
}
