//! Validation of check plugin declarations.
//!
//! Every rule here guards an assumption the runtime makes when it calls the
//! plugin's functions: which arguments they take, whether services carry an
//! item, and whether parameters can be configured.

use checkengine_sdk::plugin::{CheckPluginSpec, Signature};
use checkengine_types::{
    is_management_description, CheckPluginName, Parameters, ParsedSectionName, RuleSetName,
    ITEM_PLACEHOLDER,
};

use super::check_plugins::CheckPlugin;
use crate::error::{FunctionKind, ValidationError};

/// Validate a plugin declaration and build the plugin.
///
/// Name rules and service name rules always apply. Function signatures and
/// the pairing of default parameters with ruleset names are skipped when the
/// declaration opts out via `validate_kwargs`.
pub fn create_check_plugin(spec: CheckPluginSpec) -> Result<CheckPlugin, ValidationError> {
    let name = CheckPluginName::new(spec.name)?;
    let sections = match spec.sections {
        None => vec![ParsedSectionName::new(name.as_str())?],
        Some(sections) => sections
            .into_iter()
            .map(ParsedSectionName::new)
            .collect::<Result<Vec<_>, _>>()?,
    };
    validate_sections(&name, &sections)?;
    validate_service_name(&name, &spec.service_name)?;

    let discovery_ruleset_name = spec.discovery_ruleset_name.map(RuleSetName::new).transpose()?;
    let check_ruleset_name = spec.check_ruleset_name.map(RuleSetName::new).transpose()?;
    let requires_item = spec.service_name.contains(ITEM_PLACEHOLDER);

    if spec.validate_kwargs {
        validate_function_arguments(
            &name,
            FunctionKind::Discovery,
            spec.discovery_function.signature(),
            &sections,
            false,
            spec.discovery_default_parameters.is_some(),
        )?;
        validate_default_parameters(
            &name,
            FunctionKind::Discovery,
            spec.discovery_default_parameters.as_ref(),
            discovery_ruleset_name.as_ref(),
        )?;

        validate_function_arguments(
            &name,
            FunctionKind::Check,
            spec.check_function.signature(),
            &sections,
            requires_item,
            spec.check_default_parameters.is_some(),
        )?;
        validate_default_parameters(
            &name,
            FunctionKind::Check,
            spec.check_default_parameters.as_ref(),
            check_ruleset_name.as_ref(),
        )?;

        if let Some(cluster_check_function) = &spec.cluster_check_function {
            validate_function_arguments(
                &name,
                FunctionKind::ClusterCheck,
                cluster_check_function.signature(),
                &sections,
                requires_item,
                spec.check_default_parameters.is_some(),
            )?;
        }
    }

    Ok(CheckPlugin {
        name,
        sections,
        service_name: spec.service_name,
        discovery_function: spec.discovery_function,
        discovery_default_parameters: spec.discovery_default_parameters,
        discovery_ruleset_name,
        discovery_ruleset_type: spec.discovery_ruleset_type,
        check_function: spec.check_function,
        check_default_parameters: spec.check_default_parameters,
        check_ruleset_name,
        cluster_check_function: spec.cluster_check_function,
        location: spec.location,
    })
}

fn validate_sections(
    plugin: &CheckPluginName,
    sections: &[ParsedSectionName],
) -> Result<(), ValidationError> {
    if sections.is_empty() {
        return Err(ValidationError::NoSections {
            plugin: plugin.to_string(),
        });
    }
    for (i, section) in sections.iter().enumerate() {
        if sections[..i].contains(section) {
            return Err(ValidationError::DuplicateSection {
                plugin: plugin.to_string(),
                section: section.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_service_name(
    plugin: &CheckPluginName,
    service_name: &str,
) -> Result<(), ValidationError> {
    if service_name.is_empty() {
        return Err(ValidationError::EmptyServiceName {
            plugin: plugin.to_string(),
        });
    }
    if service_name.matches(ITEM_PLACEHOLDER).count() > 1 {
        return Err(ValidationError::MultipleItemPlaceholders {
            plugin: plugin.to_string(),
            service_name: service_name.to_string(),
        });
    }
    if plugin.is_management_name() != is_management_description(service_name) {
        return Err(ValidationError::ManagementMismatch {
            plugin: plugin.to_string(),
            service_name: service_name.to_string(),
        });
    }
    Ok(())
}

/// The arguments a function must declare: `item`, `params`, then sections.
pub fn expected_signature(
    sections: &[ParsedSectionName],
    has_item: bool,
    has_params: bool,
) -> Signature {
    let mut signature = Signature::new();
    if has_item {
        signature = signature.item();
    }
    if has_params {
        signature = signature.params();
    }
    match sections {
        [_] => signature.section(),
        sections => sections
            .iter()
            .fold(signature, |sig, section| sig.section_named(section.as_str())),
    }
}

fn validate_function_arguments(
    plugin: &CheckPluginName,
    function: FunctionKind,
    declared: &Signature,
    sections: &[ParsedSectionName],
    has_item: bool,
    has_params: bool,
) -> Result<(), ValidationError> {
    let expected = expected_signature(sections, has_item, has_params);
    if &expected != declared {
        return Err(ValidationError::SignatureMismatch {
            plugin: plugin.to_string(),
            function,
            expected,
            declared: declared.clone(),
        });
    }
    Ok(())
}

fn validate_default_parameters(
    plugin: &CheckPluginName,
    function: FunctionKind,
    defaults: Option<&Parameters>,
    ruleset: Option<&RuleSetName>,
) -> Result<(), ValidationError> {
    match (defaults, ruleset) {
        (Some(_), None) => Err(ValidationError::MissingRulesetName {
            plugin: plugin.to_string(),
            function,
        }),
        (None, Some(ruleset)) => Err(ValidationError::MissingDefaultParameters {
            plugin: plugin.to_string(),
            function,
            ruleset: ruleset.to_string(),
        }),
        _ => Ok(()),
    }
}
