//! Plugin registration.
//!
//! Plugins are declared as specs ([`AgentSectionSpec`], [`CheckPluginSpec`]),
//! validated into plugins and stored in explicit registries that the caller
//! owns. Nothing is registered globally.

mod check_plugins;
mod sections;
mod validate;

pub use check_plugins::{derive_management_variant, CheckPlugin, CheckPluginRegistry};
pub use sections::{create_agent_section_plugin, AgentSectionPlugin, SectionRegistry};
pub use validate::{create_check_plugin, expected_signature};

use checkengine_sdk::plugin::{AgentSectionSpec, CheckPluginSpec};
use tracing::info;

use crate::error::RegistrationError;

/// Validate and register a set of plugin declarations.
///
/// Registration is all-or-nothing: the first invalid declaration aborts and
/// no registry is returned.
pub fn load_plugins(
    sections: impl IntoIterator<Item = AgentSectionSpec>,
    check_plugins: impl IntoIterator<Item = CheckPluginSpec>,
) -> Result<(SectionRegistry, CheckPluginRegistry), RegistrationError> {
    let mut section_registry = SectionRegistry::new();
    for spec in sections {
        section_registry.register(create_agent_section_plugin(spec)?)?;
    }

    let mut plugin_registry = CheckPluginRegistry::new();
    for spec in check_plugins {
        plugin_registry.register(create_check_plugin(spec)?)?;
    }

    info!(
        sections = section_registry.len(),
        check_plugins = plugin_registry.len(),
        "Loaded plugins"
    );
    Ok((section_registry, plugin_registry))
}
