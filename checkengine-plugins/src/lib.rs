//! # checkengine-plugins
//!
//! Section and check plugins bundled with the check engine.
//!
//! ## Plugins
//!
//! - **[`mem`]**: memory usage against upper levels (`mem_used`, "Memory")
//! - **[`interfaces`]**: per-interface state and traffic rates, with a
//!   cluster check (`interfaces`, "Interface %s")
//! - **[`uptime`]**: time since boot (`uptime`, "Uptime"), also available
//!   for management boards
//!
//! The functions below return declarations only. Validation and
//! registration happen in the engine:
//!
//! ```rust
//! let sections = checkengine_plugins::agent_sections();
//! let plugins = checkengine_plugins::check_plugins();
//! assert_eq!(sections.len(), plugins.len());
//! ```

pub mod error;
pub mod interfaces;
pub mod mem;
pub mod uptime;

pub use error::ParseError;

use checkengine_sdk::plugin::{AgentSectionSpec, CheckPluginSpec};

/// Every bundled agent section plugin.
pub fn agent_sections() -> Vec<AgentSectionSpec> {
    vec![mem::section(), interfaces::section(), uptime::section()]
}

/// Every bundled check plugin.
pub fn check_plugins() -> Vec<CheckPluginSpec> {
    vec![mem::check_plugin(), interfaces::check_plugin(), uptime::check_plugin()]
}
