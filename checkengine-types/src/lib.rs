//! # checkengine-types
//!
//! Core value types shared between check plugins and the check engine. Every
//! plugin receives and produces these types, and the engine aggregates them
//! into one result per service.
//!
//! ## Overview
//!
//! - [`State`]: the monitoring state of a result, ordered by severity
//! - [`CheckResult`]: one line of check output (summary or notice)
//! - [`Metric`]: a named measurement with optional levels and boundaries
//! - [`IgnoreResults`]: a marker that turns the whole check cycle stale
//! - [`CheckOutput`]: the closed set of things a check function may yield
//! - [`Service`]: a discovered service (item plus parameters)
//! - [`Parameters`]: an immutable parameter mapping
//! - Validated names: [`CheckPluginName`], [`SectionName`],
//!   [`ParsedSectionName`], [`RuleSetName`]
//!
//! ## Example
//!
//! ```rust
//! use checkengine_types::{CheckOutput, CheckResult, Metric, State};
//!
//! let outputs: Vec<CheckOutput> = vec![
//!     CheckResult::new(State::Ok, "Used: 70.00").unwrap().into(),
//!     Metric::new("mem_used", 70.0).unwrap().with_levels(80.0, 90.0).unwrap().into(),
//! ];
//!
//! let state = State::worst_of(outputs.iter().filter_map(CheckOutput::state));
//! assert_eq!(state, State::Ok);
//! ```

mod error;
mod metric;
mod name;
mod output;
mod params;
mod result;
mod service;
mod state;

pub use error::*;
pub use metric::*;
pub use name::*;
pub use output::*;
pub use params::*;
pub use result::*;
pub use service::*;
pub use state::*;

/// Raw section data as delivered by the agent: rows of whitespace-split words.
pub type StringTable = Vec<Vec<String>>;
