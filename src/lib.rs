//! # checkengine
//!
//! The execution and discovery engine underneath check plugins.
//!
//! Check plugins parse raw agent output, compare numbers to thresholds and
//! format a one-line status. This crate runs them: it validates plugin
//! declarations, resolves raw sections into parsed sections, discovers the
//! services of a host and checks them, turning whatever a plugin yields into
//! one service state.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Engine                            │
//! │  ┌─────────┐    ┌──────────┐    ┌───────────┐   ┌────────┐  │
//! │  │ source  │───▶│ sections │───▶│ discovery │──▶│autochks│  │
//! │  │ (agent) │    │ (broker) │    └───────────┘   └───┬────┘  │
//! │  └─────────┘    └────┬─────┘    ┌───────────┐       │       │
//! │                      └─────────▶│ checking  │◀──────┘       │
//! │  ┌──────────┐  ┌────────┐       └─────┬─────┘               │
//! │  │ register │  │ params │──────────────┘                     │
//! │  └──────────┘  └────────┘                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`register`]**: plugin declarations, validation and the registries
//! - **[`source`]**: agent output parsing ([`parse_agent_output`], [`read_agent_output`])
//! - **[`sections`]**: the per-cycle [`ParsedSectionsBroker`]
//! - **[`params`]**: configured rules and parameter merging
//! - **[`discovery`]** and **[`checking`]**: the two phases
//! - **[`engine`]**: [`Engine`], tying it together for the binary
//!
//! ## Example
//!
//! ```
//! use checkengine::{load_plugins, Engine, EngineConfig, HostKey, SourceType};
//! use checkengine::parse_agent_output;
//!
//! let (sections, plugins) =
//!     load_plugins(checkengine_plugins::agent_sections(), checkengine_plugins::check_plugins())
//!         .unwrap();
//! let engine = Engine::new(sections, plugins, EngineConfig::default()).unwrap();
//!
//! let mut broker = engine.broker();
//! broker.add_raw_sections(
//!     HostKey::new("web01", SourceType::Host),
//!     parse_agent_output("<<<mem>>>\nused 70\ntotal 100\n"),
//! );
//! let services = engine.discover("web01", &mut broker).unwrap();
//! let reports = engine.check("web01", &services, &mut broker, 0.0).unwrap();
//! assert_eq!(reports[0].result.summary, "Used: 70.00");
//! ```

pub mod autochecks;
pub mod checking;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod params;
pub mod register;
pub mod sections;
pub mod source;

pub use autochecks::{load_autochecks, save_autochecks, AutocheckEntry};
pub use checking::{
    aggregate_results, check_cluster_service, check_service, CheckContext, ServiceCheckResult,
    ServiceOutcome, ServiceReport,
};
pub use config::EngineConfig;
pub use discovery::{discover_host, discover_plugin, find_candidates, DiscoveryOutcome, OnError};
pub use engine::Engine;
pub use error::{
    AutochecksError, ConfigError, FunctionKind, PluginError, RegistrationError, SectionError,
    SourceError, ValidationError,
};
pub use params::{
    compute_check_parameters, compute_discovery_parameters, resolve_timespecific, ParameterRule,
    Rules,
};
pub use register::{
    create_agent_section_plugin, create_check_plugin, derive_management_variant, load_plugins,
    AgentSectionPlugin, CheckPlugin, CheckPluginRegistry, SectionRegistry,
};
pub use sections::{HostKey, ParsedSectionsBroker, RawSections, SourceType};
pub use source::{parse_agent_output, read_agent_output, SectionHeader};
