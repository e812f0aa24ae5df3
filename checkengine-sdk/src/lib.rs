//! # checkengine-sdk
//!
//! The API check plugin authors write against. It provides:
//!
//! - [`plugin`]: declarations for section and check plugins
//! - [`ValueStoreManager`] / [`ValueStore`]: state that survives check cycles
//! - [`get_rate`] / [`get_average`]: counters and averages on top of the value store
//! - [`check_levels`]: threshold evaluation producing results and metrics
//! - [`render`]: human readable formatting of values
//!
//! ## Quick Start
//!
//! ```rust
//! use checkengine_sdk::{check_levels, get_rate, render, Levels, OnOverflow, ValueStore};
//!
//! let store = ValueStore::new();
//! let _ = get_rate(&store, "in_octets", 0.0, 0.0, OnOverflow::Raise);
//! let rate = get_rate(&store, "in_octets", 60.0, 7_500_000.0, OnOverflow::Raise).unwrap();
//!
//! let outputs = check_levels(rate)
//!     .upper(Levels::fixed(100_000.0, 200_000.0))
//!     .metric("if_in_octets")
//!     .render(render::networkbandwidth)
//!     .label("In")
//!     .evaluate()
//!     .unwrap();
//! assert_eq!(outputs.len(), 2);
//! ```

mod levels;
pub mod plugin;
mod rate;
pub mod render;
mod value_store;

pub use levels::*;
pub use rate::*;
pub use value_store::*;

// Re-export types for convenience
pub use checkengine_types::{
    CheckOutput, CheckPluginName, CheckResult, IgnoreResults, IgnoreResultsError, Metric,
    Parameters, Service, State, StringTable,
};
