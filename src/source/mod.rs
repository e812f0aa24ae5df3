//! Sources of raw agent data.
//!
//! The engine only consumes [`RawSections`]; how they were fetched is up to
//! the caller.

mod agent;
mod file;

pub use agent::{parse_agent_output, SectionHeader};
pub use file::read_agent_output;
