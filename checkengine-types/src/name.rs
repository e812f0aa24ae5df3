//! Validated plugin, section and ruleset names.
//!
//! All names share one rule: non-empty, ASCII letters, digits and underscores
//! only. Check plugins that monitor a host's management board (IPMI, iLO,
//! iDRAC, ...) carry the reserved [`MANAGEMENT_NAME_PREFIX`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::NameError;

/// Name prefix of check plugins that run against the management board.
pub const MANAGEMENT_NAME_PREFIX: &str = "mgmt_";

/// Service description prefix of management board services.
pub const MANAGEMENT_DESCR_PREFIX: &str = "Management Interface: ";

fn validate(kind: &'static str, name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty { kind });
    }
    match name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        Some(invalid) => Err(NameError::InvalidCharacter {
            kind,
            name: name.to_string(),
            invalid,
        }),
        None => Ok(()),
    }
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a name, validating it.
            pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
                let name = name.into();
                validate($kind, &name)?;
                Ok(Self(name))
            }

            /// The name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = NameError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = NameError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> String {
                name.0
            }
        }
    };
}

validated_name!(
    /// Name of a check plugin.
    CheckPluginName,
    "check plugin name"
);

validated_name!(
    /// Name of a raw section as it appears in agent output (`<<<name>>>`).
    SectionName,
    "section name"
);

validated_name!(
    /// Name of a parsed section. Several raw sections may produce the same one.
    ParsedSectionName,
    "parsed section name"
);

validated_name!(
    /// Name of a ruleset that provides parameters.
    RuleSetName,
    "ruleset name"
);

impl CheckPluginName {
    /// Whether this plugin runs against the management board.
    pub fn is_management_name(&self) -> bool {
        self.0.starts_with(MANAGEMENT_NAME_PREFIX)
    }

    /// The management variant of this name. Idempotent.
    pub fn create_management_name(&self) -> CheckPluginName {
        if self.is_management_name() {
            return self.clone();
        }
        CheckPluginName(format!("{MANAGEMENT_NAME_PREFIX}{}", self.0))
    }

    /// The name with any management prefix removed.
    ///
    /// Stripping can leave an empty string for the bare prefix `mgmt_`,
    /// so this revalidates.
    pub fn create_basic_name(&self) -> Result<CheckPluginName, NameError> {
        match self.0.strip_prefix(MANAGEMENT_NAME_PREFIX) {
            Some(basic) => CheckPluginName::new(basic),
            None => Ok(self.clone()),
        }
    }
}

impl From<SectionName> for ParsedSectionName {
    fn from(name: SectionName) -> Self {
        ParsedSectionName(name.0)
    }
}

/// Whether a service description belongs to a management board service.
pub fn is_management_description(description: &str) -> bool {
    description.starts_with(MANAGEMENT_DESCR_PREFIX)
}
