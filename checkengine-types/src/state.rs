//! Monitoring states and their severity order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The monitoring state of a result or service.
///
/// Variants are declared in severity order, so the derived `Ord` is the
/// "worst state" order: `Ok < Warn < Unknown < Crit`. Note that this is not
/// the numeric order of the state codes (UNKNOWN is 3, CRIT is 2).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    #[default]
    Ok,
    Warn,
    #[serde(alias = "UNKN")]
    Unknown,
    Crit,
}

impl State {
    /// Returns the more severe of the two states.
    pub fn worst(self, other: State) -> State {
        self.max(other)
    }

    /// Returns the most severe state of all given states, `Ok` if there are none.
    pub fn worst_of<I: IntoIterator<Item = State>>(states: I) -> State {
        states.into_iter().fold(State::Ok, State::worst)
    }

    /// Returns the numeric state code.
    pub const fn as_int(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }

    /// Creates a state from its numeric code.
    pub const fn from_int(code: u8) -> Option<State> {
        match code {
            0 => Some(State::Ok),
            1 => Some(State::Warn),
            2 => Some(State::Crit),
            3 => Some(State::Unknown),
            _ => None,
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            State::Ok => "OK",
            State::Warn => "WARN",
            State::Crit => "CRIT",
            State::Unknown => "UNKN",
        }
    }

    /// Returns the marker appended to summaries of non-OK results.
    pub fn marker(&self) -> &'static str {
        match self {
            State::Ok => "",
            State::Warn => "(!)",
            State::Crit => "(!!)",
            State::Unknown => "(?)",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [State; 4] = [State::Ok, State::Warn, State::Unknown, State::Crit];

    #[test]
    fn test_severity_order() {
        assert!(State::Ok < State::Warn);
        assert!(State::Warn < State::Unknown);
        assert!(State::Unknown < State::Crit);
    }

    #[test]
    fn test_worst_is_idempotent_commutative_associative() {
        for a in ALL {
            assert_eq!(a.worst(a), a);
            for b in ALL {
                assert_eq!(a.worst(b), b.worst(a));
                for c in ALL {
                    assert_eq!(a.worst(b).worst(c), a.worst(b.worst(c)));
                }
            }
        }
    }

    #[test]
    fn test_worst_of_empty_is_ok() {
        assert_eq!(State::worst_of([]), State::Ok);
        assert_eq!(
            State::worst_of([State::Warn, State::Crit, State::Unknown]),
            State::Crit
        );
    }

    #[test]
    fn test_int_codes_round_trip() {
        for state in ALL {
            assert_eq!(State::from_int(state.as_int()), Some(state));
        }
        assert_eq!(State::Unknown.as_int(), 3);
        assert_eq!(State::from_int(4), None);
    }

    #[test]
    fn test_markers() {
        assert_eq!(State::Ok.marker(), "");
        assert_eq!(State::Warn.marker(), "(!)");
        assert_eq!(State::Crit.marker(), "(!!)");
        assert_eq!(State::Unknown.marker(), "(?)");
    }

    #[test]
    fn test_serde_uses_upper_case_names() {
        let json = serde_json::to_string(&State::Warn).unwrap();
        assert_eq!(json, "\"WARN\"");
        let state: State = serde_json::from_str("\"UNKN\"").unwrap();
        assert_eq!(state, State::Unknown);
    }
}
