use core::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel the switch uses for fields it has no value for
const UNKNOWN: &str = "<unknown>";

/// One end of a call as the users of this stack care about it: account
/// code, display name, number and the privacy choice of the party.
///
/// Values are immutable. Deriving a modified identity goes through the
/// `with_*` builders, which apply the same `<unknown>` normalization as
/// construction does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerId {
    /// Account id on the platform. Zero when unknown.
    pub code: u32,
    pub name: String,
    pub number: String,
    /// False when the party asked for caller id suppression
    pub is_public: bool,
}

impl CallerId {
    pub fn new(code: u32, name: &str, number: &str) -> Self {
        Self {
            code,
            name: normalize(name),
            number: normalize(number),
            is_public: true,
        }
    }

    pub fn with_code(&self, code: u32) -> Self {
        Self { code, ..self.clone() }
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self { name: normalize(name), ..self.clone() }
    }

    pub fn with_number(&self, number: &str) -> Self {
        Self { number: normalize(number), ..self.clone() }
    }

    pub fn with_public(&self, is_public: bool) -> Self {
        Self { is_public, ..self.clone() }
    }
}

fn normalize(value: &str) -> String {
    if value == UNKNOWN { String::new() } else { value.to_string() }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let privacy = if self.is_public { ";pub" } else { ";priv" };
        write!(
            f,
            "\"{}\" <{}{};code={}>",
            self.name.replace('\\', "\\\\").replace('"', "\\\""),
            self.number,
            privacy,
            self.code
        )
    }
}
