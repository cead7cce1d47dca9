use core::fmt;

/// Errors surfaced by registries and event field access.
///
/// The `Missing*` variants are distinguished on purpose: a channel or
/// uniqueid that is unknown at dispatch time is an expected condition
/// (events may refer to channels created before we connected) and is
/// swallowed by the event loop. Everything else propagates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    MissingChannel { name: String },
    MissingUniqueid { uniqueid: String },
    MissingBridge { uniqueid: String },
    MissingField { event: String, field: &'static str },
    InvalidValue { field: &'static str, value: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MissingChannel { name } => {
                write!(f, "no channel with name {}", name)
            }
            EngineError::MissingUniqueid { uniqueid } => {
                write!(f, "no channel with uniqueid {}", uniqueid)
            }
            EngineError::MissingBridge { uniqueid } => {
                write!(f, "no bridge with uniqueid {}", uniqueid)
            }
            EngineError::MissingField { event, field } => {
                write!(f, "event {} lacks field {}", event, field)
            }
            EngineError::InvalidValue { field, value } => {
                write!(f, "invalid value for {}: {:?}", field, value)
            }
        }
    }
}

impl std::error::Error for EngineError {}
