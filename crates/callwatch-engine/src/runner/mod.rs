//! Event sources. Both runners pump raw events into an [`EventHandler`]
//! until the source is exhausted or the connection drops.
//!
//! [`EventHandler`]: crate::handler::EventHandler

use core::fmt;

use callwatch_core::EngineError;

pub mod ami;
pub mod file;

pub use ami::AmiRunner;
pub use file::FileRunner;

#[derive(Debug)]
pub enum RunnerError {
    ConnectionFailed(String),
    LoginFailed(String),
    ReadFailed(String),
    ParseFailed(String),
    Engine(EngineError),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            RunnerError::LoginFailed(msg) => write!(f, "Login failed: {}", msg),
            RunnerError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            RunnerError::ParseFailed(msg) => write!(f, "Parse failed: {}", msg),
            RunnerError::Engine(err) => write!(f, "Event processing failed: {}", err),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<EngineError> for RunnerError {
    fn from(err: EngineError) -> Self {
        RunnerError::Engine(err)
    }
}
