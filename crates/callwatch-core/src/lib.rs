//! Core types for the callwatch AMI translation stack
//!
//! This crate provides the fundamental values shared by every other crate:
//! caller identities, the raw AMI event map, channel state and hangup cause
//! vocabulary, the engine error taxonomy and the logging bootstrap.

/// Git version string, set at compile time
pub const GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");
/// Package version followed by git version string, e.g., "0.4.2-aabbccdd"
pub const STACK_VERSION: &str = const_format::formatcp!("{}-{}", env!("CARGO_PKG_VERSION"), GIT_VERSION);

pub mod callerid;
pub mod debug;
pub mod error;
pub mod event;
pub mod states;

// Re-export commonly used items
pub use callerid::CallerId;
pub use error::EngineError;
pub use event::AmiEvent;
pub use states::{ChannelState, HangupReason};

/// Uniqueid assigned by the switch to a single channel
pub type UniqueId = String;

/// Linkedid assigned by the switch to correlate the channels of one call
pub type LinkedId = String;
