#![allow(dead_code)]

//! The event-translation engine.
//!
//! Raw switch events go in through [`handler::EventHandler::on_event`];
//! high-level call events come out through the subscriber hooks. The
//! in-memory model (channels, bridges, dial relations) is owned entirely
//! by the handler and never escapes it.

mod bridge;
mod channel;
mod topology;

pub mod handler;
pub mod runner;

pub use handler::{EventHandler, INTERESTING_EVENTS, is_interesting};
pub use runner::{AmiRunner, FileRunner, RunnerError};
