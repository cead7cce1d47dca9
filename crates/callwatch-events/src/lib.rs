//! The subscriber boundary of the callwatch stack.
//!
//! The engine talks to the outside world through exactly two traits:
//! [`CallEventSubscriber`] receives the high-level call events, and
//! [`Reporter`] receives the raw-event and engine trace lines. Both are
//! implemented by the embedder; ready-made implementations for the common
//! cases (console, JSON dump, in-memory collection) live in `sinks`.

pub mod call_event;
pub mod reporter;
pub mod sinks;
pub mod subscriber;

pub use call_event::CallEvent;
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use sinks::{CollectingSubscriber, ConsoleSubscriber, JsonDumpSubscriber};
pub use subscriber::CallEventSubscriber;
