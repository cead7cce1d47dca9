use callwatch_core::AmiEvent;

/// The trace surface of the engine.
///
/// The engine performs no logging of its own; it hands every raw event
/// (`trace_ami`) and every formatted engine message (`trace_msg`) to the
/// reporter and nothing else.
pub trait Reporter {
    /// Called for every raw event before it is dispatched
    fn trace_ami(&mut self, event: &AmiEvent);

    /// Formatted engine messages: connect notices, high-level event
    /// one-liners, expected-missing channel notices
    fn trace_msg(&mut self, msg: &str);
}

/// Routes traces to the `tracing` stack
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn trace_ami(&mut self, event: &AmiEvent) {
        tracing::trace!("<- {}", event);
    }

    fn trace_msg(&mut self, msg: &str) {
        tracing::debug!("{}", msg);
    }
}

/// Discards all traces
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn trace_ami(&mut self, _event: &AmiEvent) {}

    fn trace_msg(&mut self, _msg: &str) {}
}
