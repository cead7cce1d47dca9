use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use callwatch_core::{AmiEvent, CallerId, HangupReason};

use crate::call_event::CallEvent;
use crate::subscriber::CallEventSubscriber;

fn join_targets(targets: &[CallerId]) -> String {
    targets.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

/// Renders each call event as one log line
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSubscriber;

impl CallEventSubscriber for ConsoleSubscriber {
    fn on_b_dial(&mut self, call_id: &str, caller: &CallerId, to_number: &str, targets: &[CallerId]) {
        tracing::info!("{} ringing: {} --> {} ({})", call_id, caller, to_number, join_targets(targets));
    }

    fn on_up(&mut self, call_id: &str, caller: &CallerId, to_number: &str, callee: &CallerId) {
        tracing::info!("{} up: {} --> {} ({})", call_id, caller, to_number, callee);
    }

    fn on_a_hangup(&mut self, call_id: &str, caller: &CallerId, to_number: &str, reason: HangupReason) {
        tracing::info!("{} hangup: {} --> {} (reason: {})", call_id, caller, to_number, reason);
    }

    fn on_warm_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        destination: &CallerId,
    ) {
        tracing::info!(
            "{} <== {} attn xfer: {} <--> {} (through {})",
            call_id, merged_id, caller, destination, redirector
        );
    }

    fn on_cold_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        to_number: &str,
        targets: &[CallerId],
    ) {
        tracing::info!(
            "{} <== {} bld xfer: {} --> {} ({}) (through {})",
            call_id, merged_id, caller, to_number, join_targets(targets), redirector
        );
    }

    fn on_user_event(&mut self, event: &AmiEvent) {
        tracing::info!("user event: {}", event);
    }
}

/// Records every call event in memory. Used by tests and by anything
/// that wants to post-process a whole run.
#[derive(Debug, Clone, Default)]
pub struct CollectingSubscriber {
    events: Vec<CallEvent>,
}

impl CollectingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CallEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<CallEvent> {
        self.events
    }
}

impl CallEventSubscriber for CollectingSubscriber {
    fn on_b_dial(&mut self, call_id: &str, caller: &CallerId, to_number: &str, targets: &[CallerId]) {
        self.events.push(CallEvent::BDial {
            call_id: call_id.to_string(),
            caller: caller.clone(),
            to_number: to_number.to_string(),
            targets: targets.to_vec(),
        });
    }

    fn on_up(&mut self, call_id: &str, caller: &CallerId, to_number: &str, callee: &CallerId) {
        self.events.push(CallEvent::Up {
            call_id: call_id.to_string(),
            caller: caller.clone(),
            to_number: to_number.to_string(),
            callee: callee.clone(),
        });
    }

    fn on_a_hangup(&mut self, call_id: &str, caller: &CallerId, to_number: &str, reason: HangupReason) {
        self.events.push(CallEvent::AHangup {
            call_id: call_id.to_string(),
            caller: caller.clone(),
            to_number: to_number.to_string(),
            reason,
        });
    }

    fn on_warm_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        destination: &CallerId,
    ) {
        self.events.push(CallEvent::WarmTransfer {
            call_id: call_id.to_string(),
            merged_id: merged_id.to_string(),
            redirector: redirector.clone(),
            caller: caller.clone(),
            destination: destination.clone(),
        });
    }

    fn on_cold_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        to_number: &str,
        targets: &[CallerId],
    ) {
        self.events.push(CallEvent::ColdTransfer {
            call_id: call_id.to_string(),
            merged_id: merged_id.to_string(),
            redirector: redirector.clone(),
            caller: caller.clone(),
            to_number: to_number.to_string(),
            targets: targets.to_vec(),
        });
    }
}

/// Collects call events and writes them to a file as a JSON array.
/// The dump is a pure function of the processed event trace, which makes
/// it suitable for golden-file comparisons.
#[derive(Debug)]
pub struct JsonDumpSubscriber {
    path: PathBuf,
    inner: CollectingSubscriber,
}

impl JsonDumpSubscriber {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: CollectingSubscriber::new(),
        }
    }

    pub fn events(&self) -> &[CallEvent] {
        self.inner.events()
    }

    /// Write the collected events out. Call once, after the run.
    pub fn write_out(&self) -> io::Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self.inner.events())
            .map_err(io::Error::other)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl CallEventSubscriber for JsonDumpSubscriber {
    fn on_b_dial(&mut self, call_id: &str, caller: &CallerId, to_number: &str, targets: &[CallerId]) {
        self.inner.on_b_dial(call_id, caller, to_number, targets);
    }

    fn on_up(&mut self, call_id: &str, caller: &CallerId, to_number: &str, callee: &CallerId) {
        self.inner.on_up(call_id, caller, to_number, callee);
    }

    fn on_a_hangup(&mut self, call_id: &str, caller: &CallerId, to_number: &str, reason: HangupReason) {
        self.inner.on_a_hangup(call_id, caller, to_number, reason);
    }

    fn on_warm_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        destination: &CallerId,
    ) {
        self.inner.on_warm_transfer(call_id, merged_id, redirector, caller, destination);
    }

    fn on_cold_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        to_number: &str,
        targets: &[CallerId],
    ) {
        self.inner.on_cold_transfer(call_id, merged_id, redirector, caller, to_number, targets);
    }
}
