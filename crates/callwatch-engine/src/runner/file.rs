use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use callwatch_core::AmiEvent;
use callwatch_events::{CallEventSubscriber, Reporter};

use crate::handler::{EventHandler, is_interesting};

use super::RunnerError;

/// Replays a recorded JSON event file (an array of string maps) through
/// the engine. This is the test harness path and the binary's replay
/// mode; the resulting high-level events are a pure function of the
/// file contents.
pub struct FileRunner<S, R> {
    events: Vec<AmiEvent>,
    handler: EventHandler<S, R>,
}

impl<S: CallEventSubscriber, R: Reporter> FileRunner<S, R> {
    pub fn from_file<P: AsRef<Path>>(path: P, subscriber: S, reporter: R) -> Result<Self, RunnerError> {
        let file = File::open(path.as_ref())
            .map_err(|e| RunnerError::ReadFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        let events: Vec<AmiEvent> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RunnerError::ParseFailed(e.to_string()))?;
        Ok(Self::from_events(events, subscriber, reporter))
    }

    pub fn from_json_str(json: &str, subscriber: S, reporter: R) -> Result<Self, RunnerError> {
        let events: Vec<AmiEvent> =
            serde_json::from_str(json).map_err(|e| RunnerError::ParseFailed(e.to_string()))?;
        Ok(Self::from_events(events, subscriber, reporter))
    }

    pub fn from_events(events: Vec<AmiEvent>, subscriber: S, reporter: R) -> Self {
        Self {
            events,
            handler: EventHandler::new(subscriber, reporter),
        }
    }

    /// Pump every interesting event through the engine
    pub fn run(&mut self) -> Result<(), RunnerError> {
        let events = std::mem::take(&mut self.events);
        for event in &events {
            if is_interesting(event.name()) {
                self.handler.on_event(event)?;
            }
        }
        Ok(())
    }

    pub fn handler(&self) -> &EventHandler<S, R> {
        &self.handler
    }

    pub fn into_handler(self) -> EventHandler<S, R> {
        self.handler
    }
}
