use serde::Serialize;

use callwatch_core::{CallerId, HangupReason};

/// A high-level call event, as a value.
///
/// The engine delivers events through the [`crate::CallEventSubscriber`]
/// hooks; this enum is the serializable form used by the JSON dump sink
/// and by tests that compare emitted sequences.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallEvent {
    BDial {
        call_id: String,
        caller: CallerId,
        to_number: String,
        targets: Vec<CallerId>,
    },
    Up {
        call_id: String,
        caller: CallerId,
        to_number: String,
        callee: CallerId,
    },
    AHangup {
        call_id: String,
        caller: CallerId,
        to_number: String,
        reason: HangupReason,
    },
    WarmTransfer {
        call_id: String,
        merged_id: String,
        redirector: CallerId,
        caller: CallerId,
        destination: CallerId,
    },
    ColdTransfer {
        call_id: String,
        merged_id: String,
        redirector: CallerId,
        caller: CallerId,
        to_number: String,
        targets: Vec<CallerId>,
    },
}

impl CallEvent {
    /// The id of the call this event belongs to
    pub fn call_id(&self) -> &str {
        match self {
            CallEvent::BDial { call_id, .. }
            | CallEvent::Up { call_id, .. }
            | CallEvent::AHangup { call_id, .. }
            | CallEvent::WarmTransfer { call_id, .. }
            | CallEvent::ColdTransfer { call_id, .. } => call_id,
        }
    }
}
