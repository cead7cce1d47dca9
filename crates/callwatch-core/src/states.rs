use serde::Serialize;

use core::fmt;

use crate::error::EngineError;

/// Channel states as the switch reports them in `ChannelState`.
/// Only Down, Dialing, Ring, Ringing and Up drive engine logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Down = 0,
    Reserved = 1,
    OffHook = 2,
    Dialing = 3,
    Ring = 4,
    Ringing = 5,
    Up = 6,
    Busy = 7,
    DialingOffHook = 8,
    PreRing = 9,
}

impl TryFrom<u32> for ChannelState {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChannelState::Down),
            1 => Ok(ChannelState::Reserved),
            2 => Ok(ChannelState::OffHook),
            3 => Ok(ChannelState::Dialing),
            4 => Ok(ChannelState::Ring),
            5 => Ok(ChannelState::Ringing),
            6 => Ok(ChannelState::Up),
            7 => Ok(ChannelState::Busy),
            8 => Ok(ChannelState::DialingOffHook),
            9 => Ok(ChannelState::PreRing),
            other => Err(EngineError::InvalidValue {
                field: "ChannelState",
                value: other.to_string(),
            }),
        }
    }
}

// Hangup causes, see the switch's Q.850 cause mappings
pub const CAUSE_UNKNOWN: u32 = 0;
pub const CAUSE_NORMAL_CLEARING: u32 = 16;
pub const CAUSE_USER_BUSY: u32 = 17;
pub const CAUSE_NO_USER_RESPONSE: u32 = 18;
pub const CAUSE_NO_ANSWER: u32 = 19;
pub const CAUSE_CALL_REJECTED: u32 = 21;
pub const CAUSE_ANSWERED_ELSEWHERE: u32 = 26;

/// Why a call ended, as reported to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HangupReason {
    Completed,
    NoAnswer,
    Busy,
    Rejected,
    AnsweredElsewhere,
    Cancelled,
    Failed,
}

impl HangupReason {
    /// Map a raw hangup cause. Cause 16 and the unknown cause 0 are
    /// ambiguous on their own; whether the answering leg made it to Up
    /// decides between success and a never-connected call.
    pub fn from_cause(cause: u32, was_up: bool) -> Self {
        match cause {
            CAUSE_NORMAL_CLEARING => {
                if was_up { HangupReason::Completed } else { HangupReason::NoAnswer }
            }
            CAUSE_USER_BUSY => HangupReason::Busy,
            CAUSE_NO_USER_RESPONSE | CAUSE_NO_ANSWER => HangupReason::NoAnswer,
            CAUSE_ANSWERED_ELSEWHERE => HangupReason::AnsweredElsewhere,
            CAUSE_CALL_REJECTED => HangupReason::Rejected,
            CAUSE_UNKNOWN => {
                if was_up { HangupReason::Completed } else { HangupReason::Cancelled }
            }
            _ => HangupReason::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HangupReason::Completed => "completed",
            HangupReason::NoAnswer => "no-answer",
            HangupReason::Busy => "busy",
            HangupReason::Rejected => "rejected",
            HangupReason::AnsweredElsewhere => "answered-elsewhere",
            HangupReason::Cancelled => "cancelled",
            HangupReason::Failed => "failed",
        }
    }
}

impl fmt::Display for HangupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
