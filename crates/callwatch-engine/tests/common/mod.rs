//! Shared trace-building helpers for the scenario tests.
//!
//! Each scenario is a hand-built raw event trace, shaped like the
//! switch emits them, replayed through a fresh engine. The helpers
//! build per-channel event maps from a small peer description.

#![allow(dead_code)]

use callwatch_core::{AmiEvent, CallerId, HangupReason};
use callwatch_engine::EventHandler;
use callwatch_events::{CallEvent, CollectingSubscriber, NullReporter};

/// One channel of a scenario, with the identity fields its events carry
#[derive(Debug, Clone)]
pub struct Peer {
    pub uniqueid: String,
    pub linkedid: String,
    pub name: String,
    pub exten: String,
    pub account_code: String,
    pub cid_name: String,
    pub cid_number: String,
}

impl Peer {
    pub fn sip(
        uniqueid: &str,
        name: &str,
        exten: &str,
        account_code: u32,
        cid_name: &str,
        cid_number: &str,
    ) -> Self {
        Self {
            uniqueid: uniqueid.to_string(),
            linkedid: uniqueid.to_string(),
            name: name.to_string(),
            exten: exten.to_string(),
            account_code: if account_code == 0 { String::new() } else { account_code.to_string() },
            cid_name: cid_name.to_string(),
            cid_number: cid_number.to_string(),
        }
    }

    /// Called legs carry the linkedid of the call that created them
    pub fn with_linkedid(mut self, linkedid: &str) -> Self {
        self.linkedid = linkedid.to_string();
        self
    }

    pub fn callerid(&self) -> CallerId {
        CallerId::new(self.account_code.parse().unwrap_or(0), &self.cid_name, &self.cid_number)
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "<unknown>" } else { value }
}

pub fn newchannel(peer: &Peer, state: u32) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "Newchannel"),
        ("Uniqueid", &peer.uniqueid),
        ("Linkedid", &peer.linkedid),
        ("Channel", &peer.name),
        ("ChannelState", &state.to_string()),
        ("Exten", &peer.exten),
        ("AccountCode", &peer.account_code),
        ("CallerIDName", or_unknown(&peer.cid_name)),
        ("CallerIDNum", or_unknown(&peer.cid_number)),
        ("ConnectedLineName", "<unknown>"),
        ("ConnectedLineNum", "<unknown>"),
    ])
}

pub fn newstate(peer: &Peer, state: u32) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "Newstate"),
        ("Uniqueid", &peer.uniqueid),
        ("Linkedid", &peer.linkedid),
        ("Channel", &peer.name),
        ("ChannelState", &state.to_string()),
        ("CallerIDName", or_unknown(&peer.cid_name)),
        ("CallerIDNum", or_unknown(&peer.cid_number)),
    ])
}

pub fn new_accountcode(peer: &Peer, account_code: &str) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "NewAccountCode"),
        ("Uniqueid", &peer.uniqueid),
        ("Channel", &peer.name),
        ("AccountCode", account_code),
    ])
}

pub fn dial_begin(source: &Peer, dest: &Peer) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "DialBegin"),
        ("Uniqueid", &source.uniqueid),
        ("Linkedid", &source.linkedid),
        ("Channel", &source.name),
        ("DestUniqueid", &dest.uniqueid),
        ("DestChannel", &dest.name),
        ("DialString", &dest.cid_number),
    ])
}

pub fn dial_end(source: &Peer, dest: &Peer) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "DialEnd"),
        ("Uniqueid", &source.uniqueid),
        ("Linkedid", &source.linkedid),
        ("Channel", &source.name),
        ("DestUniqueid", &dest.uniqueid),
        ("DestChannel", &dest.name),
        ("DialStatus", "ANSWER"),
    ])
}

pub fn local_bridge(one: &Peer, two: &Peer) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "LocalBridge"),
        ("LocalOneChannel", &one.name),
        ("LocalOneUniqueid", &one.uniqueid),
        ("LocalTwoChannel", &two.name),
        ("LocalTwoUniqueid", &two.uniqueid),
        ("LocalOptimization", "Yes"),
    ])
}

pub fn bridge_create(bridge_uid: &str) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "BridgeCreate"),
        ("BridgeUniqueid", bridge_uid),
        ("BridgeType", "basic"),
        ("BridgeNumChannels", "0"),
    ])
}

pub fn bridge_enter(bridge_uid: &str, peer: &Peer, num_channels: u32) -> AmiEvent {
    bridge_enter_linked(bridge_uid, peer, num_channels, &peer.linkedid)
}

/// Bridge entry carrying a specific Linkedid, for legs the switch has
/// relinked to the surviving call
pub fn bridge_enter_linked(bridge_uid: &str, peer: &Peer, num_channels: u32, linkedid: &str) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "BridgeEnter"),
        ("BridgeUniqueid", bridge_uid),
        ("BridgeNumChannels", &num_channels.to_string()),
        ("Uniqueid", &peer.uniqueid),
        ("Linkedid", linkedid),
        ("Channel", &peer.name),
        ("CallerIDName", or_unknown(&peer.cid_name)),
        ("CallerIDNum", or_unknown(&peer.cid_number)),
    ])
}

pub fn bridge_leave(bridge_uid: &str, peer: &Peer, num_channels: u32) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "BridgeLeave"),
        ("BridgeUniqueid", bridge_uid),
        ("BridgeNumChannels", &num_channels.to_string()),
        ("Uniqueid", &peer.uniqueid),
        ("Linkedid", &peer.linkedid),
        ("Channel", &peer.name),
        ("CallerIDName", or_unknown(&peer.cid_name)),
        ("CallerIDNum", or_unknown(&peer.cid_number)),
    ])
}

pub fn bridge_destroy(bridge_uid: &str) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "BridgeDestroy"),
        ("BridgeUniqueid", bridge_uid),
        ("BridgeNumChannels", "0"),
    ])
}

pub fn hangup(peer: &Peer, cause: u32) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "Hangup"),
        ("Uniqueid", &peer.uniqueid),
        ("Linkedid", &peer.linkedid),
        ("Channel", &peer.name),
        ("CallerIDName", or_unknown(&peer.cid_name)),
        ("CallerIDNum", or_unknown(&peer.cid_number)),
        ("Cause", &cause.to_string()),
    ])
}

pub fn blind_transfer(transferer: &Peer, transferee: &Peer, extension: &str) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "BlindTransfer"),
        ("TransfererUniqueid", &transferer.uniqueid),
        ("TransfererChannel", &transferer.name),
        ("TransfereeUniqueid", &transferee.uniqueid),
        ("TransfereeChannel", &transferee.name),
        ("Extension", extension),
        ("Result", "Success"),
    ])
}

pub fn attended_transfer_bridge(orig: &Peer, second: &Peer, second_bridge_uid: &str) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "AttendedTransfer"),
        ("OrigTransfererChannel", &orig.name),
        ("OrigTransfererUniqueid", &orig.uniqueid),
        ("OrigTransfererLinkedid", &orig.linkedid),
        ("SecondTransfererChannel", &second.name),
        ("SecondTransfererUniqueid", &second.uniqueid),
        ("DestType", "Bridge"),
        ("SecondBridgeUniqueid", second_bridge_uid),
        ("Result", "Success"),
    ])
}

pub fn attended_transfer_app_dial(orig: &Peer, second: &Peer, orig_bridge_uid: &str) -> AmiEvent {
    AmiEvent::from_pairs(&[
        ("Event", "AttendedTransfer"),
        ("OrigTransfererChannel", &orig.name),
        ("OrigTransfererUniqueid", &orig.uniqueid),
        ("OrigTransfererLinkedid", &orig.linkedid),
        ("SecondTransfererChannel", &second.name),
        ("SecondTransfererUniqueid", &second.uniqueid),
        ("DestType", "App"),
        ("DestApp", "Dial"),
        ("OrigBridgeUniqueid", orig_bridge_uid),
        ("Result", "Success"),
    ])
}

/// The usual happy-path setup: A dials B, B rings, answers, and both
/// end up bridged. Leaves A picked up and talking to B.
pub fn call_setup(a: &Peer, b: &Peer, bridge_uid: &str) -> Vec<AmiEvent> {
    vec![
        newchannel(a, 0),
        newstate(a, 4),
        newchannel(b, 0),
        dial_begin(a, b),
        newstate(b, 5),
        newstate(b, 6),
        dial_end(a, b),
        newstate(a, 6),
        bridge_create(bridge_uid),
        bridge_enter(bridge_uid, b, 1),
        bridge_enter(bridge_uid, a, 2),
    ]
}

/// Both parties leave the bridge and hang up, `first` first
pub fn call_teardown(first: &Peer, second: &Peer, bridge_uid: &str, cause: u32) -> Vec<AmiEvent> {
    vec![
        bridge_leave(bridge_uid, first, 1),
        bridge_leave(bridge_uid, second, 0),
        hangup(first, cause),
        hangup(second, cause),
        bridge_destroy(bridge_uid),
    ]
}

/// What a finished replay left behind
pub struct TraceResult {
    pub events: Vec<CallEvent>,
    pub channels_left: usize,
    pub bridges_left: usize,
}

impl TraceResult {
    /// Every hangup processed: nothing may linger in the registries
    pub fn assert_drained(&self) {
        assert_eq!(self.channels_left, 0, "channels left in the registry");
        assert_eq!(self.bridges_left, 0, "bridges left in the registry");
    }
}

pub fn run_trace(trace: &[AmiEvent]) -> TraceResult {
    let mut handler = EventHandler::new(CollectingSubscriber::new(), NullReporter);
    for event in trace {
        handler.on_event(event).expect("event processing failed");
    }
    TraceResult {
        channels_left: handler.channel_count(),
        bridges_left: handler.bridge_count(),
        events: handler.into_subscriber().into_events(),
    }
}

// Expected-event constructors, to keep the scenario assertions readable

pub fn b_dial(call_id: &str, caller: &CallerId, to_number: &str, targets: &[CallerId]) -> CallEvent {
    CallEvent::BDial {
        call_id: call_id.to_string(),
        caller: caller.clone(),
        to_number: to_number.to_string(),
        targets: targets.to_vec(),
    }
}

pub fn up(call_id: &str, caller: &CallerId, to_number: &str, callee: &CallerId) -> CallEvent {
    CallEvent::Up {
        call_id: call_id.to_string(),
        caller: caller.clone(),
        to_number: to_number.to_string(),
        callee: callee.clone(),
    }
}

pub fn a_hangup(call_id: &str, caller: &CallerId, to_number: &str, reason: HangupReason) -> CallEvent {
    CallEvent::AHangup {
        call_id: call_id.to_string(),
        caller: caller.clone(),
        to_number: to_number.to_string(),
        reason,
    }
}

pub fn warm_transfer(
    call_id: &str,
    merged_id: &str,
    redirector: &CallerId,
    caller: &CallerId,
    destination: &CallerId,
) -> CallEvent {
    CallEvent::WarmTransfer {
        call_id: call_id.to_string(),
        merged_id: merged_id.to_string(),
        redirector: redirector.clone(),
        caller: caller.clone(),
        destination: destination.clone(),
    }
}

pub fn cold_transfer(
    call_id: &str,
    merged_id: &str,
    redirector: &CallerId,
    caller: &CallerId,
    to_number: &str,
    targets: &[CallerId],
) -> CallEvent {
    CallEvent::ColdTransfer {
        call_id: call_id.to_string(),
        merged_id: merged_id.to_string(),
        redirector: redirector.clone(),
        caller: caller.clone(),
        to_number: to_number.to_string(),
        targets: targets.to_vec(),
    }
}
