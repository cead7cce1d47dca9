//! Click-to-dial (switch-originated) calls: the switch dials both
//! participants itself through a local channel pair.

mod common;

use callwatch_core::{CallerId, HangupReason};

use common::*;

const ORIGIN_ID: &str = "ua0-dev-1443449100.100";

/// The dialplan half of the local pair; its twin's uniqueid serves as
/// the call id reported for the whole connectab call.
fn half_one() -> Peer {
    Peer::sip(ORIGIN_ID, "Local/206@osvpi_route-00000050;1", "206", 0, "", "206")
}

fn half_two() -> Peer {
    Peer::sip("ua0-dev-1443449100.101", "Local/206@osvpi_route-00000050;2", "206", 0, "", "206")
        .with_linkedid(ORIGIN_ID)
}

/// The requester's phone, dialed first
fn participant_one() -> Peer {
    Peer::sip("ua0-dev-1443449100.102", "SIP/150010001-00000051", "206", 150010001, "Bob", "+31612345678")
        .with_linkedid(ORIGIN_ID)
}

/// The other end, dialed once the requester picked up
fn participant_two() -> Peer {
    Peer::sip("ua0-dev-1443449100.103", "SIP/150010002-00000052", "207", 150010002, "", "207")
        .with_linkedid(ORIGIN_ID)
}

fn connectab_trace() -> Vec<callwatch_core::AmiEvent> {
    let h1 = half_one();
    let h2 = half_two();
    let p1 = participant_one();
    let p2 = participant_two();

    vec![
        // the switch originates the local pair
        newchannel(&h1, 0),
        newchannel(&h2, 0),
        local_bridge(&h1, &h2),
        // first the requester is dialed...
        newchannel(&p1, 0),
        dial_begin(&h2, &p1),
        newstate(&p1, 5),
        newstate(&p1, 6),
        bridge_create("bridge-a"),
        bridge_enter("bridge-a", &p1, 1),
        bridge_enter("bridge-a", &h2, 2),
        // ...then the other end
        newchannel(&p2, 0),
        dial_begin(&h1, &p2),
        newstate(&p2, 5),
        newstate(&p2, 6),
        bridge_create("bridge-b"),
        bridge_enter("bridge-b", &p2, 1),
        bridge_enter("bridge-b", &h1, 2),
        // local optimization folds the pair away
        bridge_leave("bridge-a", &h2, 1),
        bridge_leave("bridge-b", &h1, 1),
        bridge_leave("bridge-a", &p1, 0),
        bridge_destroy("bridge-a"),
        bridge_enter("bridge-b", &p1, 2),
        // requester hangs up first
        bridge_leave("bridge-b", &p1, 1),
        bridge_leave("bridge-b", &p2, 0),
        bridge_destroy("bridge-b"),
        hangup(&p1, 16),
        hangup(&h1, 16),
        hangup(&h2, 16),
        hangup(&p2, 16),
    ]
}

#[test]
fn test_connectab_call() {
    let h2 = half_two();
    let p1 = participant_one();
    let p2 = participant_two();

    let result = run_trace(&connectab_trace());

    // The caller reported at ring time is the local leg's identity
    // carrying the requester's account code
    let ring_caller = CallerId::new(150010001, "", "206");
    // At hangup time the requester's identity carries the dialplan
    // number instead of their device number
    let hangup_caller = CallerId::new(150010001, "Bob", "206");

    assert_eq!(
        result.events,
        vec![
            b_dial(&h2.uniqueid, &ring_caller, "207", &[p2.callerid()]),
            up(ORIGIN_ID, &p1.callerid(), "206", &p2.callerid()),
            a_hangup(&h2.uniqueid, &hangup_caller, "207", HangupReason::Completed),
        ]
    );
    result.assert_drained();
}

/// Whichever leg goes down first, only one hangup may surface.
#[test]
fn test_connectab_single_hangup() {
    let result = run_trace(&connectab_trace());
    let hangups = result
        .events
        .iter()
        .filter(|e| matches!(e, callwatch_events::CallEvent::AHangup { .. }))
        .count();
    assert_eq!(hangups, 1);
}
