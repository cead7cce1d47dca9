use callwatch_core::{AmiEvent, CallerId, ChannelState, EngineError, HangupReason, assert_warn};
use callwatch_events::{CallEventSubscriber, Reporter};

use crate::bridge::BridgeRegistry;
use crate::channel::{BlindTransferMarker, CallSide, Channel, ChannelRegistry};

/// The events the engine reacts to. Anything else is dropped by the
/// runners before it reaches the dispatcher.
pub const INTERESTING_EVENTS: &[&str] = &[
    // This tells us that we're connected. Channels known before this
    // point are stale.
    "FullyBooted",
    // Channel setup and identity updates
    "Newchannel",
    "Newstate",
    "NewCallerid",
    "NewAccountCode",
    "NewConnectedLine",
    // Call setup
    "DialBegin",
    "DialEnd",
    "LocalBridge",
    "Hangup",
    // Bridges and their contents
    "BridgeCreate",
    "BridgeEnter",
    "BridgeLeave",
    "BridgeDestroy",
    // Transfers
    "BlindTransfer",
    "AttendedTransfer",
    // Passthrough
    "UserEvent",
];

pub fn is_interesting(event_name: &str) -> bool {
    INTERESTING_EVENTS.contains(&event_name)
}

/// Translates the raw event stream into high-level call events.
///
/// One instance holds the complete in-memory call topology. Processing
/// is strictly sequential: `on_event` mutates the registries, inspects
/// the resulting topology and invokes the subscriber hooks inline, all
/// before returning.
///
/// Lookups of channels the engine never saw (possible right after
/// connecting) are reported and skipped. Genuine model corruption
/// (bridge counts diverging, double local bridges, unknown transfer
/// topologies) panics: continuing would feed wrong business events to
/// downstream consumers.
pub struct EventHandler<S, R> {
    subscriber: S,
    reporter: R,
    channels: ChannelRegistry,
    bridges: BridgeRegistry,
}

impl<S: CallEventSubscriber, R: Reporter> EventHandler<S, R> {
    pub fn new(subscriber: S, reporter: R) -> Self {
        Self {
            subscriber,
            reporter,
            channels: ChannelRegistry::new(),
            bridges: BridgeRegistry::new(),
        }
    }

    /// Drop the whole in-memory topology. Used after a transport
    /// reconnect, when the event stream no longer matches our model.
    pub fn reset(&mut self) {
        self.channels = ChannelRegistry::new();
        self.bridges = BridgeRegistry::new();
    }

    pub fn subscriber(&self) -> &S {
        &self.subscriber
    }

    pub fn subscriber_mut(&mut self) -> &mut S {
        &mut self.subscriber
    }

    pub fn into_subscriber(self) -> S {
        self.subscriber
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }

    /// Feed one raw event. Unknown-channel lookups are expected around
    /// connection start and are logged and swallowed here; every other
    /// error propagates.
    pub fn on_event(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        match self.dispatch(event) {
            Err(EngineError::MissingChannel { ref name }) => {
                self.reporter.trace_msg(&format!(
                    "Channel with name {} not in mem when processing event: {}",
                    name, event
                ));
                Ok(())
            }
            Err(EngineError::MissingUniqueid { ref uniqueid }) => {
                self.reporter.trace_msg(&format!(
                    "Channel with Uniqueid {} not in mem when processing event: {}",
                    uniqueid, event
                ));
                Ok(())
            }
            other => other,
        }
    }

    fn dispatch(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        self.reporter.trace_ami(event);

        // Identity updates ride along any event about a known channel
        if let Some(uniqueid) = event.get("Uniqueid") {
            let uniqueid = uniqueid.to_string();
            if let Ok(channel) = self.channels.by_uniqueid_mut(&uniqueid) {
                channel.sync_data(event);
            }
        }

        match event.field("Event")? {
            "FullyBooted" => {
                self.reporter.trace_msg("Connected to Asterisk");
                Ok(())
            }
            "Newchannel" => {
                self.channels.add(Channel::from_event(event)?);
                Ok(())
            }
            "Newstate" => self.on_newstate(event),
            "NewCallerid" => self.channels.by_name_mut(event.field("Channel")?)?.set_callerid(event),
            "NewAccountCode" => {
                self.channels.by_name_mut(event.field("Channel")?)?.set_accountcode(event)
            }
            "NewConnectedLine" => {
                self.channels.by_name_mut(event.field("Channel")?)?.set_connected_line(event)
            }
            "LocalBridge" => self.on_local_bridge(event),
            "DialBegin" => self.on_dial_begin(event),
            "DialEnd" => self.on_dial_end(event),
            "Hangup" => self.on_hangup(event),
            "AttendedTransfer" => self.on_attended_transfer(event),
            "BlindTransfer" => self.on_blind_transfer(event),
            "BridgeCreate" => {
                self.bridges.create(event.field("BridgeUniqueid")?, event);
                Ok(())
            }
            "BridgeEnter" => self.on_bridge_enter(event),
            "BridgeLeave" => self.on_bridge_leave(event),
            "BridgeDestroy" => self.bridges.destroy(event.field("BridgeUniqueid")?, event),
            "UserEvent" => {
                self.reporter.trace_msg(&format!("user_event: {}", event));
                self.subscriber.on_user_event(event);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ===================================================================
    // Raw event handlers
    // ===================================================================

    fn on_newstate(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let new_state = ChannelState::try_from(event.u32_field("ChannelState")?)?;
        let (uniqueid, old_state, is_sip) = {
            let channel = self.channels.by_name_mut(event.field("Channel")?)?;
            let old_state = channel.state;
            assert!(
                old_state != new_state,
                "state of {} does not change: {}", channel.name, event
            );
            channel.state = new_state;
            (channel.uniqueid.clone(), old_state, channel.is_sip())
        };

        // The first transition away from Down classifies a sip leg:
        // an outgoing state makes it the calling side, ringing means it
        // is being called.
        if is_sip && old_state == ChannelState::Down {
            match new_state {
                ChannelState::Dialing | ChannelState::Ring | ChannelState::Up => {
                    self.raw_a_dial(&uniqueid)?;
                }
                ChannelState::Ringing => {
                    self.raw_b_dial(&uniqueid)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn on_local_bridge(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let one_uid = self.channels.by_name(event.field("LocalOneChannel")?)?.uniqueid.clone();
        let two_uid = self.channels.by_name(event.field("LocalTwoChannel")?)?.uniqueid.clone();

        {
            let one = self.channels.by_uniqueid(&one_uid)?;
            let two = self.channels.by_uniqueid(&two_uid)?;
            assert!(
                one.fwd_local_bridge.is_none()
                    && one.back_local_bridge.is_none()
                    && two.fwd_local_bridge.is_none()
                    && two.back_local_bridge.is_none(),
                "local channels paired twice: {}", event
            );
        }

        self.channels.by_uniqueid_mut(&one_uid)?.fwd_local_bridge = Some(two_uid.clone());
        self.channels.by_uniqueid_mut(&two_uid)?.back_local_bridge = Some(one_uid);
        Ok(())
    }

    fn on_dial_begin(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let source_uid = self.channels.by_uniqueid(event.field("Uniqueid")?)?.uniqueid.clone();
        let target = self.channels.by_uniqueid_mut(event.field("DestUniqueid")?)?;
        assert!(
            target.back_dial.is_none(),
            "channel {} is dialed twice: {}", target.name, event
        );
        target.back_dial = Some(source_uid.clone());
        let target_uid = target.uniqueid.clone();
        self.channels.by_uniqueid_mut(&source_uid)?.fwd_dials.push(target_uid);
        Ok(())
    }

    fn on_dial_end(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let source_uid = self.channels.by_uniqueid(event.field("Uniqueid")?)?.uniqueid.clone();
        let target = self.channels.by_uniqueid_mut(event.field("DestUniqueid")?)?;
        assert!(
            target.back_dial.is_some(),
            "channel {} has no open dial: {}", target.name, event
        );
        target.back_dial = None;
        let target_uid = target.uniqueid.clone();

        let source = self.channels.by_uniqueid_mut(&source_uid)?;
        let position = source.fwd_dials.iter().position(|uid| *uid == target_uid);
        let Some(position) = position else {
            panic!("dial relation {} -> {} was never begun: {}", source.name, target_uid, event);
        };
        source.fwd_dials.remove(position);
        Ok(())
    }

    fn on_bridge_enter(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let bridge_uid = event.field("BridgeUniqueid")?.to_string();
        let count = event.u32_field("BridgeNumChannels")?;

        let (uniqueid, wants_in_call) = {
            let channel = self.channels.by_uniqueid(event.field("Uniqueid")?)?;
            (channel.uniqueid.clone(), channel.is_sip() && !channel.is_picked_up)
        };

        self.bridges.by_uniqueid_mut(&bridge_uid)?.enter(&uniqueid, count, event);
        self.channels.by_uniqueid_mut(&uniqueid)?.bridge = Some(bridge_uid.clone());

        if wants_in_call {
            self.raw_in_call(&uniqueid, &bridge_uid, event)?;
        }
        Ok(())
    }

    fn on_bridge_leave(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let bridge_uid = event.field("BridgeUniqueid")?.to_string();
        let count = event.u32_field("BridgeNumChannels")?;
        let uniqueid = self.channels.by_uniqueid(event.field("Uniqueid")?)?.uniqueid.clone();

        self.bridges.by_uniqueid_mut(&bridge_uid)?.leave(&uniqueid, count, event);
        self.channels.by_uniqueid_mut(&uniqueid)?.bridge = None;
        Ok(())
    }

    fn on_blind_transfer(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let marker = {
            let transferer = self.channels.by_uniqueid(event.field("TransfererUniqueid")?)?;
            BlindTransferMarker {
                uniqueid: transferer.uniqueid.clone(),
                callerid: transferer.callerid.clone(),
                is_calling: transferer.is_calling_chan(),
            }
        };
        let transferer_uid = marker.uniqueid.clone();
        let extension = event.field("Extension")?.to_string();

        // No emission yet. The destination leg does not exist; the
        // eventual ring against it resolves this marker into a synthetic
        // b-dial plus the cold transfer.
        let transferee = self.channels.by_uniqueid_mut(event.field("TransfereeUniqueid")?)?;
        transferee.raw_blind_transfer = Some(marker);
        transferee.is_picked_up = false;
        transferee.exten = extension;

        // The transferer leaves the call; its hangup is not news.
        self.channels.by_uniqueid_mut(&transferer_uid)?.suppress_hangup = true;
        Ok(())
    }

    fn on_attended_transfer(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let orig_uid = self.channels.by_name(event.field("OrigTransfererChannel")?)?.uniqueid.clone();
        let second_uid =
            self.channels.by_name(event.field("SecondTransfererChannel")?)?.uniqueid.clone();

        match event.field("DestType")? {
            "Bridge" => self.raw_attended_transfer(&orig_uid, &second_uid, event),
            "App" if event.field("DestApp")? == "Dial" => {
                self.raw_blonde_transfer(&orig_uid, &second_uid, event)
            }
            other => {
                // Guessing at an unknown merge topology would produce
                // wrong events for every consumer downstream.
                panic!("unhandled attended transfer destination {:?}: {}", other, event);
            }
        }
    }

    fn on_hangup(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let uniqueid = self.channels.by_name(event.field("Channel")?)?.uniqueid.clone();
        let cause = event.u32_field("Cause")?;

        let (is_sip, suppress, ignore) = {
            let channel = self.channels.by_uniqueid(&uniqueid)?;
            (channel.is_sip(), channel.suppress_hangup, channel.ignore_a_hangup)
        };

        if is_sip {
            let marker = self.channels.by_uniqueid_mut(&uniqueid)?.raw_blind_transfer.take();
            let a_uid = {
                let channel = self.channels.by_uniqueid(&uniqueid)?;
                self.channels.dialing_channel(channel).uniqueid.clone()
            };

            if let Some(marker) = marker {
                self.hangup_dead_transfer(&uniqueid, &marker)?;
            } else if ignore {
                // Second leg of an already-reported teardown
            } else if suppress {
                // Transferer leaving a completed transfer
            } else if self.is_connectab_uid(&a_uid)? {
                self.hangup_connectab(&uniqueid, &a_uid, cause)?;
            } else if self.channels.by_uniqueid(&uniqueid)?.is_calling_chan() {
                let channel = self.channels.by_uniqueid(&uniqueid)?;
                let reason = HangupReason::from_cause(cause, channel.is_up());
                let (call_id, caller, to_number) =
                    (channel.linkedid.clone(), channel.callerid.clone(), channel.exten.clone());
                self.emit_a_hangup(&call_id, &caller, &to_number, reason);
            }
        }

        // Break the local-bridge pairings, then forget the channel
        let (fwd_pair, back_pair) = {
            let channel = self.channels.by_uniqueid(&uniqueid)?;
            (channel.fwd_local_bridge.clone(), channel.back_local_bridge.clone())
        };
        if let Some(pair_uid) = fwd_pair {
            if let Ok(pair) = self.channels.by_uniqueid_mut(&pair_uid) {
                pair.back_local_bridge = None;
            }
        }
        if let Some(pair_uid) = back_pair {
            if let Ok(pair) = self.channels.by_uniqueid_mut(&pair_uid) {
                pair.fwd_local_bridge = None;
            }
        }

        self.channels.remove(&uniqueid);
        if self.channels.is_empty() {
            self.reporter.trace_msg("(no channels left)");
        }
        Ok(())
    }

    // ===================================================================
    // High-level synthesizers
    // ===================================================================

    /// The calling side started dialing. The work to keep this
    /// consistent through transfers is not worth it: a b-dial follows
    /// anyway. Only the side classification sticks.
    fn raw_a_dial(&mut self, uniqueid: &str) -> Result<(), EngineError> {
        self.channels.by_uniqueid_mut(uniqueid)?.side = Some(CallSide::Calling);
        Ok(())
    }

    /// A called phone started ringing
    fn raw_b_dial(&mut self, uniqueid: &str) -> Result<(), EngineError> {
        {
            let channel = self.channels.by_uniqueid_mut(uniqueid)?;
            channel.side = Some(CallSide::Called);
            if !channel.is_sip() {
                return Ok(());
            }
            if channel.ignore_b_dial {
                // A sibling's ring already covered this channel
                channel.ignore_b_dial = false;
                return Ok(());
            }
        }

        let (chan_uniqueid, chan_linkedid) = {
            let channel = self.channels.by_uniqueid(uniqueid)?;
            (channel.uniqueid.clone(), channel.linkedid.clone())
        };
        let a_uid = {
            let channel = self.channels.by_uniqueid(uniqueid)?;
            self.channels.dialing_channel(channel).uniqueid.clone()
        };
        self.channels.by_uniqueid_mut(&a_uid)?.side = Some(CallSide::Calling);

        let marker = self.channels.by_uniqueid_mut(&a_uid)?.raw_blind_transfer.take();
        if let Some(marker) = marker {
            // A blind transfer recorded earlier resolves now: the ring of
            // the transfer destination becomes a b-dial on a pseudo call
            // id, followed by the cold transfer itself.
            let (target_uids, targets) = self.dialed_snapshot(&a_uid)?;
            let (a_exten, a_callerid) = {
                let a_chan = self.channels.by_uniqueid(&a_uid)?;
                (a_chan.exten.clone(), a_chan.callerid.clone())
            };
            for target_uid in &target_uids {
                if target_uid != uniqueid {
                    self.channels.by_uniqueid_mut(target_uid)?.ignore_b_dial = true;
                }
            }

            self.emit_b_dial(&chan_uniqueid, &marker.callerid, &a_exten, &targets);
            self.emit_cold_transfer(
                &chan_linkedid,
                &chan_uniqueid,
                &marker.callerid,
                &a_callerid,
                &a_exten,
                &targets,
            );
        } else if self.is_connectab_uid(&a_uid)? {
            // Both endpoints of a click-to-dial call are dialed by the
            // switch itself. Report the far participant as the caller,
            // carrying its account code on the local leg's caller id.
            let (caller_code, real_a_uid) = {
                let a_chan = self.channels.by_uniqueid(&a_uid)?;
                let (caller, _callee) = self.channels.connectab_participants(a_chan);
                let real_a_uid = a_chan
                    .fwd_local_bridge
                    .clone()
                    .expect("connectab call without local bridge");
                (caller.callerid.code, real_a_uid)
            };
            let patched = {
                let a_chan = self.channels.by_uniqueid(&a_uid)?;
                a_chan.callerid.with_code(caller_code)
            };
            self.channels.by_uniqueid_mut(&real_a_uid)?.callerid = patched.clone();

            let (to_number, target) = {
                let channel = self.channels.by_uniqueid(uniqueid)?;
                (channel.callerid.number.clone(), channel.callerid.clone())
            };
            self.emit_b_dial(&real_a_uid, &patched, &to_number, &[target]);
        } else if self.channels.by_uniqueid(&a_uid)?.is_sip() {
            // Plain call. One ring event covers every open dial of the
            // caller; the siblings are marked so their own rings stay
            // silent.
            let (target_uids, targets) = self.dialed_snapshot(&a_uid)?;
            let (a_exten, a_callerid) = {
                let a_chan = self.channels.by_uniqueid(&a_uid)?;
                (a_chan.exten.clone(), a_chan.callerid.clone())
            };
            for target_uid in &target_uids {
                if target_uid == uniqueid {
                    self.emit_b_dial(&chan_linkedid, &a_callerid, &a_exten, &targets);
                } else {
                    self.channels.by_uniqueid_mut(target_uid)?.ignore_b_dial = true;
                }
            }
        }
        Ok(())
    }

    /// Post-process a BridgeEnter: when the entering channel joins
    /// another sip leg, two parties got connected.
    ///
    /// Bridges holding three or more sip legs are conference territory;
    /// the pairing reported here degrades to the first peer.
    fn raw_in_call(&mut self, uniqueid: &str, bridge_uid: &str, event: &AmiEvent) -> Result<(), EngineError> {
        let peer_uids: Vec<String> = self
            .bridges
            .by_uniqueid(bridge_uid)?
            .peers()
            .iter()
            .filter(|peer| peer.as_str() != uniqueid)
            .cloned()
            .collect();

        let mut sip_peers: Vec<(String, String, CallerId)> = Vec::new();
        for peer_uid in &peer_uids {
            let peer = self
                .channels
                .by_uniqueid(peer_uid)
                .expect("bridge peer missing from channel registry");
            if peer.is_sip() {
                sip_peers.push((peer.uniqueid.clone(), peer.exten.clone(), peer.callerid.clone()));
            }
        }
        if sip_peers.is_empty() {
            return Ok(());
        }
        assert_warn!(
            sip_peers.len() < 2,
            "bridge {} holds {} sip legs, reported pairing is degraded",
            bridge_uid,
            sip_peers.len() + 1
        );

        // Only calling channels carry a dialed extension; "s" means no
        // extension.
        let (chan_exten, chan_callerid) = {
            let channel = self.channels.by_uniqueid(uniqueid)?;
            (channel.exten.clone(), channel.callerid.clone())
        };
        let (a_uid, a_exten, a_callerid, b_callerid) = if chan_exten != "s" {
            (uniqueid.to_string(), chan_exten, chan_callerid, sip_peers[0].2.clone())
        } else if let Some((peer_uid, peer_exten, peer_callerid)) =
            sip_peers.iter().find(|(_, exten, _)| exten != "s")
        {
            (peer_uid.clone(), peer_exten.clone(), peer_callerid.clone(), chan_callerid)
        } else {
            // Nobody in this bridge dialed anything; joining legs of an
            // already-reported call (e.g. after an attended transfer).
            self.reporter.trace_msg(&format!(
                "bridge {} has no calling channel, nothing to report", bridge_uid
            ));
            return Ok(());
        };

        self.channels.by_uniqueid_mut(&a_uid)?.is_picked_up = true;
        let call_id = event.field("Linkedid")?.to_string();
        self.emit_up(&call_id, &a_callerid, &a_exten, &b_callerid);
        Ok(())
    }

    /// Attended transfer, destination bridge: the transfer is complete
    /// and the second bridge holds the two remaining parties.
    fn raw_attended_transfer(
        &mut self,
        orig_uid: &str,
        second_uid: &str,
        event: &AmiEvent,
    ) -> Result<(), EngineError> {
        let bridge_uid = event.field("SecondBridgeUniqueid")?;
        let peers = self.bridges.by_uniqueid(bridge_uid)?.peers().to_vec();
        assert!(
            peers.len() == 2,
            "transfer bridge {} does not hold exactly the two remaining parties: {}",
            bridge_uid, event
        );

        let orig_linkedid = event.field("OrigTransfererLinkedid")?;
        let first_linkedid = self.channels.by_uniqueid(&peers[0])?.linkedid.clone();
        let second_linkedid = self.channels.by_uniqueid(&peers[1])?.linkedid.clone();
        let (source_uid, target_uid) = if first_linkedid == orig_linkedid {
            (peers[0].clone(), peers[1].clone())
        } else if second_linkedid == orig_linkedid {
            (peers[1].clone(), peers[0].clone())
        } else {
            panic!("no transfer bridge peer belongs to the transferred call: {}", event);
        };

        // The transferred source carries the surviving call from here on
        self.channels.by_uniqueid_mut(&source_uid)?.side = Some(CallSide::Calling);

        let redirector = self.channels.by_uniqueid(orig_uid)?.callerid.clone();
        let (call_id, caller) = {
            let source = self.channels.by_uniqueid(&source_uid)?;
            (source.linkedid.clone(), source.callerid.clone())
        };
        let (merged_id, destination) = {
            let target = self.channels.by_uniqueid(&target_uid)?;
            (target.linkedid.clone(), target.callerid.clone())
        };
        self.emit_warm_transfer(&call_id, &merged_id, &redirector, &caller, &destination);

        // Both transferer legs are about to hang up; that is not news.
        self.channels.by_uniqueid_mut(orig_uid)?.suppress_hangup = true;
        self.channels.by_uniqueid_mut(second_uid)?.suppress_hangup = true;
        Ok(())
    }

    /// Attended transfer into a still-ringing dial (blonde): the
    /// transferer released before the target answered.
    fn raw_blonde_transfer(
        &mut self,
        orig_uid: &str,
        second_uid: &str,
        event: &AmiEvent,
    ) -> Result<(), EngineError> {
        let bridge_uid = event.field("OrigBridgeUniqueid")?;
        let peers = self.bridges.by_uniqueid(bridge_uid)?.peers().to_vec();
        assert!(
            peers.len() == 2,
            "transfer bridge {} does not hold exactly two parties: {}",
            bridge_uid, event
        );

        let source_uid = if peers[0] == orig_uid {
            peers[1].clone()
        } else if peers[1] == orig_uid {
            peers[0].clone()
        } else {
            panic!("the transferer is not in its own bridge: {}", event);
        };

        self.channels.by_uniqueid_mut(&source_uid)?.side = Some(CallSide::Calling);

        let (_, targets) = self.dialed_snapshot(second_uid)?;
        let call_id = self.channels.by_uniqueid(orig_uid)?.linkedid.clone();
        let (merged_id, redirector, to_number) = {
            let second = self.channels.by_uniqueid(second_uid)?;
            (second.linkedid.clone(), second.callerid.clone(), second.exten.clone())
        };
        let caller = self.channels.by_uniqueid(&source_uid)?.callerid.clone();

        self.emit_cold_transfer(&call_id, &merged_id, &redirector, &caller, &to_number, &targets);

        self.channels.by_uniqueid_mut(orig_uid)?.suppress_hangup = true;
        self.channels.by_uniqueid_mut(second_uid)?.suppress_hangup = true;
        Ok(())
    }

    /// A channel with a pending blind transfer hangs up: the transfer
    /// attempt died before the destination could ring. The destination
    /// leg never existed, so all we can report is the end of the call.
    fn hangup_dead_transfer(
        &mut self,
        uniqueid: &str,
        marker: &BlindTransferMarker,
    ) -> Result<(), EngineError> {
        let channel_callerid = self.channels.by_uniqueid(uniqueid)?.callerid.clone();
        let (call_id, caller, to_number) = if marker.is_calling {
            (marker.uniqueid.clone(), marker.callerid.clone(), channel_callerid.number.clone())
        } else {
            (uniqueid.to_string(), channel_callerid, marker.callerid.number.clone())
        };
        self.emit_a_hangup(&call_id, &caller, &to_number, HangupReason::Completed);
        Ok(())
    }

    /// First hangup of a click-to-dial call: report it once and mark
    /// both real legs so the other teardown half stays silent.
    fn hangup_connectab(&mut self, uniqueid: &str, a_uid: &str, cause: u32) -> Result<(), EngineError> {
        let (caller_uid, callee_uid) = {
            let channel = self.channels.by_uniqueid(uniqueid)?;
            let (caller, callee) = self.channels.connectab_participants(channel);
            (caller.uniqueid.clone(), callee.uniqueid.clone())
        };

        let (callee_was_up, callee_is_down, callee_exten) = {
            let callee = self.channels.by_uniqueid(&callee_uid)?;
            (callee.is_up(), callee.state == ChannelState::Down, callee.exten.clone())
        };
        if callee_is_down {
            // The callee leg never got anywhere; there was no call
            return Ok(());
        }

        self.channels.by_uniqueid_mut(&caller_uid)?.ignore_a_hangup = true;
        self.channels.by_uniqueid_mut(&callee_uid)?.ignore_a_hangup = true;

        let (call_id, a_number) = {
            let a_chan = self.channels.by_uniqueid(a_uid)?;
            let pair_uid = a_chan
                .fwd_local_bridge
                .clone()
                .expect("connectab call without local bridge");
            (pair_uid, a_chan.callerid.number.clone())
        };
        let caller = self.channels.by_uniqueid(&caller_uid)?.callerid.with_number(&a_number);
        let reason = HangupReason::from_cause(cause, callee_was_up);
        self.emit_a_hangup(&call_id, &caller, &callee_exten, reason);
        Ok(())
    }

    // ===================================================================
    // Helpers and emission
    // ===================================================================

    fn is_connectab_uid(&self, uniqueid: &str) -> Result<bool, EngineError> {
        let channel = self.channels.by_uniqueid(uniqueid)?;
        Ok(self.channels.is_connectab(channel))
    }

    /// The open dial frontier of a channel, as uniqueids plus caller ids
    fn dialed_snapshot(&self, uniqueid: &str) -> Result<(Vec<String>, Vec<CallerId>), EngineError> {
        let channel = self.channels.by_uniqueid(uniqueid)?;
        let dialed = self.channels.dialed_channels(channel);
        let uids = dialed.iter().map(|c| c.uniqueid.clone()).collect();
        let callerids = dialed.iter().map(|c| c.callerid.clone()).collect();
        Ok((uids, callerids))
    }

    fn emit_b_dial(&mut self, call_id: &str, caller: &CallerId, to_number: &str, targets: &[CallerId]) {
        self.reporter.trace_msg(&format!(
            "{} ringing: {} --> {} ({})",
            call_id, caller, to_number, join_callerids(targets)
        ));
        self.subscriber.on_b_dial(call_id, caller, to_number, targets);
    }

    fn emit_up(&mut self, call_id: &str, caller: &CallerId, to_number: &str, callee: &CallerId) {
        self.reporter.trace_msg(&format!(
            "{} up: {} --> {} ({})",
            call_id, caller, to_number, callee
        ));
        self.subscriber.on_up(call_id, caller, to_number, callee);
    }

    fn emit_a_hangup(&mut self, call_id: &str, caller: &CallerId, to_number: &str, reason: HangupReason) {
        self.reporter.trace_msg(&format!(
            "{} hangup: {} --> {} (reason: {})",
            call_id, caller, to_number, reason
        ));
        self.subscriber.on_a_hangup(call_id, caller, to_number, reason);
    }

    fn emit_warm_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        destination: &CallerId,
    ) {
        self.reporter.trace_msg(&format!(
            "{} <== {} attn xfer: {} <--> {} (through {})",
            call_id, merged_id, caller, destination, redirector
        ));
        self.subscriber.on_warm_transfer(call_id, merged_id, redirector, caller, destination);
    }

    fn emit_cold_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        to_number: &str,
        targets: &[CallerId],
    ) {
        self.reporter.trace_msg(&format!(
            "{} <== {} bld xfer: {} <--> {} (through {})",
            call_id, merged_id, caller, join_callerids(targets), redirector
        ));
        self.subscriber.on_cold_transfer(call_id, merged_id, redirector, caller, to_number, targets);
    }
}

fn join_callerids(callerids: &[CallerId]) -> String {
    callerids.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
}
