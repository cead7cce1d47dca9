//! Walks over the dial and local-bridge links that answer "who is
//! really calling whom".
//!
//! The switch routes calls through local channel pairs, so the direct
//! dial relations rarely connect two real legs. These walks follow
//! `back_dial`/`fwd_dials` and hop transparently across local-bridge
//! pairings to find the real endpoints. Links reference channels by
//! uniqueid; a link whose target already left the registry is treated
//! as absent.

use crate::channel::{Channel, ChannelRegistry};

impl ChannelRegistry {
    /// Walk backward from `chan` to the channel on whose behalf it is
    /// being called. Returns `chan` itself for a root channel.
    pub(crate) fn dialing_channel<'a>(&'a self, chan: &'a Channel) -> &'a Channel {
        let mut current = chan;
        loop {
            let Some(back_uid) = current.back_dial.as_deref() else {
                return current;
            };
            let Ok(mut a_chan) = self.by_uniqueid(back_uid) else {
                return current;
            };
            // A dialing local half continues on the back of its pairing
            if let Some(pair_uid) = a_chan.back_local_bridge.as_deref() {
                if let Ok(pair) = self.by_uniqueid(pair_uid) {
                    a_chan = pair;
                }
            }
            current = a_chan;
        }
    }

    /// Collect the frontier of real (non-local) channels being dialed on
    /// behalf of `chan`, in discovery order.
    pub(crate) fn dialed_channels<'a>(&'a self, chan: &'a Channel) -> Vec<&'a Channel> {
        let mut found: Vec<&Channel> = Vec::new();
        self.collect_dialed(chan, &mut found);
        found
    }

    fn collect_dialed<'a>(&'a self, chan: &'a Channel, found: &mut Vec<&'a Channel>) {
        let dials = if let Some(pair_uid) = chan.fwd_local_bridge.as_deref() {
            match self.by_uniqueid(pair_uid) {
                Ok(pair) => &pair.fwd_dials,
                Err(_) => return,
            }
        } else {
            &chan.fwd_dials
        };

        for dial_uid in dials {
            let Ok(b_chan) = self.by_uniqueid(dial_uid) else {
                continue;
            };
            if let Some(pair_uid) = b_chan.fwd_local_bridge.as_deref() {
                let Ok(hopped) = self.by_uniqueid(pair_uid) else {
                    continue;
                };
                assert!(
                    hopped.fwd_local_bridge.is_none(),
                    "double local bridge behind {}", hopped.name
                );
                self.collect_dialed(hopped, found);
            } else {
                assert!(
                    b_chan.fwd_dials.is_empty(),
                    "dialed channel {} dials onward itself", b_chan.name
                );
                if !found.iter().any(|c| c.uniqueid == b_chan.uniqueid) {
                    found.push(b_chan);
                }
            }
        }
    }

    /// Whether `chan` hangs off the switch-originated two-leg pattern
    /// used for click-to-dial: its root dialing channel is one half of a
    /// local bridge and both halves have open outbound dials.
    pub(crate) fn is_connectab(&self, chan: &Channel) -> bool {
        let local_a = self.dialing_channel(chan);
        let Some(pair_uid) = local_a.fwd_local_bridge.as_deref() else {
            return false;
        };
        let Ok(local_b) = self.by_uniqueid(pair_uid) else {
            return false;
        };
        !local_a.fwd_dials.is_empty() && !local_b.fwd_dials.is_empty()
    }

    /// The two real endpoints of a click-to-dial call: the caller hangs
    /// off the far half of the local bridge, the callee off the dialing
    /// channel itself. Only valid when `is_connectab` holds.
    pub(crate) fn connectab_participants<'a>(
        &'a self,
        chan: &'a Channel,
    ) -> (&'a Channel, &'a Channel) {
        let local_a = self.dialing_channel(chan);
        let pair_uid = local_a.fwd_local_bridge.as_deref()
            .expect("connectab call without local bridge");
        let local_b = self.by_uniqueid(pair_uid)
            .expect("connectab local bridge half is gone");

        let callee = self.by_uniqueid(&local_a.fwd_dials[0])
            .expect("connectab callee leg is gone");
        let caller = self.by_uniqueid(&local_b.fwd_dials[0])
            .expect("connectab caller leg is gone");
        (caller, callee)
    }
}

#[cfg(test)]
mod test {

    use callwatch_core::AmiEvent;

    use super::*;
    use crate::channel::Channel;

    fn make_channel(registry: &mut ChannelRegistry, uniqueid: &str, name: &str) {
        let event = AmiEvent::from_pairs(&[
            ("Event", "Newchannel"),
            ("Uniqueid", uniqueid),
            ("Linkedid", uniqueid),
            ("Channel", name),
            ("ChannelState", "0"),
            ("Exten", "s"),
            ("AccountCode", ""),
            ("CallerIDName", ""),
            ("CallerIDNum", ""),
            ("ConnectedLineName", ""),
            ("ConnectedLineNum", ""),
        ]);
        registry.add(Channel::from_event(&event).unwrap());
    }

    fn dial(registry: &mut ChannelRegistry, source: &str, target: &str) {
        registry.by_uniqueid_mut(source).unwrap().fwd_dials.push(target.to_string());
        registry.by_uniqueid_mut(target).unwrap().back_dial = Some(source.to_string());
    }

    fn local_bridge(registry: &mut ChannelRegistry, one: &str, two: &str) {
        registry.by_uniqueid_mut(one).unwrap().fwd_local_bridge = Some(two.to_string());
        registry.by_uniqueid_mut(two).unwrap().back_local_bridge = Some(one.to_string());
    }

    /// A -> Local;1 <-> Local;2 -> B, as the switch's dialplan routing
    /// builds it for a regular internal call
    fn build_local_hop_topology() -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        make_channel(&mut registry, "a", "SIP/a-00000001");
        make_channel(&mut registry, "l1", "Local/202@route-00000001;1");
        make_channel(&mut registry, "l2", "Local/202@route-00000001;2");
        make_channel(&mut registry, "b", "SIP/b-00000002");
        dial(&mut registry, "a", "l1");
        local_bridge(&mut registry, "l1", "l2");
        dial(&mut registry, "l2", "b");
        registry
    }

    #[test]
    fn test_dialing_channel_walks_local_hops() {
        let registry = build_local_hop_topology();
        let b_chan = registry.by_uniqueid("b").unwrap();
        assert_eq!(registry.dialing_channel(b_chan).uniqueid, "a");

        // a root channel resolves to itself
        let a_chan = registry.by_uniqueid("a").unwrap();
        assert_eq!(registry.dialing_channel(a_chan).uniqueid, "a");
    }

    #[test]
    fn test_dialed_channels_walks_local_hops() {
        let registry = build_local_hop_topology();
        let a_chan = registry.by_uniqueid("a").unwrap();
        let dialed: Vec<&str> =
            registry.dialed_channels(a_chan).iter().map(|c| c.uniqueid.as_str()).collect();
        assert_eq!(dialed, vec!["b"]);
    }

    #[test]
    fn test_dialed_channels_multiple_targets() {
        let mut registry = ChannelRegistry::new();
        make_channel(&mut registry, "a", "SIP/a-00000001");
        make_channel(&mut registry, "b1", "SIP/b1-00000002");
        make_channel(&mut registry, "b2", "SIP/b2-00000003");
        dial(&mut registry, "a", "b1");
        dial(&mut registry, "a", "b2");

        let a_chan = registry.by_uniqueid("a").unwrap();
        let dialed: Vec<&str> =
            registry.dialed_channels(a_chan).iter().map(|c| c.uniqueid.as_str()).collect();
        assert_eq!(dialed, vec!["b1", "b2"]);
    }

    #[test]
    #[should_panic(expected = "double local bridge")]
    fn test_double_local_bridge_is_fatal() {
        let mut registry = build_local_hop_topology();
        make_channel(&mut registry, "l3", "Local/202@route-00000002;1");
        // forge a second hop behind the first pairing
        registry.by_uniqueid_mut("l2").unwrap().fwd_local_bridge = Some("l3".to_string());

        let a_chan = registry.by_uniqueid("a").unwrap();
        registry.dialed_channels(a_chan);
    }

    #[test]
    fn test_connectab_detection() {
        // Originate: half1 <-> half2, half1 dials the callee leg and
        // half2 dials the caller leg
        let mut registry = ChannelRegistry::new();
        make_channel(&mut registry, "h1", "Local/203@route-00000001;1");
        make_channel(&mut registry, "h2", "Local/203@route-00000001;2");
        make_channel(&mut registry, "caller", "SIP/caller-00000001");
        make_channel(&mut registry, "callee", "SIP/callee-00000002");
        local_bridge(&mut registry, "h1", "h2");
        dial(&mut registry, "h2", "caller");
        dial(&mut registry, "h1", "callee");

        let callee = registry.by_uniqueid("callee").unwrap();
        assert!(registry.is_connectab(callee));
        let (caller_chan, callee_chan) = registry.connectab_participants(callee);
        assert_eq!(caller_chan.uniqueid, "caller");
        assert_eq!(callee_chan.uniqueid, "callee");

        // without the caller-side dial it is a plain local route
        registry.by_uniqueid_mut("h2").unwrap().fwd_dials.clear();
        let callee = registry.by_uniqueid("callee").unwrap();
        assert!(!registry.is_connectab(callee));
    }
}
