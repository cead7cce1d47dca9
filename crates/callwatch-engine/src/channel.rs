use std::collections::HashMap;

use callwatch_core::{AmiEvent, CallerId, ChannelState, EngineError};

/// Which role a channel plays in its call, once known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallSide {
    /// The leg that initiated the call (A side)
    Calling,
    /// A leg that is being called (B side)
    Called,
}

/// Snapshot of the transferring party, left on the transferee when a
/// BlindTransfer event arrives. The transferer usually hangs up (and
/// leaves the registry) before the transfer destination starts ringing,
/// so the marker carries the data the deferred emissions need rather
/// than a channel id.
#[derive(Debug, Clone)]
pub(crate) struct BlindTransferMarker {
    pub uniqueid: String,
    pub callerid: CallerId,
    pub is_calling: bool,
}

/// One leg of audio as the switch sees it.
///
/// Channels reference each other through uniqueids only (dial relations,
/// local-bridge pairing, bridge membership); the registry is the sole
/// owner of the `Channel` values themselves.
#[derive(Debug)]
pub(crate) struct Channel {
    pub uniqueid: String,
    pub linkedid: String,
    pub name: String,
    pub state: ChannelState,
    pub exten: String,
    pub callerid: CallerId,
    pub connected_line: CallerId,
    pub side: Option<CallSide>,
    pub is_picked_up: bool,

    /// Channels this channel is dialing, in dial order
    pub fwd_dials: Vec<String>,
    /// The single channel dialing this one
    pub back_dial: Option<String>,

    /// Pairing between the two halves of a local channel
    pub fwd_local_bridge: Option<String>,
    pub back_local_bridge: Option<String>,

    /// Bridge this channel currently sits in
    pub bridge: Option<String>,

    // Cross-event carry state, one field per marker
    pub ignore_b_dial: bool,
    pub ignore_a_hangup: bool,
    pub suppress_hangup: bool,
    pub raw_blind_transfer: Option<BlindTransferMarker>,
}

impl Channel {
    /// Build a channel from a Newchannel event
    pub fn from_event(event: &AmiEvent) -> Result<Self, EngineError> {
        let state = ChannelState::try_from(event.u32_field("ChannelState")?)?;
        let callerid = CallerId::new(
            event.u32_field_or_zero("AccountCode")?,
            event.field("CallerIDName")?,
            event.field("CallerIDNum")?,
        );
        let connected_line = CallerId::new(
            0,
            event.field("ConnectedLineName")?,
            event.field("ConnectedLineNum")?,
        );

        Ok(Self {
            uniqueid: event.field("Uniqueid")?.to_string(),
            linkedid: event.field("Linkedid")?.to_string(),
            name: event.field("Channel")?.to_string(),
            state,
            exten: event.field("Exten")?.to_string(),
            callerid,
            connected_line,
            side: None,
            is_picked_up: false,
            fwd_dials: Vec::new(),
            back_dial: None,
            fwd_local_bridge: None,
            back_local_bridge: None,
            bridge: None,
            ignore_b_dial: false,
            ignore_a_hangup: false,
            suppress_hangup: false,
            raw_blind_transfer: None,
        })
    }

    /// Local channels are the switch's internal routing glue; everything
    /// else is a real (sip) leg.
    pub fn is_local(&self) -> bool {
        self.name.starts_with("Local/")
    }

    pub fn is_sip(&self) -> bool {
        !self.is_local()
    }

    pub fn is_up(&self) -> bool {
        self.state == ChannelState::Up
    }

    pub fn is_calling_chan(&self) -> bool {
        self.side == Some(CallSide::Calling)
    }

    /// Absorb identity updates riding along any event about this channel:
    /// linkedid, caller id name/number, presentation flag, connected line.
    pub fn sync_data(&mut self, event: &AmiEvent) {
        if let Some(linkedid) = event.get("Linkedid") {
            self.linkedid = linkedid.to_string();
        }

        if let Some(number) = event.get("CallerIDNum") {
            let name = event.get("CallerIDName").unwrap_or("");
            self.update_callerid(name, number);
        }

        if let Some(pres) = event.get("CID-CallingPres") {
            self.callerid = self.callerid.with_public(pres.contains("Allowed"));
        }

        if let Some(number) = event.get("ConnectedLineNum") {
            let name = event.get("ConnectedLineName").unwrap_or("");
            self.connected_line = self.connected_line.with_name(name).with_number(number);
        }
    }

    /// Replace caller id name and number. An incoming number equal to the
    /// account code is dropped in favor of the number we already have:
    /// call pickups resend the account code as the caller number, and the
    /// account code must never surface as a displayed number.
    fn update_callerid(&mut self, name: &str, number: &str) {
        let updated = self.callerid.with_name(name);
        self.callerid = if number == self.callerid.code.to_string() {
            updated
        } else {
            updated.with_number(number)
        };
    }

    /// Apply a NewCallerid event
    pub fn set_callerid(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let name = event.field("CallerIDName")?.to_string();
        let number = event.field("CallerIDNum")?.to_string();
        let pres = event.field("CID-CallingPres")?;
        self.callerid = self.callerid.with_public(pres.contains("Allowed"));
        self.update_callerid(&name, &number);
        Ok(())
    }

    /// Apply a NewAccountCode event. Only the first code sticks.
    pub fn set_accountcode(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let code = event.u32_field_or_zero("AccountCode")?;
        if self.callerid.code == 0 {
            self.callerid = self.callerid.with_code(code);
        } else {
            tracing::debug!(
                "{}: ignoring account code update {} -> {}",
                self.name, self.callerid.code, code
            );
        }
        Ok(())
    }

    /// Apply a NewConnectedLine event
    pub fn set_connected_line(&mut self, event: &AmiEvent) -> Result<(), EngineError> {
        let name = event.field("ConnectedLineName")?;
        let number = event.field("ConnectedLineNum")?;
        self.connected_line = self.connected_line.with_name(name).with_number(number);
        Ok(())
    }
}

/// Owns all live channels, indexed by uniqueid and by channel name.
#[derive(Debug, Default)]
pub(crate) struct ChannelRegistry {
    channels: HashMap<String, Channel>,
    names: HashMap<String, String>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: Channel) {
        self.names.insert(channel.name.clone(), channel.uniqueid.clone());
        self.channels.insert(channel.uniqueid.clone(), channel);
    }

    pub fn by_uniqueid(&self, uniqueid: &str) -> Result<&Channel, EngineError> {
        self.channels.get(uniqueid).ok_or_else(|| EngineError::MissingUniqueid {
            uniqueid: uniqueid.to_string(),
        })
    }

    pub fn by_uniqueid_mut(&mut self, uniqueid: &str) -> Result<&mut Channel, EngineError> {
        self.channels.get_mut(uniqueid).ok_or_else(|| EngineError::MissingUniqueid {
            uniqueid: uniqueid.to_string(),
        })
    }

    pub fn by_name(&self, name: &str) -> Result<&Channel, EngineError> {
        let uniqueid = self.names.get(name).ok_or_else(|| EngineError::MissingChannel {
            name: name.to_string(),
        })?;
        self.by_uniqueid(uniqueid)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Result<&mut Channel, EngineError> {
        let uniqueid = self
            .names
            .get(name)
            .ok_or_else(|| EngineError::MissingChannel { name: name.to_string() })?
            .clone();
        self.by_uniqueid_mut(&uniqueid)
    }

    pub fn remove(&mut self, uniqueid: &str) -> Option<Channel> {
        let channel = self.channels.remove(uniqueid)?;
        self.names.remove(&channel.name);
        assert_eq!(self.channels.len(), self.names.len(), "channel indexes out of sync");
        Some(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
