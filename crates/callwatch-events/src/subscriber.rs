use callwatch_core::{AmiEvent, CallerId, HangupReason};

/// The hooks an embedder implements to consume high-level call events.
///
/// All hooks run inline on the engine's event loop: one raw event is
/// processed to completion, including these callbacks, before the next
/// raw event is consumed. Implementations must not block for long and
/// must not call back into the engine.
///
/// Every hook has an empty default body so a subscriber only implements
/// what it cares about.
pub trait CallEventSubscriber {
    /// A called phone started ringing.
    ///
    /// `call_id` identifies the conversation, `caller` is the initiator,
    /// `to_number` the dialed number and `targets` the identities of all
    /// devices ringing for this dial (more than one for a ring group).
    fn on_b_dial(&mut self, call_id: &str, caller: &CallerId, to_number: &str, targets: &[CallerId]) {
        let _ = (call_id, caller, to_number, targets);
    }

    /// Two parties are connected and talking. After a blind or blonde
    /// transfer an up is also sent for the two remaining parties.
    fn on_up(&mut self, call_id: &str, caller: &CallerId, to_number: &str, callee: &CallerId) {
        let _ = (call_id, caller, to_number, callee);
    }

    /// The calling side of a conversation is gone.
    fn on_a_hangup(&mut self, call_id: &str, caller: &CallerId, to_number: &str, reason: HangupReason) {
        let _ = (call_id, caller, to_number, reason);
    }

    /// An attended transfer completed: the call `merged_id` is merged
    /// into `call_id`, `redirector` performed the transfer.
    fn on_warm_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        destination: &CallerId,
    ) {
        let _ = (call_id, merged_id, redirector, caller, destination);
    }

    /// A blind or blonde transfer completed. The redirector released
    /// before the target answered, so the actual other end is only known
    /// once one of `targets` picks up (which produces a separate up).
    fn on_cold_transfer(
        &mut self,
        call_id: &str,
        merged_id: &str,
        redirector: &CallerId,
        caller: &CallerId,
        to_number: &str,
        targets: &[CallerId],
    ) {
        let _ = (call_id, merged_id, redirector, caller, to_number, targets);
    }

    /// Custom UserEvent messages pass through unmodified.
    fn on_user_event(&mut self, event: &AmiEvent) {
        let _ = event;
    }
}
