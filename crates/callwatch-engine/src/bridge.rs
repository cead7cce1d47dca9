use std::collections::HashMap;

use callwatch_core::{AmiEvent, EngineError};

/// A set of channels currently sharing audio.
///
/// Peers are kept in entry order, which keeps everything derived from
/// peer iteration deterministic. The peer count is checked against the
/// count the switch reports in every enter/leave event; a deviation
/// means the in-memory model has lost integrity and the process must
/// not continue producing business events.
#[derive(Debug)]
pub(crate) struct Bridge {
    pub uniqueid: String,
    peers: Vec<String>,
}

impl Bridge {
    fn new(uniqueid: &str) -> Self {
        Self { uniqueid: uniqueid.to_string(), peers: Vec::new() }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn enter(&mut self, uniqueid: &str, reported_count: u32, event: &AmiEvent) {
        assert!(
            !self.peers.iter().any(|p| p == uniqueid),
            "channel {} enters bridge {} twice: {}",
            uniqueid, self.uniqueid, event
        );
        self.peers.push(uniqueid.to_string());
        assert_eq!(
            self.peers.len(),
            reported_count as usize,
            "bridge {} peer count diverges from the switch: {}",
            self.uniqueid, event
        );
    }

    pub fn leave(&mut self, uniqueid: &str, reported_count: u32, event: &AmiEvent) {
        let position = self.peers.iter().position(|p| p == uniqueid);
        let Some(position) = position else {
            panic!("channel {} leaves bridge {} it never entered: {}", uniqueid, self.uniqueid, event);
        };
        self.peers.remove(position);
        assert_eq!(
            self.peers.len(),
            reported_count as usize,
            "bridge {} peer count diverges from the switch: {}",
            self.uniqueid, event
        );
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }
}

#[derive(Debug, Default)]
pub(crate) struct BridgeRegistry {
    bridges: HashMap<String, Bridge>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, uniqueid: &str, event: &AmiEvent) {
        assert!(
            !self.bridges.contains_key(uniqueid),
            "bridge {} created twice: {}",
            uniqueid, event
        );
        self.bridges.insert(uniqueid.to_string(), Bridge::new(uniqueid));
    }

    /// A bridge must be empty by the time the switch destroys it
    pub fn destroy(&mut self, uniqueid: &str, event: &AmiEvent) -> Result<(), EngineError> {
        let bridge = self.by_uniqueid(uniqueid)?;
        assert_eq!(bridge.len(), 0, "bridge {} destroyed while occupied: {}", uniqueid, event);
        self.bridges.remove(uniqueid);
        Ok(())
    }

    pub fn by_uniqueid(&self, uniqueid: &str) -> Result<&Bridge, EngineError> {
        self.bridges.get(uniqueid).ok_or_else(|| EngineError::MissingBridge {
            uniqueid: uniqueid.to_string(),
        })
    }

    pub fn by_uniqueid_mut(&mut self, uniqueid: &str) -> Result<&mut Bridge, EngineError> {
        self.bridges.get_mut(uniqueid).ok_or_else(|| EngineError::MissingBridge {
            uniqueid: uniqueid.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn event() -> AmiEvent {
        AmiEvent::from_pairs(&[("Event", "BridgeEnter")])
    }

    #[test]
    fn test_enter_leave_bookkeeping() {
        let mut registry = BridgeRegistry::new();
        registry.create("bridge-1", &event());

        let bridge = registry.by_uniqueid_mut("bridge-1").unwrap();
        bridge.enter("chan-a", 1, &event());
        bridge.enter("chan-b", 2, &event());
        assert_eq!(bridge.peers(), &["chan-a".to_string(), "chan-b".to_string()]);

        bridge.leave("chan-a", 1, &event());
        bridge.leave("chan-b", 0, &event());

        registry.destroy("bridge-1", &event()).unwrap();
        assert_eq!(registry.len(), 0);
        assert!(matches!(
            registry.by_uniqueid("bridge-1"),
            Err(EngineError::MissingBridge { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "peer count diverges")]
    fn test_count_mismatch_is_fatal() {
        let mut registry = BridgeRegistry::new();
        registry.create("bridge-1", &event());
        registry.by_uniqueid_mut("bridge-1").unwrap().enter("chan-a", 2, &event());
    }

    #[test]
    #[should_panic(expected = "destroyed while occupied")]
    fn test_destroy_occupied_is_fatal() {
        let mut registry = BridgeRegistry::new();
        registry.create("bridge-1", &event());
        registry.by_uniqueid_mut("bridge-1").unwrap().enter("chan-a", 1, &event());
        registry.destroy("bridge-1", &event()).unwrap();
    }

    #[test]
    #[should_panic(expected = "created twice")]
    fn test_duplicate_create_is_fatal() {
        let mut registry = BridgeRegistry::new();
        registry.create("bridge-1", &event());
        registry.create("bridge-1", &event());
    }
}
