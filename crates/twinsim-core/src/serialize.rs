//! Checkpoints of the mutable simulation state.
//!
//! A checkpoint holds the state store, active markers, pending marker waves,
//! the tick bookkeeping and the last spike, encoded with `bitcode` behind a
//! versioned header. The network itself is not encoded: a checkpoint can
//! only be loaded into an engine built from the same topology.

use crate::effect::EffectManager;
use crate::engine::{Engine, SpikeRecord};
use crate::fixed::Fixed64;
use crate::id::{EdgeId, NodeId};
use crate::schedule::SpawnScheduler;
use crate::sim::SimState;
use crate::state::{EdgeState, NodeState, StateStore};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use tracing::debug;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a twinsim checkpoint.
pub const CHECKPOINT_MAGIC: u32 = 0x7517_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", CHECKPOINT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("checkpoint from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error(
        "checkpoint is for a different network: {expected_nodes} nodes / {expected_edges} lanes here, {found_nodes} / {found_edges} in checkpoint"
    )]
    TopologyMismatch {
        expected_nodes: usize,
        expected_edges: usize,
        found_nodes: usize,
        found_edges: usize,
    },
    #[error("checkpoint references an id this network does not have")]
    UnknownId,
    #[error("checkpoint state for node '{key}' is out of bounds")]
    OutOfBounds { key: String },
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Header prepended to every checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the checkpoint was taken.
    pub tick: u64,
    pub node_count: usize,
    pub edge_count: usize,
}

impl CheckpointHeader {
    fn for_engine(engine: &Engine) -> Self {
        Self {
            magic: CHECKPOINT_MAGIC,
            version: FORMAT_VERSION,
            tick: engine.sim_state.tick,
            node_count: engine.graph().node_count(),
            edge_count: engine.graph().edge_count(),
        }
    }

    /// Check magic and version. Returns `Ok(())` if this build can read it.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != CHECKPOINT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    header: CheckpointHeader,
    nodes: SecondaryMap<NodeId, NodeState>,
    edges: SecondaryMap<EdgeId, EdgeState>,
    effects: EffectManager,
    scheduler: SpawnScheduler,
    sim_state: SimState,
    last_spike: Option<SpikeRecord>,
}

/// Decode only to read the header, e.g. to show the tick of a saved slot.
pub fn read_checkpoint_header(data: &[u8]) -> Result<CheckpointHeader, DeserializeError> {
    let checkpoint: Checkpoint =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(checkpoint.header)
}

// ---------------------------------------------------------------------------
// Engine methods
// ---------------------------------------------------------------------------

impl Engine {
    /// Encode the mutable simulation state.
    ///
    /// Listeners and buffered events are not part of a checkpoint.
    pub fn save_state(&self) -> Result<Vec<u8>, SerializeError> {
        let checkpoint = Checkpoint {
            header: CheckpointHeader::for_engine(self),
            nodes: self.state.nodes.clone(),
            edges: self.state.edges.clone(),
            effects: self.effects.clone(),
            scheduler: self.scheduler.clone(),
            sim_state: self.sim_state.clone(),
            last_spike: self.last_spike,
        };
        bitcode::serialize(&checkpoint).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Replace the mutable simulation state with a checkpoint.
    ///
    /// The engine is untouched when an error is returned. Buffered events
    /// are dropped on success.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), DeserializeError> {
        let checkpoint: Checkpoint =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        checkpoint.header.validate()?;

        let graph = self.graph();
        if checkpoint.header.node_count != graph.node_count()
            || checkpoint.header.edge_count != graph.edge_count()
        {
            return Err(DeserializeError::TopologyMismatch {
                expected_nodes: graph.node_count(),
                expected_edges: graph.edge_count(),
                found_nodes: checkpoint.header.node_count,
                found_edges: checkpoint.header.edge_count,
            });
        }
        let ids_known = checkpoint.nodes.keys().all(|id| graph.contains_node(id))
            && checkpoint.edges.keys().all(|id| graph.contains_edge(id))
            && graph.nodes().all(|(id, _)| checkpoint.nodes.contains_key(id));
        if !ids_known {
            return Err(DeserializeError::UnknownId);
        }
        for (id, state) in checkpoint.nodes.iter() {
            let Some(node) = graph.get_node(id) else {
                return Err(DeserializeError::UnknownId);
            };
            if state.inventory < Fixed64::ZERO
                || state.inventory > node.capacity
                || state.demand < Fixed64::ZERO
            {
                return Err(DeserializeError::OutOfBounds {
                    key: node.key.clone(),
                });
            }
        }

        self.state = StateStore {
            nodes: checkpoint.nodes,
            edges: checkpoint.edges,
        };
        self.effects = checkpoint.effects;
        self.scheduler = checkpoint.scheduler;
        self.sim_state = checkpoint.sim_state;
        self.last_spike = checkpoint.last_spike;
        self.event_bus_mut().clear_all();
        self.refresh_state_hash();
        debug!(tick = self.sim_state.tick, "checkpoint loaded");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CheckpointRing
// ---------------------------------------------------------------------------

/// A single saved checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointEntry {
    /// Tick at which the checkpoint was taken.
    pub tick: u64,
    pub data: Vec<u8>,
}

/// A fixed-capacity ring of checkpoints for rewinding. When full, the
/// oldest checkpoint is evicted.
#[derive(Debug)]
pub struct CheckpointRing {
    entries: Vec<Option<CheckpointEntry>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
}

impl CheckpointRing {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Save the engine's current state into the ring.
    pub fn capture(&mut self, engine: &Engine) -> Result<(), SerializeError> {
        let data = engine.save_state()?;
        self.push(CheckpointEntry {
            tick: engine.tick(),
            data,
        });
        Ok(())
    }

    pub fn push(&mut self, entry: CheckpointEntry) {
        self.entries[self.head] = Some(entry);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get a checkpoint by index (0 = oldest, len-1 = newest).
    pub fn get(&self, index: usize) -> Option<&CheckpointEntry> {
        if index >= self.len {
            return None;
        }
        let start = if self.len < self.capacity() {
            0
        } else {
            self.head
        };
        self.entries[(start + index) % self.capacity()].as_ref()
    }

    pub fn latest(&self) -> Option<&CheckpointEntry> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimConfig;
    use crate::test_utils::*;
    use crate::topology::continental_network;

    fn continental() -> Engine {
        Engine::from_topology(&continental_network(), SimConfig::default()).0
    }

    #[test]
    fn round_trip_restores_state() {
        let mut engine = continental();
        engine.advance(0);
        engine.trigger_spike_by_key("dc-6", fixed(60.0));
        engine.advance(150);

        let saved = engine.save_state().unwrap();
        let hash = engine.state_hash();
        let effects = engine.effects().len();
        let pending = engine.scheduler().pending_count();

        for t in 2..30 {
            engine.advance(t * 150);
        }
        assert_ne!(engine.state_hash(), hash);

        engine.load_state(&saved).unwrap();
        assert_eq!(engine.state_hash(), hash);
        assert_eq!(engine.effects().len(), effects);
        assert_eq!(engine.scheduler().pending_count(), pending);
        assert_eq!(engine.tick(), 2);
        assert!(engine.last_spike().is_some());
    }

    #[test]
    fn replay_after_load_is_deterministic() {
        let mut engine = continental();
        engine.trigger_spike_by_key("dc-3", fixed(40.0));
        let saved = engine.save_state().unwrap();

        for _ in 0..25 {
            engine.step();
        }
        let first = engine.state_hash();

        engine.load_state(&saved).unwrap();
        for _ in 0..25 {
            engine.step();
        }
        assert_eq!(engine.state_hash(), first);
    }

    #[test]
    fn header_carries_tick_and_shape() {
        let mut engine = continental();
        engine.step();
        let header = read_checkpoint_header(&engine.save_state().unwrap()).unwrap();
        assert_eq!(header.tick, 1);
        assert_eq!(header.node_count, 6);
        assert_eq!(header.edge_count, 7);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn bad_headers_rejected() {
        let mut header = CheckpointHeader {
            magic: 0xDEAD_BEEF,
            version: FORMAT_VERSION,
            tick: 0,
            node_count: 0,
            edge_count: 0,
        };
        assert!(matches!(header.validate(), Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))));
        header.magic = CHECKPOINT_MAGIC;
        header.version = FORMAT_VERSION + 1;
        assert!(matches!(header.validate(), Err(DeserializeError::FutureVersion(_))));
        header.version = 0;
        assert!(matches!(header.validate(), Err(DeserializeError::UnsupportedVersion(0))));
    }

    #[test]
    fn load_into_other_network_fails() {
        let engine = continental();
        let saved = engine.save_state().unwrap();
        let mut other = manual_engine(&two_node_topology(50.0, 50.0));
        let before = other.state_hash();
        let err = other.load_state(&saved).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::TopologyMismatch {
                expected_nodes: 2,
                found_nodes: 6,
                ..
            }
        ));
        assert_eq!(other.state_hash(), before);
    }

    fn tampered(engine: &Engine, key: &str, inventory: f64, demand: f64) -> Vec<u8> {
        let mut checkpoint: Checkpoint = bitcode::deserialize(&engine.save_state().unwrap()).unwrap();
        let node = engine.graph().node_by_key(key).unwrap();
        let state = checkpoint.nodes.get_mut(node).unwrap();
        state.inventory = fixed(inventory);
        state.demand = fixed(demand);
        bitcode::serialize(&checkpoint).unwrap()
    }

    #[test]
    fn overfull_checkpoint_rejected() {
        let mut engine = manual_engine(&two_node_topology(50.0, 50.0));
        let data = tampered(&engine, "a", 5_000.0, 0.0);
        let before = engine.state_hash();

        let err = engine.load_state(&data).unwrap_err();
        assert!(matches!(err, DeserializeError::OutOfBounds { ref key } if key == "a"));
        assert_eq!(engine.state_hash(), before);
        assert_inventory(&engine, "a", 50.0);
    }

    #[test]
    fn negative_demand_checkpoint_rejected() {
        let mut engine = manual_engine(&two_node_topology(50.0, 50.0));
        let data = tampered(&engine, "b", 50.0, -40.0);
        assert!(matches!(
            engine.load_state(&data),
            Err(DeserializeError::OutOfBounds { .. })
        ));
        assert_demand(&engine, "b", 0.0);
    }

    #[test]
    fn full_node_checkpoint_accepted() {
        let mut engine = manual_engine(&two_node_topology(50.0, 50.0));
        let data = tampered(&engine, "a", 100.0, 0.0);
        engine.load_state(&data).unwrap();
        assert_inventory(&engine, "a", 100.0);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut engine = continental();
        let err = engine.load_state(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, DeserializeError::Decode(_)));
    }

    #[test]
    fn ring_evicts_oldest() {
        let mut engine = continental();
        let mut ring = CheckpointRing::new(3);
        for _ in 0..5 {
            engine.step();
            ring.capture(&engine).unwrap();
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.get(0).unwrap().tick, 3);
        assert_eq!(ring.latest().unwrap().tick, 5);
        assert!(ring.get(3).is_none());

        let oldest = ring.get(0).unwrap().data.clone();
        engine.load_state(&oldest).unwrap();
        assert_eq!(engine.tick(), 3);

        ring.clear();
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
    }
}
