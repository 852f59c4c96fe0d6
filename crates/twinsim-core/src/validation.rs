//! Topology linting and state comparison tools.
//!
//! [`validate_topology`] reports everything questionable about a network
//! description without refusing it; resolution stays lenient. The diff and
//! determinism helpers compare two engines built over the same network.

use crate::engine::{Engine, SimConfig};
use crate::serialize::DeserializeError;
use crate::topology::Topology;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Topology issues
// ---------------------------------------------------------------------------

/// Something in a topology that resolution will silently correct or drop.
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyIssue {
    /// A later node reuses an earlier node's key and will be dropped.
    DuplicateNode { id: String },
    /// Capacity is zero or negative.
    NonPositiveCapacity { id: String, capacity: f64 },
    /// Starting inventory outside `[0, capacity]`; it will be clamped.
    InventoryOutOfRange { id: String, inventory: f64, capacity: f64 },
    /// A lane names a node that does not exist; the lane will be dropped.
    UnresolvedEndpoint { index: usize, missing: String },
    /// A lane from a node to itself.
    SelfLoop { index: usize, id: String },
    /// A lane whose capacity is zero or negative never carries flow.
    NonPositiveLaneCapacity { index: usize, capacity: f64 },
}

/// Lint a topology. An empty result means it resolves unchanged.
pub fn validate_topology(topology: &Topology) -> Vec<TopologyIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for node in &topology.nodes {
        if !seen.insert(node.id.as_str()) {
            issues.push(TopologyIssue::DuplicateNode { id: node.id.clone() });
            continue;
        }
        if !(node.capacity > 0.0) {
            issues.push(TopologyIssue::NonPositiveCapacity {
                id: node.id.clone(),
                capacity: node.capacity,
            });
        }
        if !(0.0..=node.capacity.max(0.0)).contains(&node.inventory) {
            issues.push(TopologyIssue::InventoryOutOfRange {
                id: node.id.clone(),
                inventory: node.inventory,
                capacity: node.capacity,
            });
        }
    }

    for (index, edge) in topology.edges.iter().enumerate() {
        for endpoint in [&edge.from, &edge.to] {
            if !seen.contains(endpoint.as_str()) {
                issues.push(TopologyIssue::UnresolvedEndpoint {
                    index,
                    missing: endpoint.clone(),
                });
            }
        }
        if edge.from == edge.to {
            issues.push(TopologyIssue::SelfLoop {
                index,
                id: edge.from.clone(),
            });
        }
        if !(edge.capacity > 0.0) {
            issues.push(TopologyIssue::NonPositiveLaneCapacity {
                index,
                capacity: edge.capacity,
            });
        }
    }

    issues
}

// ---------------------------------------------------------------------------
// State diff
// ---------------------------------------------------------------------------

/// A node whose state differs between two engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDiff {
    /// Topology key.
    pub key: String,
    /// Names of the differing fields.
    pub fields: Vec<&'static str>,
}

/// Full state diff between two engines over the same topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDiff {
    pub is_identical: bool,
    pub tick_matches: bool,
    pub effects_match: bool,
    /// Nodes present in only one engine, by key.
    pub missing_nodes: Vec<String>,
    pub node_diffs: Vec<NodeDiff>,
}

/// Compare two engines node by node, matching nodes by topology key.
pub fn diff_engines(a: &Engine, b: &Engine) -> StateDiff {
    let mut missing_nodes = Vec::new();
    let mut node_diffs = Vec::new();

    for (id_a, data) in a.graph().nodes() {
        let Some(id_b) = b.graph().node_by_key(&data.key) else {
            missing_nodes.push(data.key.clone());
            continue;
        };
        let (Some(sa), Some(sb)) = (a.state().node(id_a), b.state().node(id_b)) else {
            continue;
        };
        let mut fields = Vec::new();
        if sa.inventory != sb.inventory {
            fields.push("inventory");
        }
        if sa.demand != sb.demand {
            fields.push("demand");
        }
        if !fields.is_empty() {
            node_diffs.push(NodeDiff {
                key: data.key.clone(),
                fields,
            });
        }
    }
    for (_, data) in b.graph().nodes() {
        if a.graph().node_by_key(&data.key).is_none() {
            missing_nodes.push(data.key.clone());
        }
    }

    let tick_matches = a.tick() == b.tick();
    let effects_match = a.effects() == b.effects();
    StateDiff {
        is_identical: tick_matches && effects_match && missing_nodes.is_empty() && node_diffs.is_empty(),
        tick_matches,
        effects_match,
        missing_nodes,
        node_diffs,
    }
}

// ---------------------------------------------------------------------------
// Determinism validation
// ---------------------------------------------------------------------------

/// Result of a determinism validation run.
#[derive(Debug)]
pub struct DeterminismResult {
    pub is_deterministic: bool,
    /// Tick at which divergence was first detected (if any).
    pub divergence_tick: Option<u64>,
    /// Hash log: (tick, hash_run1, hash_run2) for each tick.
    pub hash_log: Vec<(u64, u64, u64)>,
}

/// Build two engines over `topology`, load the same checkpoint into both
/// and step them side by side, comparing state hashes after every tick.
pub fn validate_determinism(
    topology: &Topology,
    config: &SimConfig,
    checkpoint: &[u8],
    ticks: u64,
) -> Result<DeterminismResult, DeserializeError> {
    let (mut engine_a, _) = Engine::from_topology(topology, config.clone());
    let (mut engine_b, _) = Engine::from_topology(topology, config.clone());
    engine_a.load_state(checkpoint)?;
    engine_b.load_state(checkpoint)?;

    let mut hash_log = Vec::new();
    let mut divergence_tick = None;

    for _ in 0..ticks {
        engine_a.step();
        engine_b.step();

        let hash_a = engine_a.state_hash();
        let hash_b = engine_b.state_hash();
        let tick = engine_a.tick();
        hash_log.push((tick, hash_a, hash_b));

        if hash_a != hash_b && divergence_tick.is_none() {
            divergence_tick = Some(tick);
        }
    }

    Ok(DeterminismResult {
        is_deterministic: divergence_tick.is_none(),
        divergence_tick,
        hash_log,
    })
}
