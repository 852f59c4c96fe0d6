//! The simulation state store: every quantity that changes while the
//! network runs.
//!
//! Static data (capacities, names, positions) lives in the
//! [`NetworkGraph`]; this store holds the SoA per-node and per-edge mutable
//! fields keyed by the same ids. Only the physics tick and the cascade
//! propagator write to it.

use crate::fixed::Fixed64;
use crate::graph::NetworkGraph;
use crate::id::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

/// Mutable state of one distribution center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    /// Always within `[0, capacity]`.
    pub inventory: Fixed64,
    /// Active shock pulling goods inward. Never negative.
    pub demand: Fixed64,
    /// Per-tick accumulator, zero between ticks.
    pub inflow: Fixed64,
    /// Per-tick accumulator, zero between ticks.
    pub outflow: Fixed64,
}

impl NodeState {
    pub fn with_inventory(inventory: Fixed64) -> Self {
        Self {
            inventory,
            demand: Fixed64::ZERO,
            inflow: Fixed64::ZERO,
            outflow: Fixed64::ZERO,
        }
    }
}

/// Mutable state of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeState {
    /// Display value: the flow rate computed on the last tick.
    pub flow: Fixed64,
}

/// Per-node and per-edge mutable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    pub(crate) nodes: SecondaryMap<NodeId, NodeState>,
    pub(crate) edges: SecondaryMap<EdgeId, EdgeState>,
}

impl StateStore {
    /// Build the initial state for every node and edge in the graph.
    pub fn from_graph(graph: &NetworkGraph) -> Self {
        let mut nodes = SecondaryMap::new();
        for (id, data) in graph.nodes() {
            nodes.insert(id, NodeState::with_inventory(data.initial_inventory));
        }
        let mut edges = SecondaryMap::new();
        for (id, data) in graph.edges() {
            edges.insert(id, EdgeState { flow: data.initial_flow });
        }
        Self { nodes, edges }
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeState> {
        self.nodes.get(node)
    }

    pub fn edge(&self, edge: EdgeId) -> Option<&EdgeState> {
        self.edges.get(edge)
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> Option<&mut NodeState> {
        self.nodes.get_mut(node)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Sum of inventory across all nodes.
    pub fn total_inventory(&self) -> Fixed64 {
        self.nodes
            .values()
            .fold(Fixed64::ZERO, |acc, n| acc.saturating_add(n.inventory))
    }

    /// Sum of demand across all nodes.
    pub fn total_demand(&self) -> Fixed64 {
        self.nodes
            .values()
            .fold(Fixed64::ZERO, |acc, n| acc.saturating_add(n.demand))
    }
}
