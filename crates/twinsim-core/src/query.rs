//! Read-only query API for renderers and dashboards.
//!
//! Snapshot types aggregate engine state into convenient, owned views. Nothing
//! here borrows into engine storage, so a renderer can hold a [`NetworkView`]
//! while the engine keeps ticking.

use crate::effect::{CascadeEffect, EffectColor};
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::graph::NetworkGraph;
use crate::id::{EdgeId, NodeId};
use crate::state::StateStore;
use crate::topology::{NodeKind, Position};

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A read-only view of a single distribution center.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    /// Topology key, e.g. `"dc-3"`.
    pub key: String,
    pub name: String,
    pub kind: NodeKind,
    pub position: Position,
    pub inventory: Fixed64,
    pub capacity: Fixed64,
    pub demand: Fixed64,
}

impl NodeSnapshot {
    /// Inventory as a percentage of capacity, 0 for zero-capacity nodes.
    pub fn fill_percent(&self) -> Fixed64 {
        fill_percent(self.inventory, self.capacity)
    }
}

/// `inventory` as a percentage of `capacity`, 0 when `capacity` is zero.
pub fn fill_percent(inventory: Fixed64, capacity: Fixed64) -> Fixed64 {
    inventory
        .saturating_mul(Fixed64::from_num(100))
        .checked_div(capacity)
        .unwrap_or(Fixed64::ZERO)
}

/// A read-only view of a single lane.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub capacity: Fixed64,
    /// Flow rate computed on the last tick.
    pub flow: Fixed64,
    pub lead_time: u32,
}

/// A read-only view of a cascade marker.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSnapshot {
    pub position: Position,
    pub radius: Fixed64,
    pub alpha: Fixed64,
    pub color: EffectColor,
}

impl From<&CascadeEffect> for EffectSnapshot {
    fn from(effect: &CascadeEffect) -> Self {
        Self {
            position: effect.position,
            radius: effect.radius,
            alpha: effect.alpha,
            color: effect.color,
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkView {
    /// In graph insertion order.
    pub nodes: Vec<NodeSnapshot>,
    /// In graph insertion order.
    pub edges: Vec<EdgeSnapshot>,
    /// In spawn order.
    pub effects: Vec<EffectSnapshot>,
}

pub fn snapshot_node(graph: &NetworkGraph, store: &StateStore, node: NodeId) -> Option<NodeSnapshot> {
    let data = graph.get_node(node)?;
    let state = store.node(node)?;
    Some(NodeSnapshot {
        id: node,
        key: data.key.clone(),
        name: data.name.clone(),
        kind: data.kind,
        position: data.position,
        inventory: state.inventory,
        capacity: data.capacity,
        demand: state.demand,
    })
}

pub fn snapshot_nodes(graph: &NetworkGraph, store: &StateStore) -> Vec<NodeSnapshot> {
    graph
        .nodes()
        .filter_map(|(id, _)| snapshot_node(graph, store, id))
        .collect()
}

pub fn snapshot_edges(graph: &NetworkGraph, store: &StateStore) -> Vec<EdgeSnapshot> {
    graph
        .edges()
        .map(|(id, data)| EdgeSnapshot {
            id,
            from: data.from,
            to: data.to,
            capacity: data.capacity,
            flow: store.edge(id).map(|e| e.flow).unwrap_or(data.initial_flow),
            lead_time: data.lead_time,
        })
        .collect()
}

pub fn snapshot_effects(effects: &[CascadeEffect]) -> Vec<EffectSnapshot> {
    effects.iter().map(EffectSnapshot::from).collect()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Cut-offs for health classification. All values are fill percentages
/// except `hit_radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthThresholds {
    /// Network average above this is Optimal.
    pub optimal: Fixed64,
    /// Network average above this is Normal.
    pub normal: Fixed64,
    /// Network average above this is Stressed; anything else is Critical.
    pub stressed: Fixed64,
    /// Nodes below this count as critical and raise a depletion event
    /// when they cross it.
    pub critical_node: Fixed64,
    /// Per-node level: below `critical_node` is Low, below this is Medium.
    pub medium_level: Fixed64,
    /// Nodes above this are Healthy, otherwise AtRisk.
    pub at_risk: Fixed64,
    /// Default selection radius for [`node_at`].
    pub hit_radius: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            optimal: f64_to_fixed64(70.0),
            normal: f64_to_fixed64(50.0),
            stressed: f64_to_fixed64(30.0),
            critical_node: f64_to_fixed64(30.0),
            medium_level: f64_to_fixed64(50.0),
            at_risk: f64_to_fixed64(30.0),
            hit_radius: 35.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    Optimal,
    Normal,
    Stressed,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Healthy,
    AtRisk,
}

impl HealthThresholds {
    pub fn status(&self, average_fill: Fixed64) -> HealthStatus {
        if average_fill > self.optimal {
            HealthStatus::Optimal
        } else if average_fill > self.normal {
            HealthStatus::Normal
        } else if average_fill > self.stressed {
            HealthStatus::Stressed
        } else {
            HealthStatus::Critical
        }
    }

    pub fn level(&self, fill: Fixed64) -> InventoryLevel {
        if fill < self.critical_node {
            InventoryLevel::Low
        } else if fill < self.medium_level {
            InventoryLevel::Medium
        } else {
            InventoryLevel::High
        }
    }

    pub fn node_status(&self, fill: Fixed64) -> NodeStatus {
        if fill > self.at_risk {
            NodeStatus::Healthy
        } else {
            NodeStatus::AtRisk
        }
    }

    pub fn is_critical(&self, fill: Fixed64) -> bool {
        fill < self.critical_node
    }
}

/// Network-wide summary shown on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkHealth {
    /// Mean fill percentage across nodes.
    pub average_inventory: Fixed64,
    pub total_demand: Fixed64,
    pub critical_nodes: usize,
    pub status: HealthStatus,
}

pub fn network_health(
    graph: &NetworkGraph,
    store: &StateStore,
    thresholds: &HealthThresholds,
) -> NetworkHealth {
    let mut fill_sum = Fixed64::ZERO;
    let mut counted = 0u32;
    let mut critical_nodes = 0;
    for snapshot in snapshot_nodes(graph, store) {
        let fill = snapshot.fill_percent();
        fill_sum = fill_sum.saturating_add(fill);
        counted += 1;
        if thresholds.is_critical(fill) {
            critical_nodes += 1;
        }
    }
    let average_inventory = fill_sum
        .checked_div(Fixed64::from_num(counted))
        .unwrap_or(Fixed64::ZERO);

    NetworkHealth {
        average_inventory,
        total_demand: store.total_demand(),
        critical_nodes,
        status: thresholds.status(average_inventory),
    }
}

// ---------------------------------------------------------------------------
// Hit testing
// ---------------------------------------------------------------------------

/// The node nearest to `point` within `radius`, if any.
pub fn node_at(graph: &NetworkGraph, point: Position, radius: f64) -> Option<NodeId> {
    let limit = radius * radius;
    graph
        .nodes()
        .map(|(id, data)| (id, data.position.distance_squared(point)))
        .filter(|&(_, d)| d <= limit)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}
