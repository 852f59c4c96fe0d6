//! Declarative network description.
//!
//! A [`Topology`] names nodes by string keys and references them from lanes.
//! It is what data files deserialize into and what [`NetworkGraph`] is
//! resolved from. Values are plain `f64` here; conversion to fixed-point
//! happens during resolution.
//!
//! [`NetworkGraph`]: crate::graph::NetworkGraph

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node kinds and positions
// ---------------------------------------------------------------------------

/// The role a distribution center plays. Only affects presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Hub,
    #[default]
    Fulfillment,
    Port,
}

/// A point on the display surface. Copied onto cascade markers at spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    pub fn distance_squared(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// A distribution center entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique key, e.g. `"dc-1"`.
    pub id: String,
    /// Display name. Falls back to `id` when empty.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    /// Starting inventory.
    pub inventory: f64,
    /// Maximum inventory. Must be positive.
    pub capacity: f64,
}

impl NodeSpec {
    /// A node with the given key, starting inventory and capacity.
    pub fn new(id: impl Into<String>, inventory: f64, capacity: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind: NodeKind::default(),
            position: Position::default(),
            inventory,
            capacity,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }
}

/// A directed transport lane: goods move from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    /// Bounds the lane's flow rate. Must be positive.
    pub capacity: f64,
    /// Initial advisory flow shown before the first tick.
    #[serde(default)]
    pub flow: f64,
    /// Advisory transit time in days.
    #[serde(default)]
    pub lead_time: u32,
}

impl EdgeSpec {
    pub fn new(from: impl Into<String>, to: impl Into<String>, capacity: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            capacity,
            flow: 0.0,
            lead_time: 0,
        }
    }

    pub fn flow(mut self, flow: f64) -> Self {
        self.flow = flow;
        self
    }

    pub fn lead_time(mut self, days: u32) -> Self {
        self.lead_time = days;
        self
    }
}

/// The full static description of a network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: EdgeSpec) -> Self {
        self.edges.push(edge);
        self
    }

    /// Find a node entry by key.
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// Reference network
// ---------------------------------------------------------------------------

/// The six-center continental network: two West Coast ports feeding hubs
/// that ship east and south to Miami.
pub fn continental_network() -> Topology {
    Topology::new()
        .with_node(NodeSpec::new("dc-1", 78.0, 100.0).named("LA Hub").kind(NodeKind::Hub).at(120.0, 200.0))
        .with_node(
            NodeSpec::new("dc-2", 92.0, 100.0)
                .named("Chicago")
                .kind(NodeKind::Fulfillment)
                .at(420.0, 140.0),
        )
        .with_node(NodeSpec::new("dc-3", 85.0, 100.0).named("NYC").kind(NodeKind::Hub).at(720.0, 170.0))
        .with_node(NodeSpec::new("dc-4", 65.0, 100.0).named("Houston").kind(NodeKind::Port).at(280.0, 340.0))
        .with_node(NodeSpec::new("dc-5", 71.0, 100.0).named("Seattle").kind(NodeKind::Port).at(100.0, 60.0))
        .with_node(NodeSpec::new("dc-6", 88.0, 100.0).named("Miami").kind(NodeKind::Port).at(640.0, 370.0))
        .with_edge(EdgeSpec::new("dc-5", "dc-1", 800.0).flow(620.0).lead_time(2))
        .with_edge(EdgeSpec::new("dc-5", "dc-2", 500.0).flow(290.0).lead_time(3))
        .with_edge(EdgeSpec::new("dc-1", "dc-2", 700.0).flow(450.0).lead_time(2))
        .with_edge(EdgeSpec::new("dc-1", "dc-4", 600.0).flow(520.0).lead_time(1))
        .with_edge(EdgeSpec::new("dc-2", "dc-3", 600.0).flow(380.0).lead_time(2))
        .with_edge(EdgeSpec::new("dc-4", "dc-6", 400.0).flow(180.0).lead_time(2))
        .with_edge(EdgeSpec::new("dc-3", "dc-6", 500.0).flow(340.0).lead_time(3))
}
