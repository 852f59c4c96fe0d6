use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::*;
use crate::topology::{NodeKind, Position, Topology};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from strict graph lookups and construction.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeId),
    #[error("no node with key '{0}'")]
    UnknownKey(String),
    #[error("duplicate node key '{0}'")]
    DuplicateKey(String),
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Adjacency lists for a single node, tracking incoming and outgoing edges.
#[derive(Debug, Clone, Default)]
struct NodeAdjacency {
    /// Edges whose destination is this node (its suppliers).
    inputs: Vec<EdgeId>,
    /// Edges whose source is this node.
    outputs: Vec<EdgeId>,
}

/// Static per-node data. Fixed for the lifetime of the graph.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Topology key, e.g. `"dc-1"`.
    pub key: String,
    pub name: String,
    pub kind: NodeKind,
    pub position: Position,
    /// Upper inventory bound. Never negative.
    pub capacity: Fixed64,
    /// Inventory restored by a reset, already clamped to `[0, capacity]`.
    pub initial_inventory: Fixed64,
}

/// Static per-edge data.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// Source node (the supplier).
    pub from: NodeId,
    /// Destination node.
    pub to: NodeId,
    /// Bounds the lane's flow rate.
    pub capacity: Fixed64,
    /// Advisory flow shown before the first tick and after a reset.
    pub initial_flow: Fixed64,
    /// Advisory transit time in days.
    pub lead_time: u32,
}

/// A topology lane whose endpoints did not resolve to nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    /// Position of the lane in the topology's edge list.
    pub index: usize,
    pub from: String,
    pub to: String,
}

/// What [`NetworkGraph::from_topology`] could not use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Lanes dropped because an endpoint key is unknown.
    pub dangling: Vec<DanglingEdge>,
    /// Node keys that appeared more than once; later entries were dropped.
    pub duplicate_keys: Vec<String>,
}

impl ResolveReport {
    /// Whether everything in the topology made it into the graph.
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.duplicate_keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// NetworkGraph
// ---------------------------------------------------------------------------

/// The distribution network: nodes (centers) and directed edges (lanes).
///
/// Adjacency is stored in a `SecondaryMap` keyed by `NodeId`, in sync with
/// the primary `nodes` SlotMap. The graph only grows; nodes and edges live
/// for the whole run.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    nodes: SlotMap<NodeId, NodeData>,
    edges: SlotMap<EdgeId, EdgeData>,
    adjacency: SecondaryMap<NodeId, NodeAdjacency>,
    keys: HashMap<String, NodeId>,
}

impl NetworkGraph {
    /// Create a new, empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a topology into a graph.
    ///
    /// Unknown lane endpoints and duplicate node keys are not fatal: they
    /// are left out of the graph and listed in the returned report.
    pub fn from_topology(topology: &Topology) -> (Self, ResolveReport) {
        let mut graph = Self::new();
        let mut report = ResolveReport::default();

        for spec in &topology.nodes {
            let name = if spec.name.is_empty() {
                spec.id.clone()
            } else {
                spec.name.clone()
            };
            let data = NodeData {
                key: spec.id.clone(),
                name,
                kind: spec.kind,
                position: spec.position,
                capacity: f64_to_fixed64(spec.capacity),
                initial_inventory: f64_to_fixed64(spec.inventory),
            };
            if graph.add_node(data).is_err() {
                report.duplicate_keys.push(spec.id.clone());
            }
        }

        for (index, spec) in topology.edges.iter().enumerate() {
            match (graph.node_by_key(&spec.from), graph.node_by_key(&spec.to)) {
                (Some(from), Some(to)) => {
                    graph.connect_with(EdgeData {
                        from,
                        to,
                        capacity: f64_to_fixed64(spec.capacity),
                        initial_flow: f64_to_fixed64(spec.flow),
                        lead_time: spec.lead_time,
                    });
                }
                _ => report.dangling.push(DanglingEdge {
                    index,
                    from: spec.from.clone(),
                    to: spec.to.clone(),
                }),
            }
        }

        (graph, report)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Add a node. Fails if another node already uses the same key.
    ///
    /// A negative capacity becomes zero and the initial inventory is
    /// clamped to `[0, capacity]`.
    pub fn add_node(&mut self, mut data: NodeData) -> Result<NodeId, GraphError> {
        if self.keys.contains_key(&data.key) {
            return Err(GraphError::DuplicateKey(data.key));
        }
        data.capacity = data.capacity.max(Fixed64::ZERO);
        data.initial_inventory = data.initial_inventory.clamp(Fixed64::ZERO, data.capacity);
        let key = data.key.clone();
        let node_id = self.nodes.insert(data);
        self.adjacency.insert(node_id, NodeAdjacency::default());
        self.keys.insert(key, node_id);
        Ok(node_id)
    }

    /// Connect two nodes with a lane of the given capacity.
    pub fn connect(&mut self, from: NodeId, to: NodeId, capacity: Fixed64) -> EdgeId {
        self.connect_with(EdgeData {
            from,
            to,
            capacity,
            initial_flow: Fixed64::ZERO,
            lead_time: 0,
        })
    }

    /// Insert a lane. Endpoints that are not in this graph are accepted; the
    /// lane is stored but never joins any adjacency list, so the physics and
    /// cascade passes skip it.
    pub fn connect_with(&mut self, data: EdgeData) -> EdgeId {
        let (from, to) = (data.from, data.to);
        let edge_id = self.edges.insert(data);

        if let Some(adj) = self.adjacency.get_mut(from) {
            adj.outputs.push(edge_id);
        }
        if let Some(adj) = self.adjacency.get_mut(to) {
            adj.inputs.push(edge_id);
        }

        edge_id
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_node(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node)
    }

    pub fn get_edge(&self, edge: EdgeId) -> Option<&EdgeData> {
        self.edges.get(edge)
    }

    /// Strict node lookup.
    pub fn node(&self, node: NodeId) -> Result<&NodeData, GraphError> {
        self.nodes.get(node).ok_or(GraphError::NodeNotFound(node))
    }

    /// Strict edge lookup.
    pub fn edge(&self, edge: EdgeId) -> Result<&EdgeData, GraphError> {
        self.edges.get(edge).ok_or(GraphError::EdgeNotFound(edge))
    }

    /// Look up a node by topology key.
    pub fn node_by_key(&self, key: &str) -> Option<NodeId> {
        self.keys.get(key).copied()
    }

    /// Strict key lookup.
    pub fn require_key(&self, key: &str) -> Result<NodeId, GraphError> {
        self.node_by_key(key)
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains_key(edge)
    }

    /// Whether both endpoints of an edge are nodes of this graph.
    pub fn is_resolved(&self, edge: EdgeId) -> bool {
        self.edges
            .get(edge)
            .is_some_and(|e| self.nodes.contains_key(e.from) && self.nodes.contains_key(e.to))
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes.iter()
    }

    /// Iterate edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeData)> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges feeding into a node, in insertion order.
    pub fn get_inputs(&self, node: NodeId) -> &[EdgeId] {
        self.adjacency
            .get(node)
            .map(|a| a.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Edges leaving a node, in insertion order.
    pub fn get_outputs(&self, node: NodeId) -> &[EdgeId] {
        self.adjacency
            .get(node)
            .map(|a| a.outputs.as_slice())
            .unwrap_or(&[])
    }

    /// The nodes that supply `node`, one entry per incoming edge.
    pub fn suppliers(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.get_inputs(node)
            .iter()
            .filter_map(|&e| self.edges.get(e))
            .map(|e| e.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{EdgeSpec, NodeSpec};

    fn node(key: &str, inventory: f64, capacity: f64) -> NodeData {
        NodeData {
            key: key.to_string(),
            name: key.to_string(),
            kind: NodeKind::Hub,
            position: Position::default(),
            capacity: f64_to_fixed64(capacity),
            initial_inventory: f64_to_fixed64(inventory),
        }
    }

    #[test]
    fn add_node_clamps_initial_inventory() {
        let mut g = NetworkGraph::new();
        let over = g.add_node(node("over", 150.0, 100.0)).unwrap();
        let under = g.add_node(node("under", -5.0, 100.0)).unwrap();
        let empty = g.add_node(node("empty", 20.0, -10.0)).unwrap();

        assert_eq!(g.get_node(over).unwrap().initial_inventory, f64_to_fixed64(100.0));
        assert_eq!(g.get_node(under).unwrap().initial_inventory, Fixed64::ZERO);
        assert_eq!(g.get_node(empty).unwrap().capacity, Fixed64::ZERO);
        assert_eq!(g.get_node(empty).unwrap().initial_inventory, Fixed64::ZERO);
    }

    #[test]
    fn engine_over_hand_built_graph_starts_in_bounds() {
        let mut g = NetworkGraph::new();
        let a = g.add_node(node("a", 150.0, 100.0)).unwrap();
        let mut engine = crate::engine::Engine::new(g, crate::engine::SimConfig::default());
        assert_eq!(engine.state().node(a).unwrap().inventory, f64_to_fixed64(100.0));

        engine.reset();
        assert_eq!(engine.state().node(a).unwrap().inventory, f64_to_fixed64(100.0));
    }

    #[test]
    fn add_and_connect() {
        let mut g = NetworkGraph::new();
        let a = g.add_node(node("a", 10.0, 100.0)).unwrap();
        let b = g.add_node(node("b", 10.0, 100.0)).unwrap();
        let e = g.connect(a, b, f64_to_fixed64(50.0));

        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.get_outputs(a), &[e]);
        assert_eq!(g.get_inputs(b), &[e]);
        assert!(g.get_inputs(a).is_empty());
        assert_eq!(g.suppliers(b).collect::<Vec<_>>(), vec![a]);
        assert!(g.is_resolved(e));
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut g = NetworkGraph::new();
        g.add_node(node("a", 0.0, 1.0)).unwrap();
        let err = g.add_node(node("a", 0.0, 1.0)).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateKey(ref k) if k == "a"));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn edge_to_foreign_node_is_stored_but_unresolved() {
        let mut other = NetworkGraph::new();
        other.add_node(node("x", 0.0, 1.0)).unwrap();
        let foreign = other.add_node(node("y", 0.0, 1.0)).unwrap();

        let mut g = NetworkGraph::new();
        let a = g.add_node(node("a", 0.0, 1.0)).unwrap();
        let e = g.connect(foreign, a, f64_to_fixed64(10.0));

        assert!(g.contains_edge(e));
        assert!(!g.is_resolved(e));
        // Only the endpoint that exists here records the lane.
        assert_eq!(g.get_inputs(a), &[e]);
        assert!(g.node(foreign).is_err());
    }

    #[test]
    fn from_topology_resolves_keys() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("a", 80.0, 100.0))
            .with_node(NodeSpec::new("b", 20.0, 100.0).named("Bravo"))
            .with_edge(EdgeSpec::new("a", "b", 100.0).flow(42.0).lead_time(3));

        let (g, report) = NetworkGraph::from_topology(&topo);
        assert!(report.is_clean());

        let a = g.node_by_key("a").unwrap();
        let b = g.node_by_key("b").unwrap();
        assert_eq!(g.get_node(a).unwrap().name, "a");
        assert_eq!(g.get_node(b).unwrap().name, "Bravo");

        let (_, edge) = g.edges().next().unwrap();
        assert_eq!(edge.from, a);
        assert_eq!(edge.to, b);
        assert_eq!(edge.initial_flow, f64_to_fixed64(42.0));
        assert_eq!(edge.lead_time, 3);
    }

    #[test]
    fn from_topology_reports_dangling_and_duplicates() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("a", 1.0, 10.0))
            .with_node(NodeSpec::new("a", 2.0, 10.0))
            .with_edge(EdgeSpec::new("a", "ghost", 10.0));

        let (g, report) = NetworkGraph::from_topology(&topo);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(report.duplicate_keys, vec!["a".to_string()]);
        assert_eq!(
            report.dangling,
            vec![DanglingEdge {
                index: 0,
                from: "a".into(),
                to: "ghost".into()
            }]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn from_topology_clamps_initial_inventory() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("over", 150.0, 100.0))
            .with_node(NodeSpec::new("under", -5.0, 100.0))
            .with_node(NodeSpec::new("neg_cap", 5.0, -1.0));
        let (g, _) = NetworkGraph::from_topology(&topo);

        let over = g.get_node(g.node_by_key("over").unwrap()).unwrap();
        assert_eq!(over.initial_inventory, f64_to_fixed64(100.0));
        let under = g.get_node(g.node_by_key("under").unwrap()).unwrap();
        assert_eq!(under.initial_inventory, Fixed64::ZERO);
        let neg = g.get_node(g.node_by_key("neg_cap").unwrap()).unwrap();
        assert_eq!(neg.capacity, Fixed64::ZERO);
        assert_eq!(neg.initial_inventory, Fixed64::ZERO);
    }

    #[test]
    fn strict_lookups() {
        let g = NetworkGraph::new();
        assert!(matches!(g.require_key("nope"), Err(GraphError::UnknownKey(_))));
    }
}
