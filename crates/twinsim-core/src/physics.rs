//! The physics tick: demand decay, pressure-driven flow, and inventory
//! update with inertia.
//!
//! The model is stylized rather than conservative. Demand drains inventory
//! at its node without being credited anywhere else, so total inventory is
//! not preserved across ticks.

use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::graph::NetworkGraph;
use crate::id::{EdgeId, NodeId};
use crate::state::{EdgeState, StateStore};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning constants for [`step`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    /// Multiplier applied to demand every tick.
    pub demand_decay: Fixed64,
    /// Demand below this value snaps to zero.
    pub demand_floor: Fixed64,
    /// Divisor turning inventory differences and demand into pressure.
    pub pressure_scale: Fixed64,
    /// Fraction of `pressure * capacity` that moves per tick.
    pub flow_scale: Fixed64,
    /// A source must hold strictly more than this to ship anything.
    pub min_source_inventory: Fixed64,
    /// How much of a node's demand drains its own inventory.
    pub demand_drain: Fixed64,
    /// Scales the net flow before it is applied.
    pub net_flow_scale: Fixed64,
    /// Share of last tick's inventory retained before net flow is added.
    pub inventory_inertia: Fixed64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            demand_decay: f64_to_fixed64(0.95),
            demand_floor: f64_to_fixed64(0.5),
            pressure_scale: f64_to_fixed64(100.0),
            flow_scale: f64_to_fixed64(0.01),
            min_source_inventory: f64_to_fixed64(10.0),
            demand_drain: f64_to_fixed64(0.5),
            net_flow_scale: f64_to_fixed64(0.1),
            inventory_inertia: f64_to_fixed64(0.85),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What happened during one physics tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Tick number this report belongs to (the value after increment).
    pub tick: u64,
    /// Sum of every permitted lane's flow rate.
    pub total_flow: Fixed64,
    /// Lanes with an endpoint missing from the state store.
    pub skipped_edges: Vec<EdgeId>,
    /// Lanes whose source sat at or below the minimum buffer.
    pub starved_edges: Vec<EdgeId>,
    /// Cascade markers that expired this tick.
    pub expired_effects: usize,
    /// Nodes whose inventory fell below the critical threshold this tick.
    pub depleted_nodes: Vec<NodeId>,
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Advance the state store by one tick.
///
/// Flow rates read the decayed demand and the pre-tick inventory of both
/// endpoints; inventories are only rewritten after every lane has been
/// evaluated, so lane order never matters.
pub fn step(graph: &NetworkGraph, store: &mut StateStore, config: &PhysicsConfig) -> StepReport {
    let mut report = StepReport::default();

    // 1. Demand decay.
    for state in store.nodes.values_mut() {
        state.demand = state.demand.saturating_mul(config.demand_decay);
        if state.demand < config.demand_floor {
            state.demand = Fixed64::ZERO;
        }
    }

    // 2. Flow along every lane.
    for (edge_id, edge) in graph.edges() {
        let (Some(from), Some(to)) = (store.nodes.get(edge.from), store.nodes.get(edge.to)) else {
            report.skipped_edges.push(edge_id);
            continue;
        };
        let (from_inventory, to_inventory, to_demand) = (from.inventory, to.inventory, to.demand);

        let inventory_pressure = from_inventory
            .saturating_sub(to_inventory)
            .checked_div(config.pressure_scale)
            .unwrap_or(Fixed64::ZERO);
        let demand_pull = to_demand
            .checked_div(config.pressure_scale)
            .unwrap_or(Fixed64::ZERO);
        let flow_rate = inventory_pressure
            .saturating_add(demand_pull)
            .saturating_mul(edge.capacity)
            .saturating_mul(config.flow_scale)
            .max(Fixed64::ZERO);

        let permitted = from_inventory > config.min_source_inventory;
        if permitted {
            if let Some(from) = store.nodes.get_mut(edge.from) {
                from.outflow = from.outflow.saturating_add(flow_rate);
            }
            if let Some(to) = store.nodes.get_mut(edge.to) {
                to.inflow = to.inflow.saturating_add(flow_rate);
            }
            report.total_flow = report.total_flow.saturating_add(flow_rate);
        } else {
            report.starved_edges.push(edge_id);
        }

        let shown = if permitted { flow_rate } else { Fixed64::ZERO };
        store.edges.insert(edge_id, EdgeState { flow: shown });
    }

    // 3. Inventory update with inertia.
    for (node_id, state) in store.nodes.iter_mut() {
        let capacity = graph
            .get_node(node_id)
            .map(|n| n.capacity.max(Fixed64::ZERO))
            .unwrap_or(Fixed64::ZERO);
        let net_flow = state
            .inflow
            .saturating_sub(state.outflow)
            .saturating_sub(state.demand.saturating_mul(config.demand_drain))
            .saturating_mul(config.net_flow_scale);
        state.inventory = state
            .inventory
            .saturating_mul(config.inventory_inertia)
            .saturating_add(net_flow)
            .clamp(Fixed64::ZERO, capacity);
        state.inflow = Fixed64::ZERO;
        state.outflow = Fixed64::ZERO;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::fixed64_to_f64;
    use crate::topology::{EdgeSpec, NodeSpec, Topology};

    fn build(topo: &Topology) -> (NetworkGraph, StateStore) {
        let (graph, _) = NetworkGraph::from_topology(topo);
        let store = StateStore::from_graph(&graph);
        (graph, store)
    }

    fn inv(graph: &NetworkGraph, store: &StateStore, key: &str) -> f64 {
        fixed64_to_f64(store.node(graph.node_by_key(key).unwrap()).unwrap().inventory)
    }

    fn set_demand(graph: &NetworkGraph, store: &mut StateStore, key: &str, demand: f64) {
        let id = graph.node_by_key(key).unwrap();
        store.node_mut(id).unwrap().demand = f64_to_fixed64(demand);
    }

    fn demand(graph: &NetworkGraph, store: &StateStore, key: &str) -> f64 {
        fixed64_to_f64(store.node(graph.node_by_key(key).unwrap()).unwrap().demand)
    }

    #[test]
    fn isolated_node_only_feels_inertia() {
        let (graph, mut store) = build(&Topology::new().with_node(NodeSpec::new("a", 80.0, 100.0)));
        step(&graph, &mut store, &PhysicsConfig::default());
        assert!((inv(&graph, &store, "a") - 68.0).abs() < 1e-6);
    }

    #[test]
    fn demand_decays_by_five_percent() {
        let (graph, mut store) = build(&Topology::new().with_node(NodeSpec::new("a", 50.0, 100.0)));
        set_demand(&graph, &mut store, "a", 100.0);
        step(&graph, &mut store, &PhysicsConfig::default());
        assert!((demand(&graph, &store, "a") - 95.0).abs() < 1e-6);
    }

    #[test]
    fn demand_below_floor_snaps_to_zero() {
        let (graph, mut store) = build(&Topology::new().with_node(NodeSpec::new("a", 50.0, 100.0)));
        // 0.52 * 0.95 = 0.494 < 0.5
        set_demand(&graph, &mut store, "a", 0.52);
        step(&graph, &mut store, &PhysicsConfig::default());
        assert_eq!(demand(&graph, &store, "a"), 0.0);
    }

    #[test]
    fn two_node_flow_values() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("a", 80.0, 100.0))
            .with_node(NodeSpec::new("b", 20.0, 100.0))
            .with_edge(EdgeSpec::new("a", "b", 100.0));
        let (graph, mut store) = build(&topo);
        let report = step(&graph, &mut store, &PhysicsConfig::default());

        // flow = (60/100) * 100 * 0.01 = 0.6, net = 0.06
        assert!((fixed64_to_f64(report.total_flow) - 0.6).abs() < 1e-6);
        assert!((inv(&graph, &store, "a") - (68.0 - 0.06)).abs() < 1e-6);
        assert!((inv(&graph, &store, "b") - (17.0 + 0.06)).abs() < 1e-6);

        let (edge, _) = graph.edges().next().unwrap();
        assert!((fixed64_to_f64(store.edge(edge).unwrap().flow) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn accumulators_reset_after_tick() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("a", 80.0, 100.0))
            .with_node(NodeSpec::new("b", 20.0, 100.0))
            .with_edge(EdgeSpec::new("a", "b", 100.0));
        let (graph, mut store) = build(&topo);
        step(&graph, &mut store, &PhysicsConfig::default());
        for (_, state) in store.nodes.iter() {
            assert_eq!(state.inflow, Fixed64::ZERO);
            assert_eq!(state.outflow, Fixed64::ZERO);
        }
    }

    #[test]
    fn negative_pressure_never_flows_backwards() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("a", 20.0, 100.0))
            .with_node(NodeSpec::new("b", 80.0, 100.0))
            .with_edge(EdgeSpec::new("a", "b", 100.0));
        let (graph, mut store) = build(&topo);
        let report = step(&graph, &mut store, &PhysicsConfig::default());
        assert_eq!(report.total_flow, Fixed64::ZERO);
        assert!((inv(&graph, &store, "a") - 17.0).abs() < 1e-6);
        assert!((inv(&graph, &store, "b") - 68.0).abs() < 1e-6);
    }

    #[test]
    fn starved_source_ships_nothing() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("a", 10.0, 100.0))
            .with_node(NodeSpec::new("b", 0.0, 100.0))
            .with_edge(EdgeSpec::new("a", "b", 500.0).flow(99.0));
        let (graph, mut store) = build(&topo);
        let report = step(&graph, &mut store, &PhysicsConfig::default());

        let (edge, _) = graph.edges().next().unwrap();
        assert_eq!(report.starved_edges, vec![edge]);
        assert_eq!(report.total_flow, Fixed64::ZERO);
        assert_eq!(store.edge(edge).unwrap().flow, Fixed64::ZERO);
        assert_eq!(inv(&graph, &store, "b"), 0.0);
    }

    #[test]
    fn demand_pulls_flow_and_drains_inventory() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("a", 50.0, 100.0))
            .with_node(NodeSpec::new("b", 50.0, 100.0))
            .with_edge(EdgeSpec::new("a", "b", 100.0));
        let (graph, mut store) = build(&topo);
        set_demand(&graph, &mut store, "b", 100.0);
        let report = step(&graph, &mut store, &PhysicsConfig::default());

        // demand 95 after decay; pull = 0.95; flow = 0.95
        assert!((fixed64_to_f64(report.total_flow) - 0.95).abs() < 1e-6);
        // b: 42.5 + (0.95 - 47.5) * 0.1 = 37.845
        assert!((inv(&graph, &store, "b") - 37.845).abs() < 1e-6);
    }

    #[test]
    fn inventory_clamped_to_capacity() {
        let topo = Topology::new()
            .with_node(NodeSpec::new("big", 1000.0, 1000.0))
            .with_node(NodeSpec::new("small", 9.9, 10.0))
            .with_edge(EdgeSpec::new("big", "small", 100_000.0));
        let (graph, mut store) = build(&topo);
        step(&graph, &mut store, &PhysicsConfig::default());
        assert_eq!(inv(&graph, &store, "small"), 10.0);
    }

    #[test]
    fn inventory_clamped_at_zero() {
        let (graph, mut store) = build(&Topology::new().with_node(NodeSpec::new("a", 1.0, 100.0)));
        set_demand(&graph, &mut store, "a", 1000.0);
        step(&graph, &mut store, &PhysicsConfig::default());
        assert_eq!(inv(&graph, &store, "a"), 0.0);
    }

    #[test]
    fn unresolved_lane_is_skipped() {
        let (mut graph, _) = NetworkGraph::from_topology(
            &Topology::new().with_node(NodeSpec::new("a", 50.0, 100.0)),
        );
        let (other, _) = NetworkGraph::from_topology(
            &Topology::new()
                .with_node(NodeSpec::new("x", 0.0, 1.0))
                .with_node(NodeSpec::new("y", 0.0, 1.0)),
        );
        let a = graph.node_by_key("a").unwrap();
        let ghost = other.node_by_key("y").unwrap();
        let edge = graph.connect(a, ghost, f64_to_fixed64(100.0));
        let mut store = StateStore::from_graph(&graph);

        let report = step(&graph, &mut store, &PhysicsConfig::default());
        assert_eq!(report.skipped_edges, vec![edge]);
        assert!((inv(&graph, &store, "a") - 42.5).abs() < 1e-6);
    }
}
