//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::engine::{Engine, SimConfig};
use crate::fixed::{Fixed64, fixed64_to_f64};
use crate::id::NodeId;
use crate::sim::SimulationStrategy;
use crate::topology::{EdgeSpec, NodeSpec, Topology};
use slotmap::SlotMap;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Assert two floats agree to within `1e-6`.
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

// ===========================================================================
// Ids
// ===========================================================================

/// A node id that no small test graph contains.
pub fn foreign_node() -> NodeId {
    let mut keys = SlotMap::<NodeId, ()>::with_key();
    for _ in 0..1024 {
        keys.insert(());
    }
    keys.insert(())
}

// ===========================================================================
// Topologies
// ===========================================================================

/// `a -> b`, both with capacity 100 and a lane of capacity 100.
pub fn two_node_topology(a_inventory: f64, b_inventory: f64) -> Topology {
    Topology::new()
        .with_node(NodeSpec::new("a", a_inventory, 100.0).at(0.0, 0.0))
        .with_node(NodeSpec::new("b", b_inventory, 100.0).at(100.0, 0.0))
        .with_edge(EdgeSpec::new("a", "b", 100.0))
}

/// `n0 -> n1 -> ... -> n{len-1}`, every node at 50/100, every lane 100.
///
/// Spiking the last node walks the whole chain upstream.
pub fn chain_topology(len: usize) -> Topology {
    let mut topo = Topology::new();
    for i in 0..len {
        topo = topo.with_node(NodeSpec::new(format!("n{i}"), 50.0, 100.0).at(i as f64 * 50.0, 0.0));
    }
    for i in 1..len {
        topo = topo.with_edge(EdgeSpec::new(format!("n{}", i - 1), format!("n{i}"), 100.0));
    }
    topo
}

/// A `rows x cols` grid with lanes flowing right and down.
pub fn grid_topology(rows: usize, cols: usize) -> Topology {
    let key = |r: usize, c: usize| format!("g{r}_{c}");
    let mut topo = Topology::new();
    for r in 0..rows {
        for c in 0..cols {
            let inventory = 20.0 + ((r * cols + c) % 7) as f64 * 10.0;
            topo = topo.with_node(
                NodeSpec::new(key(r, c), inventory, 100.0).at(c as f64 * 40.0, r as f64 * 40.0),
            );
        }
    }
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                topo = topo.with_edge(EdgeSpec::new(key(r, c), key(r, c + 1), 200.0));
            }
            if r + 1 < rows {
                topo = topo.with_edge(EdgeSpec::new(key(r, c), key(r + 1, c), 200.0));
            }
        }
    }
    topo
}

// ===========================================================================
// Engines
// ===========================================================================

/// An engine over `topology` that only ticks on explicit `step()` calls.
pub fn manual_engine(topology: &Topology) -> Engine {
    let config = SimConfig {
        strategy: SimulationStrategy::Tick,
        ..SimConfig::default()
    };
    Engine::from_topology(topology, config).0
}

// ===========================================================================
// State readers
// ===========================================================================

pub fn inventory_of(engine: &Engine, key: &str) -> f64 {
    let node = engine.graph().node_by_key(key).expect("unknown key");
    fixed64_to_f64(engine.state().node(node).expect("no state").inventory)
}

pub fn demand_of(engine: &Engine, key: &str) -> f64 {
    let node = engine.graph().node_by_key(key).expect("unknown key");
    fixed64_to_f64(engine.state().node(node).expect("no state").demand)
}

pub fn assert_demand(engine: &Engine, key: &str, expected: f64) {
    assert_close(demand_of(engine, key), expected);
}

pub fn assert_inventory(engine: &Engine, key: &str, expected: f64) {
    assert_close(inventory_of(engine, key), expected);
}
