//! Demand-shock propagation.
//!
//! A spike adds demand at one node and echoes it upstream: a breadth-first
//! walk over reverse lanes (destination to supplier) visits each node at
//! most once and adds a share of the intensity that shrinks geometrically
//! with hop distance.

use crate::fixed::{Fixed64, Millis, f64_to_fixed64, pow_fixed};
use crate::graph::NetworkGraph;
use crate::id::NodeId;
use crate::state::StateStore;
use std::collections::{HashSet, VecDeque};

/// Tuning constants for spike propagation.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
    /// Attenuation per hop: a node at depth `d` receives
    /// `intensity * propagation_speed^d`.
    pub propagation_speed: Fixed64,
    /// Deepest hop that still receives demand.
    pub max_depth: u32,
    /// Delay between marker waves, multiplied by the discovering node's depth.
    pub stagger: Millis,
    /// Intensity used when the caller does not pick one.
    pub default_intensity: Fixed64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            propagation_speed: f64_to_fixed64(0.3),
            max_depth: 4,
            stagger: 300,
            default_intensity: f64_to_fixed64(50.0),
        }
    }
}

/// One upstream node reached by a spike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeHit {
    pub node: NodeId,
    /// Hops from the origin, starting at 1.
    pub depth: u32,
    /// Demand added to this node.
    pub added: Fixed64,
    /// How long after the spike this node's marker should appear.
    pub delay: Millis,
}

/// Everything one spike did to the state store.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadePlan {
    pub origin: NodeId,
    /// Intensity actually applied at the origin (never negative).
    pub intensity: Fixed64,
    /// Upstream nodes in visit order.
    pub hits: Vec<CascadeHit>,
}

impl CascadePlan {
    /// Demand added across the origin and every upstream hit.
    pub fn total_added(&self) -> Fixed64 {
        self.hits
            .iter()
            .fold(self.intensity, |acc, h| acc.saturating_add(h.added))
    }

    /// Deepest hop reached, 0 when nothing upstream was touched.
    pub fn reach(&self) -> u32 {
        self.hits.iter().map(|h| h.depth).max().unwrap_or(0)
    }

    pub fn hit(&self, node: NodeId) -> Option<&CascadeHit> {
        self.hits.iter().find(|h| h.node == node)
    }
}

/// Inject `intensity` demand at `origin` and propagate it upstream.
///
/// Returns `None` without touching anything when `origin` has no state.
/// Negative intensities are treated as zero. Cycles are safe: every node is
/// visited at most once, and the origin is never revisited.
pub fn propagate(
    graph: &NetworkGraph,
    store: &mut StateStore,
    origin: NodeId,
    intensity: Fixed64,
    config: &CascadeConfig,
) -> Option<CascadePlan> {
    let intensity = intensity.max(Fixed64::ZERO);
    let state = store.node_mut(origin)?;
    state.demand = state.demand.saturating_add(intensity);

    let mut plan = CascadePlan {
        origin,
        intensity,
        hits: Vec::new(),
    };
    let mut visited = HashSet::new();
    visited.insert(origin);
    let mut queue = VecDeque::new();
    queue.push_back((origin, 0u32));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= config.max_depth {
            continue;
        }
        let next_depth = depth + 1;
        let added = intensity.saturating_mul(pow_fixed(config.propagation_speed, next_depth));

        for supplier in graph.suppliers(current) {
            if visited.contains(&supplier) {
                continue;
            }
            let Some(state) = store.node_mut(supplier) else {
                continue;
            };
            visited.insert(supplier);
            state.demand = state.demand.saturating_add(added);
            plan.hits.push(CascadeHit {
                node: supplier,
                depth: next_depth,
                added,
                delay: config.stagger.saturating_mul(u64::from(depth)),
            });
            queue.push_back((supplier, next_depth));
        }
    }

    Some(plan)
}
