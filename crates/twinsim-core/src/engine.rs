//! The simulation engine: owns the distribution network and orchestrates the
//! tick pipeline, spikes and resets.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`NetworkGraph`] (nodes = distribution centers, edges = lanes)
//! - A [`StateStore`] with per-node and per-lane mutable quantities
//! - An [`EffectManager`] with the active cascade markers
//! - A [`SpawnScheduler`] with marker waves that are not due yet
//! - A [`SimState`] (tick counter, host clock, throttle bookkeeping)
//! - An [`EventBus`] for typed simulation events
//!
//! # Pipeline
//!
//! Each `step()` runs:
//! 1. **Physics** -- demand decay, lane flows, inventory update
//! 2. **Effects** -- markers grow and fade; expired ones are removed
//! 3. **Depletion** -- nodes that fell below the critical fill raise events
//! 4. **Bookkeeping** -- tick counter, state hash, event delivery
//!
//! `advance(now)` is the frame-driven entry point: it releases due marker
//! waves, then runs at most one `step()` when the throttle interval elapsed.

use crate::cascade::{self, CascadeConfig, CascadePlan};
use crate::effect::{CascadeEffect, EffectConfig, EffectManager};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::fixed::{Fixed64, Millis, Ticks};
use crate::graph::{NetworkGraph, ResolveReport};
use crate::id::NodeId;
use crate::physics::{self, PhysicsConfig, StepReport};
use crate::query::{
    self, EdgeSnapshot, EffectSnapshot, HealthThresholds, NetworkHealth, NetworkView, NodeSnapshot,
};
use crate::schedule::SpawnScheduler;
use crate::sim::{AdvanceResult, SimState, SimulationStrategy, StateHash};
use crate::state::StateStore;
use crate::topology::{Position, Topology};
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Every tunable of the engine. Defaults reproduce the reference model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub cascade: CascadeConfig,
    pub effects: EffectConfig,
    pub health: HealthThresholds,
    pub strategy: SimulationStrategy,
}

// ---------------------------------------------------------------------------
// Spike results
// ---------------------------------------------------------------------------

/// What a spike request did.
#[derive(Debug, Clone, PartialEq)]
pub enum SpikeOutcome {
    /// Demand was injected and propagated.
    Applied {
        plan: CascadePlan,
        /// Markers shown right away, including the origin marker.
        spawned: usize,
        /// Markers queued for a later `advance()`.
        scheduled: usize,
    },
    /// The node is not part of this network; nothing changed.
    UnknownNode,
}

impl SpikeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SpikeOutcome::Applied { .. })
    }

    pub fn plan(&self) -> Option<&CascadePlan> {
        match self {
            SpikeOutcome::Applied { plan, .. } => Some(plan),
            SpikeOutcome::UnknownNode => None,
        }
    }
}

/// The most recent spike, kept for display until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpikeRecord {
    pub node: NodeId,
    pub intensity: Fixed64,
    pub tick: Ticks,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The supply-chain simulation engine.
#[derive(Debug)]
pub struct Engine {
    graph: NetworkGraph,
    config: SimConfig,

    pub(crate) state: StateStore,
    pub(crate) effects: EffectManager,
    pub(crate) scheduler: SpawnScheduler,
    pub(crate) sim_state: SimState,
    pub(crate) last_spike: Option<SpikeRecord>,

    event_bus: EventBus,

    /// The most recently computed state hash.
    last_state_hash: u64,
}

impl Engine {
    /// Create an engine over an already-built graph.
    pub fn new(graph: NetworkGraph, config: SimConfig) -> Self {
        let state = StateStore::from_graph(&graph);
        let mut engine = Self {
            graph,
            config,
            state,
            effects: EffectManager::new(),
            scheduler: SpawnScheduler::new(),
            sim_state: SimState::new(),
            last_spike: None,
            event_bus: EventBus::default(),
            last_state_hash: 0,
        };
        engine.last_state_hash = engine.compute_state_hash();
        engine
    }

    /// Resolve a topology and build an engine over it.
    ///
    /// Lanes with unknown endpoints and duplicate node keys are dropped and
    /// listed in the returned report.
    pub fn from_topology(topology: &Topology, config: SimConfig) -> (Self, ResolveReport) {
        let (graph, report) = NetworkGraph::from_topology(topology);
        if !report.is_clean() {
            warn!(
                dangling = report.dangling.len(),
                duplicates = report.duplicate_keys.len(),
                "topology resolved with issues"
            );
        }
        (Self::new(graph, config), report)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Active cascade markers.
    pub fn effects(&self) -> &[CascadeEffect] {
        self.effects.effects()
    }

    pub fn scheduler(&self) -> &SpawnScheduler {
        &self.scheduler
    }

    pub fn sim_state(&self) -> &SimState {
        &self.sim_state
    }

    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn last_spike(&self) -> Option<&SpikeRecord> {
        self.last_spike.as_ref()
    }

    /// Get the most recently computed state hash.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// While paused, `advance()` still releases due marker waves but never
    /// ticks. A direct `step()` always runs.
    pub fn pause(&mut self) {
        self.sim_state.paused = true;
    }

    pub fn resume(&mut self) {
        self.sim_state.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.sim_state.paused
    }

    // -----------------------------------------------------------------------
    // Event system
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    /// Listen for events of `kind` that concern one node.
    pub fn on_node(&mut self, kind: EventKind, node: NodeId, listener: PassiveListener) {
        self.event_bus.on_node(kind, node, listener);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn event_bus_mut(&mut self) -> &mut EventBus {
        &mut self.event_bus
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Drive the engine from a host clock.
    ///
    /// Marker waves due at or before `now` appear first. Then, under the
    /// throttled strategy, one step runs if this is the first tick or more
    /// than the interval has passed since the last one.
    pub fn advance(&mut self, now: Millis) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        self.sim_state.clock = now;

        for due in self.scheduler.drain_due(now) {
            self.spawn_effect(due.effect);
            result.spawned_effects += 1;
        }
        if result.spawned_effects > 0 {
            trace!(now, spawned = result.spawned_effects, "released marker wave");
        }

        if let SimulationStrategy::Throttled { interval } = self.config.strategy
            && !self.sim_state.paused
            && self.sim_state.tick_due(now, interval)
        {
            self.sim_state.last_tick_at = Some(now);
            result.reports.push(self.step());
            result.steps_run += 1;
        } else {
            if result.spawned_effects > 0 {
                self.refresh_state_hash();
            }
            self.event_bus.deliver();
        }

        result
    }

    /// Run one tick of the pipeline regardless of strategy or pause state.
    pub fn step(&mut self) -> StepReport {
        let was_critical: Vec<(NodeId, bool)> = self
            .graph
            .nodes()
            .filter_map(|(id, _)| Some((id, self.is_critical(id)?)))
            .collect();

        let mut report = physics::step(&self.graph, &mut self.state, &self.config.physics);
        report.expired_effects = self.effects.decay_effects(&self.config.effects);

        self.sim_state.tick += 1;
        let tick = self.sim_state.tick;
        report.tick = tick;

        for (node, before) in was_critical {
            if !before && self.is_critical(node) == Some(true) {
                report.depleted_nodes.push(node);
            }
        }

        if !report.skipped_edges.is_empty() {
            warn!(tick, skipped = report.skipped_edges.len(), "lanes with unresolved endpoints skipped");
        }
        for &edge in &report.skipped_edges {
            self.event_bus.emit(Event::EdgeSkipped { edge, tick });
        }
        if report.expired_effects > 0 {
            self.event_bus.emit(Event::EffectExpired {
                count: report.expired_effects,
                tick,
            });
        }
        for &node in &report.depleted_nodes {
            let inventory = self.state.node(node).map(|s| s.inventory).unwrap_or(Fixed64::ZERO);
            debug!(tick, node = ?node, "node inventory fell below critical");
            self.event_bus.emit(Event::NodeDepleted { node, inventory, tick });
        }

        self.last_state_hash = self.compute_state_hash();
        self.event_bus.deliver();
        trace!(tick, total_flow = %report.total_flow, "tick complete");
        report
    }

    // -----------------------------------------------------------------------
    // Spikes
    // -----------------------------------------------------------------------

    /// Inject a demand shock at `node` and echo it upstream.
    ///
    /// Demand changes are applied immediately. The origin marker and the
    /// first upstream wave appear at once; deeper waves are queued relative
    /// to the last clock seen by `advance()`.
    pub fn trigger_spike(&mut self, node: NodeId, intensity: Fixed64) -> SpikeOutcome {
        let Some(plan) = cascade::propagate(
            &self.graph,
            &mut self.state,
            node,
            intensity,
            &self.config.cascade,
        ) else {
            debug!(node = ?node, "spike ignored: unknown node");
            return SpikeOutcome::UnknownNode;
        };

        let tick = self.sim_state.tick;
        let now = self.sim_state.clock;
        self.event_bus.emit(Event::SpikeTriggered {
            node,
            intensity: plan.intensity,
            tick,
        });

        let mut spawned = 0;
        let mut scheduled = 0;
        if let Some(position) = self.position_of(node) {
            self.spawn_effect(self.config.effects.origin_marker(node, position));
            spawned += 1;
        }

        for hit in &plan.hits {
            self.event_bus.emit(Event::DemandPropagated {
                node: hit.node,
                depth: hit.depth,
                added: hit.added,
                tick,
            });
            let Some(position) = self.position_of(hit.node) else {
                continue;
            };
            let marker = self.config.effects.echo_marker(hit.node, position, hit.depth);
            if hit.delay == 0 {
                self.spawn_effect(marker);
                spawned += 1;
            } else {
                self.scheduler.schedule(now.saturating_add(hit.delay), marker);
                scheduled += 1;
            }
        }

        self.last_spike = Some(SpikeRecord {
            node,
            intensity: plan.intensity,
            tick,
        });
        debug!(
            node = ?node,
            intensity = %plan.intensity,
            reached = plan.hits.len(),
            scheduled,
            "spike triggered"
        );

        self.last_state_hash = self.compute_state_hash();
        self.event_bus.deliver();
        SpikeOutcome::Applied {
            plan,
            spawned,
            scheduled,
        }
    }

    /// Spike with the configured default intensity.
    pub fn trigger_default_spike(&mut self, node: NodeId) -> SpikeOutcome {
        let intensity = self.config.cascade.default_intensity;
        self.trigger_spike(node, intensity)
    }

    /// Spike a node named by its topology key.
    pub fn trigger_spike_by_key(&mut self, key: &str, intensity: Fixed64) -> SpikeOutcome {
        match self.graph.node_by_key(key) {
            Some(node) => self.trigger_spike(node, intensity),
            None => {
                debug!(key, "spike ignored: unknown key");
                SpikeOutcome::UnknownNode
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Restore the initial topology values and drop every marker, pending
    /// marker wave and spike record. The tick counter and the throttle
    /// timestamp start over; listeners and pause state are kept.
    pub fn reset(&mut self) {
        self.state = StateStore::from_graph(&self.graph);
        self.effects.clear();
        let cancelled_spawns = self.scheduler.cancel_all();
        self.last_spike = None;
        self.sim_state.tick = 0;
        self.sim_state.last_tick_at = None;

        info!(cancelled_spawns, "simulation reset");
        self.event_bus.clear_all();
        self.event_bus.emit(Event::SimulationReset {
            cancelled_spawns,
            tick: 0,
        });
        self.last_state_hash = self.compute_state_hash();
        self.event_bus.deliver();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot_node(&self, node: NodeId) -> Option<NodeSnapshot> {
        query::snapshot_node(&self.graph, &self.state, node)
    }

    pub fn snapshot_all_nodes(&self) -> Vec<NodeSnapshot> {
        query::snapshot_nodes(&self.graph, &self.state)
    }

    pub fn snapshot_edges(&self) -> Vec<EdgeSnapshot> {
        query::snapshot_edges(&self.graph, &self.state)
    }

    pub fn snapshot_effects(&self) -> Vec<EffectSnapshot> {
        query::snapshot_effects(self.effects.effects())
    }

    /// Everything a renderer needs for one frame.
    pub fn view(&self) -> NetworkView {
        NetworkView {
            nodes: self.snapshot_all_nodes(),
            edges: self.snapshot_edges(),
            effects: self.snapshot_effects(),
        }
    }

    pub fn health(&self) -> NetworkHealth {
        query::network_health(&self.graph, &self.state, &self.config.health)
    }

    /// Nearest node within the configured hit radius.
    pub fn node_at(&self, point: Position) -> Option<NodeId> {
        query::node_at(&self.graph, point, self.config.health.hit_radius)
    }

    pub fn node_at_within(&self, point: Position, radius: f64) -> Option<NodeId> {
        query::node_at(&self.graph, point, radius)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn position_of(&self, node: NodeId) -> Option<Position> {
        self.graph.get_node(node).map(|n| n.position)
    }

    fn is_critical(&self, node: NodeId) -> Option<bool> {
        let capacity = self.graph.get_node(node)?.capacity;
        let inventory = self.state.node(node)?.inventory;
        Some(self.config.health.is_critical(query::fill_percent(inventory, capacity)))
    }

    fn spawn_effect(&mut self, effect: CascadeEffect) {
        self.event_bus.emit(Event::EffectSpawned {
            node: effect.node,
            color: effect.color,
            depth: effect.depth,
            tick: self.sim_state.tick,
        });
        self.effects.spawn(effect);
    }

    /// Recompute the hash after state changes outside `step()`.
    pub(crate) fn refresh_state_hash(&mut self) {
        self.last_state_hash = self.compute_state_hash();
    }

    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);
        for (id, _) in self.graph.nodes() {
            if let Some(node) = self.state.node(id) {
                hasher.write_fixed64(node.inventory);
                hasher.write_fixed64(node.demand);
            }
        }
        for (id, _) in self.graph.edges() {
            if let Some(edge) = self.state.edge(id) {
                hasher.write_fixed64(edge.flow);
            }
        }
        for effect in self.effects.effects() {
            hasher.write_fixed64(effect.radius);
            hasher.write_fixed64(effect.alpha);
        }
        hasher.write_u64(self.scheduler.pending_count() as u64);
        hasher.finish()
    }
}
