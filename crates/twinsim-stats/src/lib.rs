//! Rolling network statistics for the supply-chain engine.
//!
//! Samples network health once per tick into fixed-capacity histories and
//! counts events (`SpikeTriggered`, `DemandPropagated`, `NodeDepleted`,
//! `EffectExpired`, `EdgeSkipped`) over a rolling tick window using
//! [`Fixed64`] arithmetic.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = NetworkStats::new(StatsConfig::default());
//! // Feed events each tick:
//! stats.process_event(&event);
//! // Close the tick with a health sample:
//! stats.end_tick(engine.tick(), &engine.health(), engine.effects().len());
//! // Query metrics:
//! let trend = stats.inventory_trend();
//! ```

use std::collections::HashMap;

use twinsim_core::event::Event;
use twinsim_core::fixed::{Fixed64, Ticks};
use twinsim_core::id::{EdgeId, NodeId};
use twinsim_core::query::NetworkHealth;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the statistics module.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Window size in ticks for rolling event rates (e.g., 60 ticks).
    pub window_size: Ticks,
    /// Maximum number of samples retained per history.
    pub history_capacity: usize,
    /// Half-to-half mean change below which a history counts as steady.
    pub trend_tolerance: Fixed64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            history_capacity: 256,
            trend_tolerance: Fixed64::from_bits(1 << 31),
        }
    }
}

// ---------------------------------------------------------------------------
// RingBuffer -- fixed-capacity history
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer storing [`Fixed64`] values for trend analysis.
///
/// When full, the oldest entry is overwritten. Iterates oldest-to-newest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Fixed64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with the given capacity. A zero capacity is
    /// raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![Fixed64::ZERO; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Push a value, overwriting the oldest entry if at capacity.
    pub fn push(&mut self, value: Fixed64) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Get the most recently pushed value, if any.
    pub fn latest(&self) -> Option<Fixed64> {
        if self.len == 0 {
            return None;
        }
        let idx = if self.head == 0 {
            self.capacity() - 1
        } else {
            self.head - 1
        };
        Some(self.data[idx])
    }

    /// Iterate values from oldest to newest.
    pub fn iter(&self) -> RingBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            self.head
        };
        RingBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    /// Collect all stored values into a Vec (oldest to newest).
    pub fn to_vec(&self) -> Vec<Fixed64> {
        self.iter().collect()
    }

    /// Mean of the stored values; zero when empty.
    pub fn mean(&self) -> Fixed64 {
        mean_of(self.iter())
    }

    pub fn max(&self) -> Option<Fixed64> {
        self.iter().max()
    }

    pub fn min(&self) -> Option<Fixed64> {
        self.iter().min()
    }

    /// Compare the mean of the newer half of the history with the older half.
    pub fn trend(&self, tolerance: Fixed64) -> Trend {
        if self.len < 2 {
            return Trend::Steady;
        }
        let split = self.len / 2;
        let older = mean_of(self.iter().take(split));
        let newer = mean_of(self.iter().skip(split));
        let change = newer.saturating_sub(older);
        if change > tolerance {
            Trend::Rising
        } else if change < tolerance.saturating_neg() {
            Trend::Falling
        } else {
            Trend::Steady
        }
    }

    /// Clear all stored values without changing capacity.
    pub fn clear(&mut self) {
        for slot in &mut self.data {
            *slot = Fixed64::ZERO;
        }
        self.head = 0;
        self.len = 0;
    }
}

fn mean_of(values: impl Iterator<Item = Fixed64>) -> Fixed64 {
    let (sum, count) = values.fold((Fixed64::ZERO, 0u32), |(sum, count), v| {
        (sum.saturating_add(v), count + 1)
    });
    sum.checked_div(Fixed64::from_num(count)).unwrap_or(Fixed64::ZERO)
}

/// Iterator over [`RingBuffer`] values, oldest to newest.
pub struct RingBufferIter<'a> {
    buffer: &'a RingBuffer,
    index: usize,
    remaining: usize,
}

impl Iterator for RingBufferIter<'_> {
    type Item = Fixed64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.buffer.data[self.index];
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RingBufferIter<'_> {}

/// Direction a history is moving in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Steady,
    Falling,
}

// ---------------------------------------------------------------------------
// Rolling window counter
// ---------------------------------------------------------------------------

/// A counter over the most recent N ticks.
///
/// [`add`](Self::add) accumulates into the in-progress tick;
/// [`commit`](Self::commit) writes it into the window once per tick.
/// Queries include the in-progress tick.
#[derive(Debug, Clone)]
struct RollingWindow {
    tick_counts: Vec<u64>,
    write_pos: usize,
    committed_total: u64,
    current: u64,
    committed_count: usize,
}

impl RollingWindow {
    fn new(window_size: usize) -> Self {
        Self {
            tick_counts: vec![0; window_size.max(1)],
            write_pos: 0,
            committed_total: 0,
            current: 0,
            committed_count: 0,
        }
    }

    fn window_size(&self) -> usize {
        self.tick_counts.len()
    }

    fn add(&mut self, count: u64) {
        self.current += count;
    }

    /// Commit the current tick, evicting the oldest if the window is full.
    fn commit(&mut self) {
        if self.committed_count == self.window_size() {
            self.committed_total -= self.tick_counts[self.write_pos];
        }
        self.tick_counts[self.write_pos] = self.current;
        self.committed_total += self.current;
        self.current = 0;
        self.write_pos = (self.write_pos + 1) % self.window_size();
        if self.committed_count < self.window_size() {
            self.committed_count += 1;
        }
    }

    fn total(&self) -> u64 {
        self.committed_total + self.current
    }

    /// Average count per tick over the contributing ticks.
    fn rate(&self) -> Fixed64 {
        let effective_count = if self.current > 0 {
            self.committed_count + 1
        } else {
            self.committed_count
        };
        if effective_count == 0 {
            return Fixed64::ZERO;
        }
        Fixed64::from_num(self.total()) / Fixed64::from_num(effective_count)
    }

    fn clear(&mut self) {
        *self = Self::new(self.window_size());
    }
}

// ---------------------------------------------------------------------------
// Per-node statistics
// ---------------------------------------------------------------------------

/// Lifetime counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Times the node was a spike target.
    pub spikes: u64,
    /// Times the node was reached by propagation.
    pub cascade_hits: u64,
    /// Total demand added by spikes and propagation.
    pub demand_received: Fixed64,
    /// Times inventory fell below the critical threshold.
    pub depletions: u64,
}

// ---------------------------------------------------------------------------
// NetworkStats
// ---------------------------------------------------------------------------

/// Network statistics aggregator.
///
/// Accepts events via [`process_event`](NetworkStats::process_event), closes
/// ticks with a health sample via [`end_tick`](NetworkStats::end_tick), and
/// exposes histories, trends and event rates.
#[derive(Debug)]
pub struct NetworkStats {
    config: StatsConfig,
    average_inventory: RingBuffer,
    total_demand: RingBuffer,
    critical_nodes: RingBuffer,
    active_effects: RingBuffer,
    spikes: RollingWindow,
    propagations: RollingWindow,
    depletions: RollingWindow,
    expirations: RollingWindow,
    skipped: RollingWindow,
    nodes: HashMap<NodeId, NodeStats>,
    skipped_edges: HashMap<EdgeId, u64>,
    lifetime_spikes: u64,
    resets: u64,
    current_tick: Ticks,
}

impl NetworkStats {
    pub fn new(config: StatsConfig) -> Self {
        let window = config.window_size as usize;
        let history = config.history_capacity;
        Self {
            average_inventory: RingBuffer::new(history),
            total_demand: RingBuffer::new(history),
            critical_nodes: RingBuffer::new(history),
            active_effects: RingBuffer::new(history),
            spikes: RollingWindow::new(window),
            propagations: RollingWindow::new(window),
            depletions: RollingWindow::new(window),
            expirations: RollingWindow::new(window),
            skipped: RollingWindow::new(window),
            nodes: HashMap::new(),
            skipped_edges: HashMap::new(),
            lifetime_spikes: 0,
            resets: 0,
            current_tick: 0,
            config,
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Tick of the last [`end_tick`](Self::end_tick).
    pub fn current_tick(&self) -> Ticks {
        self.current_tick
    }

    // -- Event processing ---------------------------------------------------

    /// Process a single event. A reset event clears the histories and
    /// rolling windows; lifetime and per-node counters survive.
    pub fn process_event(&mut self, event: &Event) {
        match *event {
            Event::SpikeTriggered {
                node, intensity, ..
            } => {
                self.spikes.add(1);
                self.lifetime_spikes += 1;
                let stats = self.nodes.entry(node).or_default();
                stats.spikes += 1;
                stats.demand_received = stats.demand_received.saturating_add(intensity);
            }
            Event::DemandPropagated { node, added, .. } => {
                self.propagations.add(1);
                let stats = self.nodes.entry(node).or_default();
                stats.cascade_hits += 1;
                stats.demand_received = stats.demand_received.saturating_add(added);
            }
            Event::NodeDepleted { node, .. } => {
                self.depletions.add(1);
                self.nodes.entry(node).or_default().depletions += 1;
            }
            Event::EffectExpired { count, .. } => {
                self.expirations.add(count as u64);
            }
            Event::EdgeSkipped { edge, .. } => {
                self.skipped.add(1);
                *self.skipped_edges.entry(edge).or_default() += 1;
            }
            Event::SimulationReset { .. } => {
                self.resets += 1;
                self.clear_rolling();
            }
            Event::EffectSpawned { .. } => {}
        }
    }

    /// Close the tick: record the health sample and advance the windows.
    pub fn end_tick(&mut self, tick: Ticks, health: &NetworkHealth, active_effects: usize) {
        self.current_tick = tick;

        self.average_inventory.push(health.average_inventory);
        self.total_demand.push(health.total_demand);
        self.critical_nodes
            .push(Fixed64::from_num(health.critical_nodes as u64));
        self.active_effects
            .push(Fixed64::from_num(active_effects as u64));

        for window in self.windows_mut() {
            window.commit();
        }
    }

    fn windows_mut(&mut self) -> [&mut RollingWindow; 5] {
        [
            &mut self.spikes,
            &mut self.propagations,
            &mut self.depletions,
            &mut self.expirations,
            &mut self.skipped,
        ]
    }

    fn clear_rolling(&mut self) {
        self.average_inventory.clear();
        self.total_demand.clear();
        self.critical_nodes.clear();
        self.active_effects.clear();
        for window in self.windows_mut() {
            window.clear();
        }
    }

    // -- Histories ----------------------------------------------------------

    /// Mean fill percentage per tick, oldest first.
    pub fn inventory_history(&self) -> Vec<Fixed64> {
        self.average_inventory.to_vec()
    }

    pub fn demand_history(&self) -> Vec<Fixed64> {
        self.total_demand.to_vec()
    }

    pub fn critical_history(&self) -> Vec<Fixed64> {
        self.critical_nodes.to_vec()
    }

    pub fn effect_history(&self) -> Vec<Fixed64> {
        self.active_effects.to_vec()
    }

    pub fn inventory_trend(&self) -> Trend {
        self.average_inventory.trend(self.config.trend_tolerance)
    }

    pub fn demand_trend(&self) -> Trend {
        self.total_demand.trend(self.config.trend_tolerance)
    }

    /// Highest total demand seen in the retained history.
    pub fn peak_demand(&self) -> Fixed64 {
        self.total_demand.max().unwrap_or(Fixed64::ZERO)
    }

    /// Lowest mean fill percentage seen in the retained history.
    pub fn lowest_inventory(&self) -> Option<Fixed64> {
        self.average_inventory.min()
    }

    /// Mean fill percentage over the retained history.
    pub fn mean_inventory(&self) -> Fixed64 {
        self.average_inventory.mean()
    }

    // -- Rates --------------------------------------------------------------

    /// Spikes per tick over the rolling window.
    pub fn spike_rate(&self) -> Fixed64 {
        self.spikes.rate()
    }

    /// Propagation hits per tick over the rolling window.
    pub fn propagation_rate(&self) -> Fixed64 {
        self.propagations.rate()
    }

    pub fn depletion_rate(&self) -> Fixed64 {
        self.depletions.rate()
    }

    /// Markers expired per tick over the rolling window.
    pub fn expiry_rate(&self) -> Fixed64 {
        self.expirations.rate()
    }

    pub fn skip_rate(&self) -> Fixed64 {
        self.skipped.rate()
    }

    /// Depletion events inside the rolling window.
    pub fn depletions_in_window(&self) -> u64 {
        self.depletions.total()
    }

    // -- Lifetime counters --------------------------------------------------

    pub fn node(&self, node: NodeId) -> NodeStats {
        self.nodes.get(&node).copied().unwrap_or_default()
    }

    /// The node that received the most demand, if any received some.
    pub fn most_stressed_node(&self) -> Option<(NodeId, Fixed64)> {
        self.nodes
            .iter()
            .filter(|(_, s)| s.demand_received > Fixed64::ZERO)
            .max_by_key(|(_, s)| s.demand_received)
            .map(|(&id, s)| (id, s.demand_received))
    }

    pub fn times_skipped(&self, edge: EdgeId) -> u64 {
        self.skipped_edges.get(&edge).copied().unwrap_or(0)
    }

    pub fn lifetime_spikes(&self) -> u64 {
        self.lifetime_spikes
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn tracked_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Clear everything, including lifetime counters.
    pub fn clear(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

// ===========================================================================
// Tests
// ===========================================================================
