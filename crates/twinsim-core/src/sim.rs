//! Simulation strategy and state types.
//!
//! The engine is parameterized by a [`SimulationStrategy`] that determines how
//! time advances. Both strategies run the same tick pipeline; they differ
//! only in who decides when a tick happens.

use crate::fixed::{Fixed64, Millis, Ticks};
use crate::physics::StepReport;

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// Default spacing between throttled ticks.
pub const DEFAULT_TICK_INTERVAL: Millis = 100;

/// How the engine advances time. Chosen at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SimulationStrategy {
    /// The host calls `engine.step()` itself. `advance()` still fires due
    /// marker spawns but never ticks.
    Tick,

    /// Frame-rate independent mode. The host calls `engine.advance(now)`
    /// every frame with its clock; a tick runs only when more than
    /// `interval` has passed since the last one. At most one tick per call.
    Throttled {
        /// Minimum spacing between ticks, in the host's time units.
        interval: Millis,
    },
}

impl Default for SimulationStrategy {
    fn default() -> Self {
        SimulationStrategy::Throttled {
            interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable bookkeeping tracked by the engine alongside the state store.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Incremented by 1 for each physics step.
    pub tick: Ticks,

    /// Latest host time seen by `advance()`. Spikes schedule their marker
    /// waves relative to this.
    pub clock: Millis,

    /// Host time of the last throttled tick. `None` until the first one,
    /// so the first `advance()` always ticks.
    pub last_tick_at: Option<Millis>,

    /// Paused engines fire due spawns but skip throttled ticks.
    pub paused: bool,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a throttled driver with `interval` should tick at `now`.
    pub fn tick_due(&self, now: Millis, interval: Millis) -> bool {
        match self.last_tick_at {
            None => true,
            Some(last) => now.saturating_sub(last) > interval,
        }
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default)]
pub struct AdvanceResult {
    /// Number of simulation steps actually executed (0 or 1).
    pub steps_run: usize,

    /// Scheduled markers that became visible during this call.
    pub spawned_effects: usize,

    /// One report per executed step.
    pub reports: Vec<StepReport>,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for replay comparison.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
