//! Serde data file structs for tuning and spike scripts.
//!
//! The network itself deserializes straight into
//! [`twinsim_core::topology::Topology`]. Tuning files use plain `f64` values
//! with every field optional, so a file only names what it changes; the
//! result is converted into a fixed-point [`SimConfig`] by
//! [`TuningData::to_config`].

use serde::Deserialize;
use twinsim_core::engine::SimConfig;
use twinsim_core::fixed::{Fixed64, f64_to_fixed64};
use twinsim_core::sim::SimulationStrategy;

// ===========================================================================
// Errors
// ===========================================================================

/// A tuning value that would break the engine's invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TuningError {
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be within [0, 1], got {value}")]
    NotAFraction { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

fn finite(field: &'static str, value: f64) -> Result<f64, TuningError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TuningError::NotFinite { field, value })
    }
}

fn fraction(field: &'static str, value: f64) -> Result<Fixed64, TuningError> {
    let value = finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(TuningError::NotAFraction { field, value });
    }
    Ok(f64_to_fixed64(value))
}

fn positive(field: &'static str, value: f64) -> Result<Fixed64, TuningError> {
    let value = finite(field, value)?;
    if value <= 0.0 {
        return Err(TuningError::NotPositive { field, value });
    }
    Ok(f64_to_fixed64(value))
}

fn non_negative(field: &'static str, value: f64) -> Result<Fixed64, TuningError> {
    let value = finite(field, value)?;
    if value < 0.0 {
        return Err(TuningError::Negative { field, value });
    }
    Ok(f64_to_fixed64(value))
}

/// Overwrite `target` with `check(value)` when the file sets the field.
fn apply<T>(
    target: &mut T,
    value: Option<f64>,
    field: &'static str,
    check: fn(&'static str, f64) -> Result<T, TuningError>,
) -> Result<(), TuningError> {
    if let Some(value) = value {
        *target = check(field, value)?;
    }
    Ok(())
}

// ===========================================================================
// Tuning
// ===========================================================================

/// Physics constants. See `twinsim_core::physics::PhysicsConfig`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhysicsTuning {
    pub demand_decay: Option<f64>,
    pub demand_floor: Option<f64>,
    pub pressure_scale: Option<f64>,
    pub flow_scale: Option<f64>,
    pub min_source_inventory: Option<f64>,
    pub demand_drain: Option<f64>,
    pub net_flow_scale: Option<f64>,
    pub inventory_inertia: Option<f64>,
}

/// Spike propagation constants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CascadeTuning {
    pub propagation_speed: Option<f64>,
    pub max_depth: Option<u32>,
    pub stagger_ms: Option<u64>,
    pub default_intensity: Option<f64>,
}

/// Marker spawn and fade constants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectTuning {
    pub radius_growth: Option<f64>,
    pub alpha_decay: Option<f64>,
    pub cull_below: Option<f64>,
    pub origin_radius: Option<f64>,
    pub origin_alpha: Option<f64>,
    pub echo_radius: Option<f64>,
    pub echo_alpha: Option<f64>,
    pub echo_alpha_step: Option<f64>,
}

/// Health classification thresholds, in fill percent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthTuning {
    pub optimal: Option<f64>,
    pub normal: Option<f64>,
    pub stressed: Option<f64>,
    pub critical_node: Option<f64>,
    pub medium_level: Option<f64>,
    pub at_risk: Option<f64>,
    pub hit_radius: Option<f64>,
}

/// Who decides when a tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverMode {
    /// Only explicit `step()` calls tick.
    Manual,
    /// `advance(now)` ticks at most once per interval.
    Throttled,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverTuning {
    pub mode: Option<DriverMode>,
    pub tick_interval_ms: Option<u64>,
}

/// A tuning file. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuningData {
    #[serde(default)]
    pub physics: PhysicsTuning,
    #[serde(default)]
    pub cascade: CascadeTuning,
    #[serde(default)]
    pub effects: EffectTuning,
    #[serde(default)]
    pub health: HealthTuning,
    #[serde(default)]
    pub driver: DriverTuning,
}

impl TuningData {
    /// Overlay the file's values onto the default configuration.
    pub fn to_config(&self) -> Result<SimConfig, TuningError> {
        let mut config = SimConfig::default();

        let p = &self.physics;
        let physics = &mut config.physics;
        apply(&mut physics.demand_decay, p.demand_decay, "physics.demand_decay", fraction)?;
        apply(&mut physics.demand_floor, p.demand_floor, "physics.demand_floor", non_negative)?;
        apply(&mut physics.pressure_scale, p.pressure_scale, "physics.pressure_scale", positive)?;
        apply(&mut physics.flow_scale, p.flow_scale, "physics.flow_scale", non_negative)?;
        apply(
            &mut physics.min_source_inventory,
            p.min_source_inventory,
            "physics.min_source_inventory",
            non_negative,
        )?;
        apply(&mut physics.demand_drain, p.demand_drain, "physics.demand_drain", non_negative)?;
        apply(&mut physics.net_flow_scale, p.net_flow_scale, "physics.net_flow_scale", non_negative)?;
        apply(
            &mut physics.inventory_inertia,
            p.inventory_inertia,
            "physics.inventory_inertia",
            fraction,
        )?;

        let c = &self.cascade;
        let cascade = &mut config.cascade;
        apply(
            &mut cascade.propagation_speed,
            c.propagation_speed,
            "cascade.propagation_speed",
            fraction,
        )?;
        apply(
            &mut cascade.default_intensity,
            c.default_intensity,
            "cascade.default_intensity",
            non_negative,
        )?;
        if let Some(depth) = c.max_depth {
            cascade.max_depth = depth;
        }
        if let Some(stagger) = c.stagger_ms {
            cascade.stagger = stagger;
        }

        let e = &self.effects;
        let effects = &mut config.effects;
        apply(&mut effects.radius_growth, e.radius_growth, "effects.radius_growth", non_negative)?;
        apply(&mut effects.alpha_decay, e.alpha_decay, "effects.alpha_decay", fraction)?;
        apply(&mut effects.cull_below, e.cull_below, "effects.cull_below", fraction)?;
        apply(&mut effects.origin_radius, e.origin_radius, "effects.origin_radius", non_negative)?;
        apply(&mut effects.origin_alpha, e.origin_alpha, "effects.origin_alpha", fraction)?;
        apply(&mut effects.echo_radius, e.echo_radius, "effects.echo_radius", non_negative)?;
        apply(&mut effects.echo_alpha, e.echo_alpha, "effects.echo_alpha", fraction)?;
        apply(
            &mut effects.echo_alpha_step,
            e.echo_alpha_step,
            "effects.echo_alpha_step",
            fraction,
        )?;

        let h = &self.health;
        let health = &mut config.health;
        apply(&mut health.optimal, h.optimal, "health.optimal", non_negative)?;
        apply(&mut health.normal, h.normal, "health.normal", non_negative)?;
        apply(&mut health.stressed, h.stressed, "health.stressed", non_negative)?;
        apply(&mut health.critical_node, h.critical_node, "health.critical_node", non_negative)?;
        apply(&mut health.medium_level, h.medium_level, "health.medium_level", non_negative)?;
        apply(&mut health.at_risk, h.at_risk, "health.at_risk", non_negative)?;
        if let Some(radius) = h.hit_radius {
            health.hit_radius = non_negative("health.hit_radius", radius)?.to_num::<f64>();
        }

        let interval = match config.strategy {
            SimulationStrategy::Throttled { interval } => interval,
            SimulationStrategy::Tick => twinsim_core::sim::DEFAULT_TICK_INTERVAL,
        };
        let interval = self.driver.tick_interval_ms.unwrap_or(interval);
        config.strategy = match self.driver.mode {
            Some(DriverMode::Manual) => SimulationStrategy::Tick,
            Some(DriverMode::Throttled) | None => SimulationStrategy::Throttled { interval },
        };

        Ok(config)
    }
}

// ===========================================================================
// Spike scripts
// ===========================================================================

/// One spike at a fixed time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedSpikeData {
    /// Scenario time of the spike.
    pub at_ms: u64,
    /// Node key.
    pub node: String,
    /// Falls back to the cascade's default intensity.
    #[serde(default)]
    pub intensity: Option<f64>,
}

/// Seeded random spikes at a fixed cadence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomSpikesData {
    pub seed: u64,
    pub every_ms: u64,
    pub min_intensity: f64,
    pub max_intensity: f64,
    /// Candidate node keys. Empty means every node.
    #[serde(default)]
    pub targets: Vec<String>,
}

/// A headless scenario: when to spike, reset and stop.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpikeScriptData {
    /// Total simulated time to run.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Simulated frame spacing. Defaults to 16 ms.
    #[serde(default)]
    pub frame_ms: Option<u64>,
    #[serde(default)]
    pub spikes: Vec<ScriptedSpikeData>,
    #[serde(default)]
    pub random: Option<RandomSpikesData>,
    /// Scenario times at which the network is reset.
    #[serde(default)]
    pub resets: Vec<u64>,
}

// ===========================================================================
// Tests
// ===========================================================================
