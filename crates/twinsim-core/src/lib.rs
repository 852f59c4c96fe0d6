//! Twinsim Core -- the simulation engine behind the supply-chain digital twin.
//!
//! This crate provides the fixed distribution network, the per-node
//! simulation state, the pressure-driven physics tick, demand-shock cascade
//! propagation, ephemeral cascade markers, and a throttled tick driver.
//! All simulation quantities use deterministic fixed-point arithmetic.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] advances the simulation by one tick:
//!
//! 1. **Decay** -- Every node's demand shrinks by the decay factor and snaps
//!    to zero once it falls under the floor.
//! 2. **Flow** -- Every lane computes a flow rate from the inventory
//!    differential and downstream demand, accumulating inflow/outflow.
//! 3. **Inventory** -- Every node blends its inventory with the net flow
//!    through the inertia factor and clamps to `[0, capacity]`.
//! 4. **Effects** -- Cascade markers grow, fade, and expire.
//! 5. **Bookkeeping** -- Tick counter, state hash, event delivery.
//!
//! # Spikes
//!
//! ```rust,ignore
//! let (mut engine, _report) = Engine::from_topology(&continental_network(), SimConfig::default());
//! engine.trigger_spike_by_key("dc-3", f64_to_fixed64(60.0));
//! engine.step();
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the network, state store, effects, and scheduler.
//! - [`graph::NetworkGraph`] -- Distribution centers and transport lanes.
//! - [`topology::Topology`] -- Declarative, serde-friendly network description.
//! - [`state::StateStore`] -- Mutable per-node and per-lane quantities.
//! - [`physics`] -- The tick function and its tuning constants.
//! - [`cascade`] -- Reverse breadth-first shock propagation.
//! - [`effect::EffectManager`] -- Cascade marker lifecycle.
//! - [`schedule::SpawnScheduler`] -- Deferred marker spawns, cancellable on reset.
//! - [`query`] -- Owned snapshots and network health for renderers.
//! - [`event::EventBus`] -- Buffered simulation events with listeners.

pub mod cascade;
pub mod effect;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod graph;
pub mod id;
pub mod physics;
pub mod query;
pub mod rng;
pub mod schedule;
pub mod serialize;
pub mod sim;
pub mod state;
pub mod topology;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
