//! Cascade markers: ephemeral rings that grow and fade after a spike.
//!
//! Markers carry no simulation state. They are added by the cascade
//! propagator (directly or through the spawn scheduler) and only ever
//! decay afterwards.

use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::NodeId;
use crate::topology::Position;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Marker types
// ---------------------------------------------------------------------------

/// Color tag derived from how far from the spike a marker was spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectColor {
    /// The spike itself and its direct suppliers.
    Alert,
    /// Second-tier suppliers.
    Warning,
    /// Everything further upstream.
    Info,
}

impl EffectColor {
    /// Tag for a marker whose discovering node sat at `parent_depth`.
    pub fn for_parent_depth(parent_depth: u32) -> Self {
        match parent_depth {
            0 => EffectColor::Alert,
            1 => EffectColor::Warning,
            _ => EffectColor::Info,
        }
    }

    /// RGB hex string for renderers.
    pub fn hex(self) -> &'static str {
        match self {
            EffectColor::Alert => "#FF003C",
            EffectColor::Warning => "#FFB800",
            EffectColor::Info => "#00F0FF",
        }
    }
}

/// One cascade marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeEffect {
    /// Node the marker was spawned for.
    pub node: NodeId,
    /// Copied from the node at spawn time.
    pub position: Position,
    /// Grows every tick.
    pub radius: Fixed64,
    /// Opacity; shrinks every tick.
    pub alpha: Fixed64,
    pub color: EffectColor,
    /// Hop distance from the spike origin.
    pub depth: u32,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Spawn and decay parameters for cascade markers.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectConfig {
    /// Added to the radius each tick.
    pub radius_growth: Fixed64,
    /// Multiplier applied to alpha each tick.
    pub alpha_decay: Fixed64,
    /// Markers are removed once alpha falls below this.
    pub cull_below: Fixed64,
    pub origin_radius: Fixed64,
    pub origin_alpha: Fixed64,
    pub echo_radius: Fixed64,
    /// Alpha of a marker discovered from the spike origin itself.
    pub echo_alpha: Fixed64,
    /// Alpha lost per hop of the discovering node.
    pub echo_alpha_step: Fixed64,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            radius_growth: f64_to_fixed64(3.0),
            alpha_decay: f64_to_fixed64(0.92),
            cull_below: f64_to_fixed64(0.1),
            origin_radius: f64_to_fixed64(20.0),
            origin_alpha: f64_to_fixed64(1.0),
            echo_radius: f64_to_fixed64(15.0),
            echo_alpha: f64_to_fixed64(0.8),
            echo_alpha_step: f64_to_fixed64(0.15),
        }
    }
}

impl EffectConfig {
    /// The marker shown at the node a spike was injected into.
    pub fn origin_marker(&self, node: NodeId, position: Position) -> CascadeEffect {
        CascadeEffect {
            node,
            position,
            radius: self.origin_radius,
            alpha: self.origin_alpha,
            color: EffectColor::Alert,
            depth: 0,
        }
    }

    /// The marker shown at an upstream node reached at `depth` (>= 1).
    pub fn echo_marker(&self, node: NodeId, position: Position, depth: u32) -> CascadeEffect {
        let parent_depth = depth.saturating_sub(1);
        let fade = self
            .echo_alpha_step
            .saturating_mul(Fixed64::from_num(parent_depth));
        CascadeEffect {
            node,
            position,
            radius: self.echo_radius,
            alpha: self.echo_alpha.saturating_sub(fade).max(Fixed64::ZERO),
            color: EffectColor::for_parent_depth(parent_depth),
            depth,
        }
    }
}

// ---------------------------------------------------------------------------
// EffectManager
// ---------------------------------------------------------------------------

/// Owns the active marker collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectManager {
    effects: Vec<CascadeEffect>,
}

impl EffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker.
    pub fn spawn(&mut self, effect: CascadeEffect) {
        self.effects.push(effect);
    }

    /// Age every marker by one tick and drop the ones that faded out.
    /// Returns how many were removed.
    pub fn decay_effects(&mut self, config: &EffectConfig) -> usize {
        for effect in &mut self.effects {
            effect.radius = effect.radius.saturating_add(config.radius_growth);
            effect.alpha = effect.alpha.saturating_mul(config.alpha_decay);
        }
        let before = self.effects.len();
        self.effects.retain(|e| e.alpha >= config.cull_below);
        before - self.effects.len()
    }

    /// Active markers in spawn order.
    pub fn effects(&self) -> &[CascadeEffect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::fixed64_to_f64;
    use slotmap::SlotMap;

    fn node() -> NodeId {
        let mut sm = SlotMap::<NodeId, ()>::with_key();
        sm.insert(())
    }

    #[test]
    fn origin_marker_defaults() {
        let cfg = EffectConfig::default();
        let m = cfg.origin_marker(node(), Position::new(1.0, 2.0));
        assert_eq!(m.radius, f64_to_fixed64(20.0));
        assert_eq!(m.alpha, f64_to_fixed64(1.0));
        assert_eq!(m.color, EffectColor::Alert);
        assert_eq!(m.position, Position::new(1.0, 2.0));
    }

    #[test]
    fn echo_markers_fade_and_recolor_with_depth() {
        let cfg = EffectConfig::default();
        let n = node();
        let d1 = cfg.echo_marker(n, Position::default(), 1);
        let d2 = cfg.echo_marker(n, Position::default(), 2);
        let d3 = cfg.echo_marker(n, Position::default(), 3);

        assert_eq!(d1.color, EffectColor::Alert);
        assert_eq!(d2.color, EffectColor::Warning);
        assert_eq!(d3.color, EffectColor::Info);
        assert!((fixed64_to_f64(d1.alpha) - 0.8).abs() < 1e-6);
        assert!((fixed64_to_f64(d2.alpha) - 0.65).abs() < 1e-6);
        assert!((fixed64_to_f64(d3.alpha) - 0.5).abs() < 1e-6);
        assert_eq!(d1.radius, f64_to_fixed64(15.0));
    }

    #[test]
    fn echo_alpha_never_negative() {
        let cfg = EffectConfig::default();
        let deep = cfg.echo_marker(node(), Position::default(), 40);
        assert_eq!(deep.alpha, Fixed64::ZERO);
    }

    #[test]
    fn decay_grows_radius_and_fades_alpha() {
        let cfg = EffectConfig::default();
        let mut mgr = EffectManager::new();
        mgr.spawn(cfg.origin_marker(node(), Position::default()));
        let removed = mgr.decay_effects(&cfg);

        assert_eq!(removed, 0);
        let e = mgr.effects()[0];
        assert_eq!(e.radius, f64_to_fixed64(23.0));
        assert!((fixed64_to_f64(e.alpha) - 0.92).abs() < 1e-6);
    }

    #[test]
    fn full_alpha_marker_expires_on_28th_decay() {
        let cfg = EffectConfig::default();
        let mut mgr = EffectManager::new();
        mgr.spawn(cfg.origin_marker(node(), Position::default()));

        let mut last_alpha = Fixed64::from_num(1);
        for _ in 0..27 {
            assert_eq!(mgr.decay_effects(&cfg), 0);
            let alpha = mgr.effects()[0].alpha;
            assert!(alpha < last_alpha);
            last_alpha = alpha;
        }
        assert_eq!(mgr.decay_effects(&cfg), 1);
        assert!(mgr.is_empty());
    }

    #[test]
    fn clear_empties_collection() {
        let cfg = EffectConfig::default();
        let mut mgr = EffectManager::new();
        mgr.spawn(cfg.origin_marker(node(), Position::default()));
        mgr.spawn(cfg.echo_marker(node(), Position::default(), 1));
        assert_eq!(mgr.len(), 2);
        mgr.clear();
        assert!(mgr.is_empty());
    }

    #[test]
    fn color_hex() {
        assert_eq!(EffectColor::Alert.hex(), "#FF003C");
        assert_eq!(EffectColor::Warning.hex(), "#FFB800");
        assert_eq!(EffectColor::Info.hex(), "#00F0FF");
    }
}
