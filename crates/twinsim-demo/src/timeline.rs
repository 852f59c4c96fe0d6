//! Resolve a spike script into a time-ordered list of engine actions.

use twinsim_core::engine::Engine;
use twinsim_core::fixed::{Fixed64, Millis, f64_to_fixed64};
use twinsim_core::id::NodeId;
use twinsim_core::rng::SimRng;
use twinsim_data::schema::{RandomSpikesData, SpikeScriptData};

use crate::error::DemoError;

/// Scenario length when the script does not set one.
pub const DEFAULT_DURATION: Millis = 10_000;

/// Frame spacing when the script does not set one (about 60 fps).
pub const DEFAULT_FRAME: Millis = 16;

/// Something the runner does to the engine at a scenario time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineAction {
    Spike { node: NodeId, intensity: Fixed64 },
    Reset,
}

/// Actions ordered by time, plus the run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub duration: Millis,
    pub frame: Millis,
    /// `(at, action)`, sorted by `at`. Equal times keep script order with
    /// resets before spikes.
    pub actions: Vec<(Millis, TimelineAction)>,
}

impl Timeline {
    /// A run with no scripted actions.
    pub fn idle(duration: Millis) -> Self {
        Self {
            duration,
            frame: DEFAULT_FRAME,
            actions: Vec::new(),
        }
    }

    pub fn spike_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, a)| matches!(a, TimelineAction::Spike { .. }))
            .count()
    }
}

fn resolve_key(engine: &Engine, key: &str) -> Result<NodeId, DemoError> {
    engine
        .graph()
        .node_by_key(key)
        .ok_or_else(|| DemoError::NodeNotFound { key: key.to_string() })
}

/// Expand a random spike block into concrete spikes at `every_ms`,
/// `2 * every_ms`, ... strictly before `duration`.
fn random_spikes(
    engine: &Engine,
    random: &RandomSpikesData,
    duration: Millis,
) -> Result<Vec<(Millis, TimelineAction)>, DemoError> {
    if random.every_ms == 0 {
        return Err(DemoError::InvalidRandomSpikes {
            detail: "every_ms must be positive".to_string(),
        });
    }
    if !(random.min_intensity >= 0.0 && random.max_intensity >= random.min_intensity) {
        return Err(DemoError::InvalidRandomSpikes {
            detail: format!(
                "intensity range [{}, {}] is empty or negative",
                random.min_intensity, random.max_intensity
            ),
        });
    }

    let targets: Vec<NodeId> = if random.targets.is_empty() {
        engine.graph().nodes().map(|(id, _)| id).collect()
    } else {
        random
            .targets
            .iter()
            .map(|key| resolve_key(engine, key))
            .collect::<Result<_, _>>()?
    };

    let mut rng = SimRng::new(random.seed);
    let low = f64_to_fixed64(random.min_intensity);
    let high = f64_to_fixed64(random.max_intensity);
    let mut spikes = Vec::new();
    let mut at = random.every_ms;
    while at < duration {
        let Some(&node) = rng.pick(&targets) else {
            break;
        };
        let intensity = rng.range_fixed(low, high);
        spikes.push((at, TimelineAction::Spike { node, intensity }));
        at += random.every_ms;
    }
    Ok(spikes)
}

/// Resolve every node key in `script` against `engine` and merge scripted,
/// random and reset entries into one timeline.
pub fn build_timeline(engine: &Engine, script: &SpikeScriptData) -> Result<Timeline, DemoError> {
    let duration = script.duration_ms.unwrap_or(DEFAULT_DURATION);
    let frame = script.frame_ms.unwrap_or(DEFAULT_FRAME);
    if frame == 0 {
        return Err(DemoError::ZeroFrame);
    }

    let mut actions: Vec<(Millis, TimelineAction)> = script
        .resets
        .iter()
        .map(|&at| (at, TimelineAction::Reset))
        .collect();

    let default_intensity = engine.config().cascade.default_intensity;
    for spike in &script.spikes {
        let node = resolve_key(engine, &spike.node)?;
        let intensity = spike
            .intensity
            .map(f64_to_fixed64)
            .unwrap_or(default_intensity);
        actions.push((spike.at_ms, TimelineAction::Spike { node, intensity }));
    }

    if let Some(random) = &script.random {
        actions.extend(random_spikes(engine, random, duration)?);
    }

    actions.sort_by_key(|&(at, _)| at);
    Ok(Timeline {
        duration,
        frame,
        actions,
    })
}
