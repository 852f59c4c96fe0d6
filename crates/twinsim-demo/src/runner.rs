use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info};
use twinsim_core::engine::{Engine, SimConfig};
use twinsim_core::event::{Event, EventKind};
use twinsim_core::fixed::{Fixed64, Millis};
use twinsim_core::query::NetworkHealth;
use twinsim_core::serialize::CheckpointRing;
use twinsim_core::sim::SimulationStrategy;
use twinsim_core::topology::Topology;
use twinsim_data::ScenarioData;
use twinsim_stats::{NetworkStats, StatsConfig};

use crate::error::DemoError;
use crate::timeline::{Timeline, TimelineAction, build_timeline};

/// How many checkpoints the runner keeps.
const CHECKPOINT_SLOTS: usize = 8;

/// What happened during one simulated frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Scenario clock for this frame.
    pub now: Millis,
    pub steps_run: usize,
    pub spawned_effects: usize,
    pub spikes_applied: usize,
    pub resets: usize,
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub ticks: u64,
    pub spikes: u64,
    pub resets: u64,
    pub state_hash: u64,
    pub health: NetworkHealth,
    pub peak_demand: Fixed64,
    pub lowest_inventory: Option<Fixed64>,
}

/// Drives an [`Engine`] from a simulated frame clock.
///
/// Each frame advances the clock, lets the engine's driver decide whether
/// to tick, applies timeline actions that fell due, and feeds emitted
/// events into [`NetworkStats`].
pub struct HeadlessRunner {
    engine: Engine,
    timeline: Timeline,
    cursor: usize,
    clock: Millis,
    started: bool,
    frames: u64,
    spikes: u64,
    resets: u64,
    stats: NetworkStats,
    inbox: Rc<RefCell<Vec<Event>>>,
    checkpoints: CheckpointRing,
}

impl HeadlessRunner {
    /// Build a runner over a fresh engine for `topology`.
    pub fn new(topology: &Topology, config: SimConfig, timeline: Timeline) -> Self {
        let (engine, report) = Engine::from_topology(topology, config);
        if !report.is_clean() {
            debug!(dangling = report.dangling.len(), "runner network has unresolved lanes");
        }
        Self::with_engine(engine, timeline)
    }

    /// Wrap an existing engine. Registers a listener for every event kind.
    pub fn with_engine(mut engine: Engine, timeline: Timeline) -> Self {
        let inbox: Rc<RefCell<Vec<Event>>> = Rc::new(RefCell::new(Vec::new()));
        for kind in EventKind::ALL {
            let sink = Rc::clone(&inbox);
            engine.on_passive(
                kind,
                Box::new(move |event| sink.borrow_mut().push(event.clone())),
            );
        }
        Self {
            engine,
            timeline,
            cursor: 0,
            clock: 0,
            started: false,
            frames: 0,
            spikes: 0,
            resets: 0,
            stats: NetworkStats::new(StatsConfig::default()),
            inbox,
            checkpoints: CheckpointRing::new(CHECKPOINT_SLOTS),
        }
    }

    /// Build from a loaded scenario. Without a script the run is idle for
    /// the default duration.
    pub fn from_scenario(scenario: &ScenarioData) -> Result<Self, DemoError> {
        let mut runner = Self::new(
            &scenario.topology,
            scenario.config.clone(),
            Timeline::idle(crate::timeline::DEFAULT_DURATION),
        );
        if let Some(script) = &scenario.script {
            runner.timeline = build_timeline(&runner.engine, script)?;
        }
        info!(
            nodes = runner.engine.graph().node_count(),
            actions = runner.timeline.actions.len(),
            duration = runner.timeline.duration,
            "runner ready"
        );
        Ok(runner)
    }

    /// Load a scenario directory and build a runner for it.
    pub fn from_dir(dir: &Path) -> Result<Self, DemoError> {
        let scenario = twinsim_data::load_scenario(dir).map_err(|source| DemoError::DataLoad {
            dir: dir.to_path_buf(),
            source,
        })?;
        Self::from_scenario(&scenario)
    }

    // -- Accessors -----------------------------------------------------------

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn clock(&self) -> Millis {
        self.clock
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whether the clock has reached the timeline's duration.
    pub fn is_finished(&self) -> bool {
        self.started && self.clock >= self.timeline.duration
    }

    // -- Driving -------------------------------------------------------------

    /// Run one frame. The first frame runs at time 0; later frames move the
    /// clock forward by the timeline's frame length.
    pub fn frame(&mut self) -> FrameReport {
        if self.started {
            self.clock += self.timeline.frame;
        }
        self.started = true;
        self.frames += 1;
        let now = self.clock;

        let mut report = FrameReport {
            now,
            ..FrameReport::default()
        };

        let advanced = self.engine.advance(now);
        report.spawned_effects = advanced.spawned_effects;
        report.steps_run = advanced.steps_run;
        if self.engine.config().strategy == SimulationStrategy::Tick && !self.engine.is_paused() {
            self.engine.step();
            report.steps_run += 1;
        }

        while let Some(&(at, action)) = self.timeline.actions.get(self.cursor) {
            if at > now {
                break;
            }
            self.cursor += 1;
            match action {
                TimelineAction::Spike { node, intensity } => {
                    if self.engine.trigger_spike(node, intensity).is_applied() {
                        report.spikes_applied += 1;
                        self.spikes += 1;
                    }
                }
                TimelineAction::Reset => {
                    info!(now, tick = self.engine.tick(), "scripted reset");
                    self.engine.reset();
                    report.resets += 1;
                    self.resets += 1;
                }
            }
        }

        self.collect_events(report.steps_run);
        report
    }

    /// Feed collected events to the stats and close one stats tick per
    /// engine step.
    fn collect_events(&mut self, steps_run: usize) {
        let events: Vec<Event> = self.inbox.borrow_mut().drain(..).collect();
        for event in &events {
            self.stats.process_event(event);
        }
        if steps_run > 0 {
            let health = self.engine.health();
            self.stats
                .end_tick(self.engine.tick(), &health, self.engine.effects().len());
        }
    }

    /// Run frames until the timeline's duration is reached.
    pub fn run_to_end(&mut self) -> RunSummary {
        while !self.is_finished() {
            self.frame();
        }
        let summary = self.summary();
        info!(
            frames = summary.frames,
            ticks = summary.ticks,
            spikes = summary.spikes,
            hash = summary.state_hash,
            "run complete"
        );
        summary
    }

    /// Run `n` frames or until finished, whichever comes first.
    pub fn run_frames(&mut self, n: u64) -> u64 {
        let mut ran = 0;
        while ran < n && !self.is_finished() {
            self.frame();
            ran += 1;
        }
        ran
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.frames,
            ticks: self.engine.tick(),
            spikes: self.spikes,
            resets: self.resets,
            state_hash: self.engine.state_hash(),
            health: self.engine.health(),
            peak_demand: self.stats.peak_demand(),
            lowest_inventory: self.stats.lowest_inventory(),
        }
    }

    // -- Checkpoints ---------------------------------------------------------

    /// Save the engine state into the runner's checkpoint ring.
    pub fn checkpoint(&mut self) -> Result<(), DemoError> {
        self.checkpoints.capture(&self.engine)?;
        Ok(())
    }

    /// Restore the most recent checkpoint. Returns its tick, or `None` when
    /// no checkpoint exists. The frame clock and timeline cursor are not
    /// rewound.
    pub fn restore_latest(&mut self) -> Result<Option<u64>, DemoError> {
        let Some(entry) = self.checkpoints.latest() else {
            return Ok(None);
        };
        let tick = entry.tick;
        let data = entry.data.clone();
        self.engine.load_state(&data)?;
        Ok(Some(tick))
    }
}
