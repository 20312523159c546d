//! Test utilities for driving the orchestrator without a physics engine.
//!
//! Provides `TestRace`, a wrapper around [`Roulette`] backed by
//! `ScriptedPhysics`, where tests place marbles directly instead of
//! simulating them.

use std::collections::HashMap;

use crate::camera::FollowCamera;
use crate::config::{RaceConfig, UPDATE_INTERVAL_MS};
use crate::marble::MarbleId;
use crate::physics::{EntityState, MarbleState, Physics};
use crate::recorder::Recorder;
use crate::roulette::Roulette;
use crate::snapshot::{PresentationSink, RenderSnapshot};
use crate::stage::{StageDef, builtin_stages};

/// A scripted marble body.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScriptedBody {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
}

/// Physics stand-in that moves bodies at constant velocity once started.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPhysics {
    pub bodies: HashMap<MarbleId, ScriptedBody>,
    pub started: bool,
    pub stage_loads: usize,
    /// Every `dt` passed to `step`.
    pub steps: Vec<f32>,
    pub removed: Vec<MarbleId>,
    pub impacts: Vec<MarbleId>,
}

impl ScriptedPhysics {
    pub fn has_body(&self, id: MarbleId) -> bool {
        self.bodies.contains_key(&id)
    }
}

impl Physics for ScriptedPhysics {
    fn create_stage(&mut self, _stage: &StageDef) {
        self.stage_loads += 1;
    }

    fn step(&mut self, dt: f32) {
        self.steps.push(dt);
        if !self.started {
            return;
        }
        for body in self.bodies.values_mut() {
            body.position[0] += body.velocity[0] * dt;
            body.position[1] += body.velocity[1] * dt;
        }
    }

    fn entities(&self) -> Vec<EntityState> {
        Vec::new()
    }

    fn create_marble(&mut self, id: MarbleId, position: [f32; 2], _weight: f32) {
        self.bodies.insert(
            id,
            ScriptedBody {
                position,
                velocity: [0.0, 0.0],
            },
        );
    }

    fn remove_marble(&mut self, id: MarbleId) {
        if self.bodies.remove(&id).is_some() {
            self.removed.push(id);
        }
    }

    fn marble_state(&self, id: MarbleId) -> Option<MarbleState> {
        self.bodies.get(&id).map(|body| MarbleState {
            position: body.position,
            angle: 0.0,
        })
    }

    fn clear_marbles(&mut self) {
        self.bodies.clear();
    }

    fn clear(&mut self) {
        self.bodies.clear();
        self.started = false;
    }

    fn impact(&mut self, id: MarbleId) {
        self.impacts.push(id);
    }

    fn start(&mut self) {
        self.started = true;
    }
}

/// Recorder whose arming is controlled by the test.
#[derive(Debug)]
pub(crate) struct ScriptedRecorder {
    /// Arm as soon as `start` is called.
    pub arm_immediately: bool,
    pub armed: bool,
    pub recording: bool,
    pub takes: usize,
    pub stops: usize,
}

impl Default for ScriptedRecorder {
    fn default() -> Self {
        Self {
            arm_immediately: true,
            armed: false,
            recording: false,
            takes: 0,
            stops: 0,
        }
    }
}

impl Recorder for ScriptedRecorder {
    fn start(&mut self) {
        self.recording = true;
        self.armed = self.arm_immediately;
        self.takes += 1;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    fn stop(&mut self) {
        self.recording = false;
        self.armed = false;
        self.stops += 1;
    }
}

/// Summary of one rendered frame.
#[derive(Debug, Clone)]
pub(crate) struct FrameSummary {
    pub marbles: usize,
    pub rows: usize,
    pub winner: Option<String>,
    pub highlighted: Vec<MarbleId>,
}

/// Sink that keeps a summary of every frame.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub frames: Vec<FrameSummary>,
}

impl PresentationSink for RecordingSink {
    fn render(&mut self, snapshot: &RenderSnapshot<'_>) {
        self.frames.push(FrameSummary {
            marbles: snapshot.marbles.len(),
            rows: snapshot.rank_rows().len(),
            winner: snapshot.winner.map(|m| m.name.clone()),
            highlighted: snapshot.highlighted(),
        });
    }
}

pub(crate) type ScriptedRoulette = Roulette<ScriptedPhysics, FollowCamera, ScriptedRecorder>;

/// A scripted race with a manual clock.
pub(crate) struct TestRace {
    pub roulette: ScriptedRoulette,
    pub now_ms: f64,
}

impl TestRace {
    /// Create a race on the builtin stages with the given roster.
    pub fn new(names: &[&str]) -> Self {
        Self::with_stages(names, builtin_stages())
    }

    /// Create a race with no stage selected.
    pub fn without_stages(names: &[&str]) -> Self {
        Self::with_stages(names, Vec::new())
    }

    fn with_stages(names: &[&str], stages: Vec<StageDef>) -> Self {
        let mut roulette = Roulette::with_parts(
            ScriptedPhysics::default(),
            FollowCamera::new(),
            ScriptedRecorder::default(),
            stages,
            12345,
        );
        roulette.set_marbles(names);
        // Pin the clock origin so every later tick advances exactly one step
        roulette.update(0.0);
        Self {
            roulette,
            now_ms: 0.0,
        }
    }

    pub fn start(&mut self, config: RaceConfig) {
        self.roulette.start(config).unwrap();
    }

    /// Advance the clock by `ms`, one fixed step per update.
    pub fn advance(&mut self, ms: f64) {
        let mut remaining = ms;
        while remaining > 0.0 {
            self.now_ms += UPDATE_INTERVAL_MS;
            remaining -= UPDATE_INTERVAL_MS;
            self.roulette.update(self.now_ms);
        }
    }

    /// Teleport a marble to height `y`.
    pub fn place(&mut self, id: MarbleId, y: f32) {
        let body = self.roulette.physics_mut().bodies.get_mut(&id).unwrap();
        body.position[1] = y;
    }

    /// Push a marble past the goal line and run one step.
    pub fn cross(&mut self, id: MarbleId) {
        let goal_y = self.roulette.current_stage().unwrap().goal_y;
        self.place(id, goal_y + 1.0);
        self.advance(UPDATE_INTERVAL_MS);
    }

    pub fn name_of(&self, id: MarbleId) -> String {
        self.roulette
            .marbles()
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.name.clone())
            .unwrap()
    }

    pub fn ids_named(&self, name: &str) -> Vec<MarbleId> {
        self.roulette
            .marbles()
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.id)
            .collect()
    }
}
