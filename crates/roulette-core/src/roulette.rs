//! Race orchestrator.
//!
//! Owns the roster, the winners and duplicate lists and the race
//! configuration. The host calls [`Roulette::frame`] from its per-frame
//! callback; everything else, timers included, runs inside that call.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::camera::{CameraController, CameraInput, FollowCamera};
use crate::config::{
    MAX_ELAPSED_MS, RECORDING_STOP_DELAY_MS, REMOVAL_DELAY_MS, RaceConfig, RouletteOptions,
    SHAKE_THRESHOLD_MS, UPDATE_INTERVAL_MS,
};
use crate::effects::{ParticleManager, SkillEffect};
use crate::error::RouletteError;
use crate::events::{EventBus, EventKind, GoalWinner, ListenerId, RaceEvent};
use crate::marble::{Marble, MarbleId, Skill};
use crate::physics::Physics;
use crate::ranking::{RankBoard, UiObject};
use crate::recorder::{NullRecorder, Recorder};
use crate::replay::{ReplayScheduler, ReplayState, countdown_winners};
use crate::roster::Roster;
use crate::snapshot::{PresentationSink, RenderSnapshot};
use crate::stage::{MapInfo, StageDef, builtin_stages};
use crate::timer::{TimerId, TimerQueue};
use crate::timescale::{camera_target_index, goal_distance, time_scale};

/// Race lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RacePhase {
    /// No race in progress.
    #[default]
    Idle,
    /// Started, waiting for the recorder before releasing marbles.
    Arming,
    Running,
    /// A winner was declared. Physics keeps settling.
    Finished,
}

/// Work deferred to a later frame.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Deferred {
    RemoveMarble { id: MarbleId, epoch: u64 },
    StopRecording,
    Replay,
}

/// The race orchestrator.
pub struct Roulette<P, C = FollowCamera, R = NullRecorder> {
    physics: P,
    camera: C,
    recorder: R,
    events: EventBus,
    timers: TimerQueue<Deferred>,
    replay: ReplayScheduler,
    rng: ChaCha8Rng,

    stages: Vec<StageDef>,
    stage: Option<usize>,

    marbles: Vec<Marble>,
    winners: Vec<Marble>,
    duplicates: Vec<Marble>,
    winner: Option<Marble>,
    effects: Vec<SkillEffect>,
    particles: ParticleManager,
    rank_board: RankBoard,

    config: RaceConfig,
    total_marble_count: usize,
    saved_names: Vec<String>,
    next_marble_id: u32,
    /// Bumped whenever the roster is discarded; stale timers compare it.
    epoch: u64,
    phase: RacePhase,
    auto_recording: bool,
    /// Pending stop of the take opened for the finished race.
    recording_stop: Option<TimerId>,

    last_time_ms: Option<f64>,
    now_ms: f64,
    elapsed_ms: f64,
    speed: f64,
    time_scale: f32,
    goal_dist: f32,
    shake_available: bool,
}

impl<P: Physics> Roulette<P> {
    /// Creates an orchestrator with the follow camera, no recorder and the
    /// builtin stages.
    pub fn new(physics: P, seed: u64) -> Self {
        Self::with_parts(physics, FollowCamera::new(), NullRecorder, builtin_stages(), seed)
    }
}

impl<P: Physics, C: CameraController, R: Recorder> Roulette<P, C, R> {
    /// Creates an orchestrator from explicit collaborators.
    ///
    /// The first stage, if any, is selected and loaded.
    pub fn with_parts(
        physics: P,
        camera: C,
        recorder: R,
        stages: Vec<StageDef>,
        seed: u64,
    ) -> Self {
        let stage = (!stages.is_empty()).then_some(0);
        let mut roulette = Self {
            physics,
            camera,
            recorder,
            events: EventBus::new(),
            timers: TimerQueue::new(),
            replay: ReplayScheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            stages,
            stage,
            marbles: Vec::new(),
            winners: Vec::new(),
            duplicates: Vec::new(),
            winner: None,
            effects: Vec::new(),
            particles: ParticleManager::new(),
            rank_board: RankBoard::new(),
            config: RaceConfig::default(),
            total_marble_count: 0,
            saved_names: Vec::new(),
            next_marble_id: 0,
            epoch: 0,
            phase: RacePhase::Idle,
            auto_recording: false,
            recording_stop: None,
            last_time_ms: None,
            now_ms: 0.0,
            elapsed_ms: 0.0,
            speed: 1.0,
            time_scale: 1.0,
            goal_dist: f32::INFINITY,
            shake_available: false,
        };
        roulette.load_map();
        roulette
    }

    // ========== Frame loop ==========

    /// Advances the race to `now_ms` and renders one snapshot.
    pub fn frame(&mut self, now_ms: f64, sink: &mut impl PresentationSink) {
        self.update(now_ms);
        self.render(sink);
    }

    /// Advances the race to host time `now_ms` without rendering.
    ///
    /// Runs due timers, then zero or more fixed steps.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, now_ms: f64) {
        let last = *self.last_time_ms.get_or_insert(now_ms);
        self.now_ms = now_ms;
        self.run_due_timers();
        self.poll_recorder();

        self.elapsed_ms += (now_ms - last).max(0.0) * self.speed;
        if self.elapsed_ms > MAX_ELAPSED_MS {
            self.elapsed_ms %= MAX_ELAPSED_MS;
        }
        self.last_time_ms = Some(now_ms);

        while self.elapsed_ms >= UPDATE_INTERVAL_MS {
            let interval = (UPDATE_INTERVAL_MS / 1000.0) as f32 * self.time_scale;
            self.physics.step(interval);
            self.update_marbles(UPDATE_INTERVAL_MS);
            self.update_effects(UPDATE_INTERVAL_MS);
            self.particles.update(UPDATE_INTERVAL_MS);
            self.elapsed_ms -= UPDATE_INTERVAL_MS;
            self.rank_board.update(UPDATE_INTERVAL_MS);
        }

        if self.marbles.len() > 1 {
            self.marbles.sort_by(|a, b| b.y.total_cmp(&a.y));
        }

        if let Some(index) = self.stage {
            self.camera.update(CameraInput {
                marbles: &self.marbles,
                stage: &self.stages[index],
                need_to_zoom: self.goal_dist < crate::config::ZOOM_THRESHOLD,
                target_index: camera_target_index(&self.config, self.winners.len()),
            });

            let leader_stuck = self.marbles.first().map_or(0.0, |m| m.stuck_ms);
            let available =
                self.is_running() && !self.marbles.is_empty() && leader_stuck > SHAKE_THRESHOLD_MS;
            self.change_shake_available(available);
        }

        let rows = self.winners.len() + self.duplicates.len() + self.marbles.len();
        self.rank_board.observe(self.winners.len(), rows);
    }

    /// Hands the current snapshot to `sink`. Does nothing without a stage.
    pub fn render(&self, sink: &mut impl PresentationSink) {
        if let Some(snapshot) = self.snapshot() {
            sink.render(&snapshot);
        }
    }

    pub fn snapshot(&self) -> Option<RenderSnapshot<'_>> {
        let stage = self.current_stage()?;
        Some(RenderSnapshot {
            camera: self.camera.view(),
            stage,
            entities: self.physics.entities(),
            marbles: &self.marbles,
            winners: &self.winners,
            duplicates: &self.duplicates,
            effects: &self.effects,
            particles: self.particles.particles(),
            rank_scroll: self.rank_board.scroll(),
            winner_rank: self.config.winner_rank,
            winning_range: self.config.winning_range,
            winner: self.winner.as_ref(),
        })
    }

    fn update_marbles(&mut self, delta_ms: f64) {
        let Some(stage) = self.current_stage() else {
            return;
        };
        let (goal_y, zoom_y) = (stage.goal_y, stage.zoom_y);
        let use_skills = self.config.use_skills;

        for i in 0..self.marbles.len() {
            let id = self.marbles[i].id;
            let state = self.physics.marble_state(id);
            self.marbles[i].update(delta_ms, state, use_skills, &mut self.rng);

            if self.marbles[i].skill == Skill::Impact {
                self.effects.push(SkillEffect::new(self.marbles[i].position()));
                self.physics.impact(id);
            }
            if self.marbles[i].y > goal_y {
                self.on_goal_crossed(i, goal_y);
            }
        }

        self.marbles.retain(|m| m.y <= goal_y);
        let winners = self.winners.len();
        self.goal_dist = goal_distance(&self.marbles, zoom_y, &self.config, winners);
        self.time_scale = time_scale(&self.marbles, zoom_y, &self.config, winners, self.goal_dist);
    }

    /// Applies the winner rules to the marble at `index` that just crossed.
    fn on_goal_crossed(&mut self, index: usize, goal_y: f32) {
        let marble = self.marbles[index].clone();
        self.timers.schedule(
            self.now_ms,
            REMOVAL_DELAY_MS,
            Deferred::RemoveMarble {
                id: marble.id,
                epoch: self.epoch,
            },
        );

        let range_mode = self.config.is_range_mode();
        if range_mode
            && self.config.prevent_duplicate_winners
            && self.winners.iter().any(|w| w.name == marble.name)
        {
            tracing::debug!(name = %marble.name, "[roulette] Duplicate winner suppressed");
            self.duplicates.push(marble);
            return;
        }

        self.winners.push(marble.clone());
        if !self.is_running() {
            return;
        }

        if range_mode {
            if self.winners.len() == self.config.winning_range {
                let names = self.winners.iter().map(|w| w.name.clone()).collect();
                self.finish(marble, GoalWinner::Multiple(names));
            }
        } else if self.winners.len() == self.config.winner_rank + 1 {
            let name = marble.name.clone();
            self.finish(marble, GoalWinner::Single(name));
        } else if self.config.winner_rank == self.winners.len()
            && self.config.winner_rank + 1 == self.total_marble_count
        {
            // Only one marble is left on course; it takes the last place.
            let remaining = self.marbles[index + 1..]
                .iter()
                .chain(&self.marbles[..index])
                .find(|m| m.y <= goal_y)
                .cloned();
            if let Some(last) = remaining {
                let name = last.name.clone();
                self.finish(last, GoalWinner::Single(name));
            }
        }
    }

    fn finish(&mut self, winner: Marble, payload: GoalWinner) {
        tracing::info!(
            winner = %payload.display(),
            finished = self.winners.len(),
            "[roulette] Race finished"
        );
        self.events.emit(RaceEvent::Goal { winner: payload });
        self.winner = Some(winner);
        self.phase = RacePhase::Finished;
        self.particles.shot(&mut self.rng);
        self.recording_stop = Some(self.timers.schedule(
            self.now_ms,
            RECORDING_STOP_DELAY_MS,
            Deferred::StopRecording,
        ));

        if self.replay.is_enabled() {
            self.schedule_replay();
        } else {
            self.replay.mark_idle();
        }
    }

    fn update_effects(&mut self, delta_ms: f64) {
        for effect in &mut self.effects {
            effect.update(delta_ms);
        }
        self.effects.retain(|e| !e.is_destroyed());
    }

    fn change_shake_available(&mut self, available: bool) {
        if self.shake_available != available {
            self.shake_available = available;
            self.events
                .emit(RaceEvent::ShakeAvailableChanged { available });
        }
    }

    // ========== Timers ==========

    fn run_due_timers(&mut self) {
        for action in self.timers.take_due(self.now_ms) {
            match action {
                Deferred::RemoveMarble { id, epoch } if epoch == self.epoch => {
                    self.physics.remove_marble(id);
                }
                Deferred::StopRecording => {
                    self.recording_stop = None;
                    self.recorder.stop();
                }
                Deferred::Replay => self.run_replay(),
                stale => tracing::trace!(?stale, "[roulette] Stale timer ignored"),
            }
        }
    }

    fn schedule_replay(&mut self) {
        let winners = countdown_winners(&self.config, &self.winners, self.winner.as_ref());
        self.events.emit(RaceEvent::StartCountdown {
            seconds: self.replay.countdown_seconds(),
            winners,
            is_multiple_winners: self.config.is_range_mode(),
        });
        self.replay
            .schedule(&mut self.timers, self.now_ms, Deferred::Replay);
        tracing::info!(
            delay_ms = self.replay.delay_ms(),
            "[roulette] Replay scheduled"
        );
    }

    fn run_replay(&mut self) {
        self.replay.begin_reset();
        self.reset();
        let names = self.saved_names.clone();
        self.build_roster(names.as_slice());
        match self.start(self.config.clone()) {
            Ok(()) => {
                self.replay.mark_running();
                tracing::info!(marbles = self.marbles.len(), "[roulette] Replay started");
            }
            Err(error) => {
                self.replay.mark_idle();
                tracing::warn!(%error, "[roulette] Replay could not start");
            }
        }
    }

    // ========== Roster ==========

    fn build_roster<S: AsRef<str>>(&mut self, names: &[S]) {
        let roster = Roster::parse(names);
        let total = roster.total();
        for slot in roster.assign_orders(&mut self.rng) {
            let id = MarbleId(self.next_marble_id);
            self.next_marble_id += 1;
            let marble = Marble::new(id, slot.name, slot.weight, slot.order_index, total, &mut self.rng);
            self.physics.create_marble(id, marble.position(), marble.weight);
            self.marbles.push(marble);
        }
        self.total_marble_count = total;
        tracing::debug!(
            lines = names.len(),
            marbles = total,
            "[roulette] Roster built"
        );
    }

    /// Replaces the roster with marbles built from raw name lines.
    ///
    /// The lines are kept for replays. Malformed lines are dropped.
    pub fn set_marbles<S: AsRef<str>>(&mut self, names: &[S]) {
        self.saved_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.reset();
        self.build_roster(names);
    }

    /// Removes every marble and forgets all results.
    pub fn clear_marbles(&mut self) {
        self.physics.clear_marbles();
        self.winner = None;
        self.winners.clear();
        self.duplicates.clear();
        self.marbles.clear();
        self.phase = RacePhase::Idle;
        self.epoch += 1;
        // A finished race's take ends with its roster
        if let Some(id) = self.recording_stop.take() {
            self.timers.cancel(id);
            self.recorder.stop();
        }
    }

    /// Clears marbles and results and reloads the current stage.
    pub fn reset(&mut self) {
        self.clear_marbles();
        self.physics.clear();
        self.effects.clear();
        self.rank_board.reset();
        self.load_map();
        self.goal_dist = f32::INFINITY;
        self.time_scale = 1.0;
    }

    fn load_map(&mut self) {
        match self.stage {
            Some(index) => self.physics.create_stage(&self.stages[index]),
            None => tracing::warn!("[roulette] No map has been selected"),
        }
    }

    // ========== Commands ==========

    /// Applies user options. The map is switched only when it differs.
    pub fn apply_options(&mut self, options: &RouletteOptions) -> Result<(), RouletteError> {
        if options.map >= self.stages.len() {
            return Err(RouletteError::MapIndexOutOfRange {
                index: options.map,
                available: self.stages.len(),
            });
        }
        self.set_speed(options.speed)?;
        if self.stage != Some(options.map) {
            self.set_map(options.map)?;
        }
        let race = options.race_config();
        self.set_winning_rank(race.winner_rank);
        self.set_winning_range(race.winning_range);
        self.set_prevent_duplicate_winners_in_range_mode(race.prevent_duplicate_winners);
        self.set_use_skills(race.use_skills);
        self.set_auto_recording(options.auto_recording);
        self.set_loop_delay(options.loop_delay_ms);
        self.set_infinite_loop(options.infinite_loop);
        Ok(())
    }

    /// Starts the race with `config`.
    ///
    /// The rank is clamped below the roster size. With auto recording the
    /// marbles are released once the recorder is armed.
    pub fn start(&mut self, config: RaceConfig) -> Result<(), RouletteError> {
        if self.stage.is_none() {
            return Err(RouletteError::NoStage);
        }
        if self.marbles.is_empty() {
            return Err(RouletteError::EmptyRoster);
        }
        self.config = config.clamped(self.marbles.len());
        self.phase = RacePhase::Arming;
        tracing::info!(
            marbles = self.marbles.len(),
            winner_rank = self.config.winner_rank,
            winning_range = self.config.winning_range,
            "[roulette] Race started"
        );

        if self.replay.is_enabled() {
            self.events.emit(RaceEvent::HideUi);
        }
        if self.auto_recording {
            self.recorder.start();
        }
        self.poll_recorder();
        Ok(())
    }

    /// Releases the marbles once recording is armed.
    fn poll_recorder(&mut self) {
        if self.phase != RacePhase::Arming {
            return;
        }
        if self.auto_recording && !self.recorder.is_armed() {
            return;
        }
        self.physics.start();
        for marble in &mut self.marbles {
            marble.is_active = true;
        }
        self.phase = RacePhase::Running;
    }

    /// Selects a stage and rebuilds the roster from the saved names.
    pub fn set_map(&mut self, index: usize) -> Result<(), RouletteError> {
        if index >= self.stages.len() {
            return Err(RouletteError::MapIndexOutOfRange {
                index,
                available: self.stages.len(),
            });
        }
        self.stage = Some(index);
        let names = self.saved_names.clone();
        self.set_marbles(names.as_slice());
        Ok(())
    }

    pub fn maps(&self) -> Vec<MapInfo> {
        self.stages
            .iter()
            .enumerate()
            .map(|(index, stage)| MapInfo {
                index,
                title: stage.title.clone(),
            })
            .collect()
    }

    pub fn set_speed(&mut self, value: f64) -> Result<(), RouletteError> {
        if !(value.is_finite() && value > 0.0) {
            return Err(RouletteError::InvalidSpeed(value));
        }
        self.speed = value;
        Ok(())
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_winning_rank(&mut self, rank: usize) {
        self.config.winner_rank = rank;
    }

    pub fn set_winning_range(&mut self, range: usize) {
        self.config.winning_range = range.max(1);
    }

    pub fn set_prevent_duplicate_winners_in_range_mode(&mut self, value: bool) {
        self.config.prevent_duplicate_winners = value;
    }

    pub fn set_use_skills(&mut self, value: bool) {
        self.config.use_skills = value;
    }

    pub fn set_auto_recording(&mut self, value: bool) {
        self.auto_recording = value;
    }

    /// Enables replays; disabling cancels a pending one.
    pub fn set_infinite_loop(&mut self, value: bool) {
        self.replay.set_enabled(value, &mut self.timers);
    }

    pub fn set_loop_delay(&mut self, delay_ms: u64) {
        self.replay.set_delay_ms(delay_ms);
    }

    /// Disables replays, cancels a pending one and restores the hidden UI.
    pub fn stop_infinite_loop(&mut self) {
        if self.replay.cancel(&mut self.timers) {
            tracing::info!("[roulette] Pending replay cancelled");
        }
        self.replay.set_enabled(false, &mut self.timers);
        self.events.emit(RaceEvent::HideCountdown);
        self.events.emit(RaceEvent::ShowUi);
    }

    /// Nudges the pack around a stuck leader. Returns false when shaking is
    /// not available.
    pub fn shake(&mut self) -> bool {
        if !self.shake_available {
            return false;
        }
        let Some(leader) = self.marbles.first() else {
            return false;
        };
        self.effects.push(SkillEffect::new(leader.position()));
        self.physics.impact(leader.id);
        true
    }

    /// Pins the camera to an external position, or releases it with `None`.
    pub fn set_camera_override(&mut self, position: Option<[f32; 2]>) {
        match position {
            Some(position) => {
                self.camera.set_position(position, false);
                self.camera.lock(true);
            }
            None => self.camera.lock(false),
        }
    }

    pub fn scroll_rank_list(&mut self, delta_y: f32) {
        self.rank_board.on_wheel(delta_y);
    }

    // ========== Events ==========

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&RaceEvent) + 'static,
    ) -> ListenerId {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Takes the events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        self.events.drain()
    }

    // ========== Accessors ==========

    /// Number of marbles still on course.
    pub fn count(&self) -> usize {
        self.marbles.len()
    }

    pub fn marbles(&self) -> &[Marble] {
        &self.marbles
    }

    pub fn winners(&self) -> &[Marble] {
        &self.winners
    }

    pub fn duplicates(&self) -> &[Marble] {
        &self.duplicates
    }

    pub fn winner(&self) -> Option<&Marble> {
        self.winner.as_ref()
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, RacePhase::Arming | RacePhase::Running)
    }

    pub fn replay_state(&self) -> ReplayState {
        self.replay.state()
    }

    pub fn total_marble_count(&self) -> usize {
        self.total_marble_count
    }

    pub fn saved_names(&self) -> &[String] {
        &self.saved_names
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn goal_distance(&self) -> f32 {
        self.goal_dist
    }

    pub fn is_shake_available(&self) -> bool {
        self.shake_available
    }

    pub fn current_stage(&self) -> Option<&StageDef> {
        self.stage.map(|index| &self.stages[index])
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut R {
        &mut self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingSink, TestRace};

    fn ids(race: &TestRace) -> Vec<MarbleId> {
        race.roulette.marbles().iter().map(|m| m.id).collect()
    }

    fn goals(events: &[RaceEvent]) -> Vec<GoalWinner> {
        events
            .iter()
            .filter_map(|e| match e {
                RaceEvent::Goal { winner } => Some(winner.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_crossing_wins_rank_zero() {
        let mut race = TestRace::new(&["Alice", "Bob", "Carol"]);
        race.start(RaceConfig::default());
        let first = ids(&race)[1];
        let name = race.name_of(first);

        race.cross(first);

        let events = race.roulette.drain_events();
        assert_eq!(goals(&events), vec![GoalWinner::Single(name.clone())]);
        assert!(!race.roulette.is_running());
        assert_eq!(race.roulette.winner().map(|m| m.id), Some(first));
        assert_eq!(race.roulette.count(), 2);
    }

    #[test]
    fn test_single_rank_ends_at_k_plus_one() {
        let mut race = TestRace::new(&["A", "B", "C", "D"]);
        race.start(RaceConfig {
            winner_rank: 1,
            ..RaceConfig::default()
        });
        let order = ids(&race);

        race.cross(order[0]);
        assert!(goals(&race.roulette.drain_events()).is_empty());
        assert!(race.roulette.is_running());

        race.cross(order[1]);
        let name = race.name_of(order[1]);
        assert_eq!(
            goals(&race.roulette.drain_events()),
            vec![GoalWinner::Single(name)]
        );
        assert_eq!(race.roulette.phase(), RacePhase::Finished);

        race.cross(order[2]);
        assert!(goals(&race.roulette.drain_events()).is_empty());
        assert_eq!(race.roulette.winners().len(), 3);
    }

    #[test]
    fn test_rank_clamped_to_roster() {
        let mut race = TestRace::new(&["A", "B", "C"]);
        race.start(RaceConfig {
            winner_rank: 10,
            ..RaceConfig::default()
        });
        assert_eq!(race.roulette.config().winner_rank, 2);
    }

    #[test]
    fn test_last_marble_declared_when_one_remains() {
        let mut race = TestRace::new(&["A", "B", "C"]);
        race.start(RaceConfig {
            winner_rank: 2,
            ..RaceConfig::default()
        });
        let order = ids(&race);

        race.cross(order[0]);
        assert!(race.roulette.is_running());
        race.cross(order[1]);

        let last = race.name_of(order[2]);
        assert_eq!(
            goals(&race.roulette.drain_events()),
            vec![GoalWinner::Single(last)]
        );
        assert_eq!(race.roulette.winner().map(|m| m.id), Some(order[2]));
        assert_eq!(race.roulette.winners().len(), 2);
    }

    #[test]
    fn test_same_step_crossings_declare_one_winner() {
        let mut race = TestRace::new(&["A", "B", "C"]);
        race.start(RaceConfig {
            winner_rank: 2,
            ..RaceConfig::default()
        });
        let goal_y = race.roulette.current_stage().unwrap().goal_y;
        let order = ids(&race);

        // The survivor sits between the two crossers, so the search wraps
        // past the first crosser to find it.
        let last = race.name_of(order[1]);
        race.place(order[0], goal_y + 1.0);
        race.place(order[2], goal_y + 1.0);
        race.advance(10.0);

        assert_eq!(
            goals(&race.roulette.drain_events()),
            vec![GoalWinner::Single(last)]
        );
        assert_eq!(race.roulette.winner().map(|m| m.id), Some(order[1]));
        assert_eq!(race.roulette.phase(), RacePhase::Finished);

        let mut race = TestRace::new(&["A", "B", "C"]);
        race.start(RaceConfig::default());
        let order = ids(&race);
        let first = race.name_of(order[0]);
        for &id in &order {
            race.place(id, goal_y + 1.0);
        }
        race.advance(10.0);

        assert_eq!(
            goals(&race.roulette.drain_events()),
            vec![GoalWinner::Single(first)]
        );
        assert_eq!(race.roulette.winners().len(), 3);
    }

    #[test]
    fn test_range_mode_ends_after_n_crossings() {
        let mut race = TestRace::new(&["A", "A", "B"]);
        race.start(RaceConfig {
            winning_range: 2,
            ..RaceConfig::default()
        });
        let order = ids(&race);

        race.cross(order[0]);
        assert!(goals(&race.roulette.drain_events()).is_empty());
        race.cross(order[1]);

        let expected = vec![race.name_of(order[0]), race.name_of(order[1])];
        assert_eq!(
            goals(&race.roulette.drain_events()),
            vec![GoalWinner::Multiple(expected)]
        );
        assert_eq!(race.roulette.winner().map(|m| m.id), Some(order[1]));
    }

    #[test]
    fn test_range_mode_suppresses_duplicate_names() {
        let mut race = TestRace::new(&["A*2", "B"]);
        race.start(RaceConfig {
            winning_range: 2,
            prevent_duplicate_winners: true,
            ..RaceConfig::default()
        });
        let a: Vec<_> = race.ids_named("A");
        let b = race.ids_named("B")[0];

        race.cross(a[0]);
        race.cross(a[1]);
        assert!(goals(&race.roulette.drain_events()).is_empty());
        assert_eq!(race.roulette.winners().len(), 1);
        assert_eq!(race.roulette.duplicates().len(), 1);
        assert!(race.roulette.is_running());

        race.cross(b);
        assert_eq!(
            goals(&race.roulette.drain_events()),
            vec![GoalWinner::Multiple(vec!["A".into(), "B".into()])]
        );
    }

    #[test]
    fn test_duplicates_count_without_suppression() {
        let mut race = TestRace::new(&["A*2", "B"]);
        race.start(RaceConfig {
            winning_range: 2,
            ..RaceConfig::default()
        });
        let a = race.ids_named("A");
        race.cross(a[0]);
        race.cross(a[1]);
        assert_eq!(
            goals(&race.roulette.drain_events()),
            vec![GoalWinner::Multiple(vec!["A".into(), "A".into()])]
        );
        assert!(race.roulette.duplicates().is_empty());
    }

    #[test]
    fn test_crossed_marble_removed_after_delay() {
        let mut race = TestRace::new(&["A", "B"]);
        race.start(RaceConfig::default());
        let id = ids(&race)[0];
        race.cross(id);

        assert!(race.roulette.physics().has_body(id));
        race.advance(REMOVAL_DELAY_MS);
        assert!(!race.roulette.physics().has_body(id));
        assert_eq!(race.roulette.physics().removed, vec![id]);
    }

    #[test]
    fn test_stale_removal_after_reset_is_ignored() {
        let mut race = TestRace::new(&["A", "B"]);
        race.start(RaceConfig::default());
        let id = ids(&race)[0];
        race.cross(id);
        race.roulette.reset();

        race.advance(REMOVAL_DELAY_MS * 2.0);
        assert!(race.roulette.physics().removed.is_empty());
    }

    #[test]
    fn test_replay_rebuilds_roster_and_restarts() {
        let mut race = TestRace::new(&["A/1", "B/3*2", "bad*x"]);
        race.roulette.set_infinite_loop(true);
        race.roulette.set_loop_delay(2500);
        race.start(RaceConfig::default());
        assert_eq!(race.roulette.drain_events(), vec![RaceEvent::HideUi]);

        let before: Vec<_> = race.roulette.marbles().to_vec();
        let first = before[0].id;
        let first_name = race.name_of(first);
        race.cross(first);

        let events = race.roulette.drain_events();
        let countdown = events
            .iter()
            .find(|e| matches!(e, RaceEvent::StartCountdown { .. }))
            .cloned();
        assert_eq!(
            countdown,
            Some(RaceEvent::StartCountdown {
                seconds: 3,
                winners: vec![crate::events::RankedWinner {
                    name: first_name,
                    rank: 1,
                }],
                is_multiple_winners: false,
            })
        );
        assert_eq!(race.roulette.replay_state(), ReplayState::CountdownPending);

        race.advance(2500.0);
        assert_eq!(race.roulette.replay_state(), ReplayState::Running);
        assert!(race.roulette.is_running());
        assert!(race.roulette.winners().is_empty());
        assert_eq!(race.roulette.count(), 3);
        assert_eq!(race.roulette.total_marble_count(), 3);
        assert!(race.roulette.drain_events().contains(&RaceEvent::HideUi));

        let mut old: Vec<_> = before.iter().map(|m| (m.name.clone(), m.weight.to_bits())).collect();
        let mut new: Vec<_> = race
            .roulette
            .marbles()
            .iter()
            .map(|m| (m.name.clone(), m.weight.to_bits()))
            .collect();
        old.sort();
        new.sort();
        assert_eq!(old, new);
        assert!(race.roulette.marbles().iter().all(|m| m.id.0 >= 3));
    }

    #[test]
    fn test_stop_infinite_loop_cancels_replay() {
        let mut race = TestRace::new(&["A", "B"]);
        race.roulette.set_infinite_loop(true);
        race.start(RaceConfig::default());
        race.cross(ids(&race)[0]);
        race.roulette.drain_events();

        race.roulette.stop_infinite_loop();
        assert_eq!(
            race.roulette.drain_events(),
            vec![RaceEvent::HideCountdown, RaceEvent::ShowUi]
        );

        race.advance(10_000.0);
        assert_eq!(race.roulette.replay_state(), ReplayState::Idle);
        assert_eq!(race.roulette.phase(), RacePhase::Finished);
        assert_eq!(race.roulette.winners().len(), 1);
    }

    #[test]
    fn test_disabling_loop_cancels_pending_replay() {
        let mut race = TestRace::new(&["A", "B"]);
        race.roulette.set_infinite_loop(true);
        race.start(RaceConfig::default());
        race.cross(ids(&race)[0]);
        race.roulette.set_infinite_loop(false);

        race.advance(10_000.0);
        assert_eq!(race.roulette.phase(), RacePhase::Finished);
    }

    #[test]
    fn test_configuration_errors_leave_state() {
        let mut race = TestRace::new(&["A", "B"]);
        assert_eq!(
            race.roulette.set_speed(0.0),
            Err(RouletteError::InvalidSpeed(0.0))
        );
        assert!(race.roulette.set_speed(f64::NAN).is_err());
        assert_eq!(race.roulette.speed(), 1.0);

        assert!(matches!(
            race.roulette.set_map(9),
            Err(RouletteError::MapIndexOutOfRange { index: 9, .. })
        ));
        assert_eq!(race.roulette.count(), 2);
        assert_eq!(race.roulette.current_stage().map(|s| s.title.as_str()), Some("Pegboard"));
    }

    #[test]
    fn test_start_requires_marbles_and_stage() {
        let mut race = TestRace::new(&[]);
        assert_eq!(
            race.roulette.start(RaceConfig::default()),
            Err(RouletteError::EmptyRoster)
        );

        let mut bare = TestRace::without_stages(&["A"]);
        assert_eq!(
            bare.roulette.start(RaceConfig::default()),
            Err(RouletteError::NoStage)
        );
        assert!(bare.roulette.snapshot().is_none());
    }

    #[test]
    fn test_apply_options() {
        let mut race = TestRace::new(&["A", "B", "C"]);
        let options = RouletteOptions::from_json(
            r#"{ "winning_range": 2, "speed": 2.0, "map": 1, "infinite_loop": true, "loop_delay_ms": 3000 }"#,
        )
        .unwrap();
        race.roulette.apply_options(&options).unwrap();

        assert_eq!(race.roulette.speed(), 2.0);
        assert_eq!(race.roulette.config().winning_range, 2);
        assert_eq!(race.roulette.current_stage().map(|s| s.title.as_str()), Some("Zigzag"));
        assert_eq!(race.roulette.count(), 3);

        let bad = RouletteOptions {
            map: 7,
            ..RouletteOptions::default()
        };
        assert!(race.roulette.apply_options(&bad).is_err());
        assert_eq!(race.roulette.speed(), 2.0);
    }

    #[test]
    fn test_set_map_rebuilds_from_saved_names() {
        let mut race = TestRace::new(&["A*2", "B"]);
        race.roulette.set_map(1).unwrap();
        assert_eq!(race.roulette.count(), 3);
        assert_eq!(race.roulette.current_stage().map(|s| s.title.as_str()), Some("Zigzag"));
        assert_eq!(race.roulette.maps().len(), 2);
        assert_eq!(race.roulette.physics().stage_loads, 3);
    }

    #[test]
    fn test_recorder_arms_before_release() {
        let mut race = TestRace::new(&["A", "B"]);
        race.roulette.set_auto_recording(true);
        race.roulette.recorder_mut().arm_immediately = false;
        race.start(RaceConfig::default());

        assert_eq!(race.roulette.phase(), RacePhase::Arming);
        assert!(!race.roulette.physics().started);
        assert!(race.roulette.marbles().iter().all(|m| !m.is_active));

        race.roulette.recorder_mut().armed = true;
        race.advance(10.0);
        assert_eq!(race.roulette.phase(), RacePhase::Running);
        assert!(race.roulette.physics().started);
        assert!(race.roulette.marbles().iter().all(|m| m.is_active));

        race.cross(ids(&race)[0]);
        assert!(race.roulette.recorder().recording);
        race.advance(RECORDING_STOP_DELAY_MS);
        assert!(!race.roulette.recorder().recording);
    }

    #[test]
    fn test_roster_change_closes_finished_take() {
        let mut race = TestRace::new(&["A", "B"]);
        race.roulette.set_auto_recording(true);
        race.start(RaceConfig::default());
        race.cross(ids(&race)[0]);
        assert!(race.roulette.recorder().recording);

        race.roulette.set_marbles(&["A", "B"]);
        assert!(!race.roulette.recorder().recording);
        race.advance(5000.0);
        assert!(!race.roulette.recorder().recording);
        assert_eq!(race.roulette.recorder().stops, 1);
    }

    #[test]
    fn test_quick_replay_opens_fresh_take() {
        let mut race = TestRace::new(&["A", "B"]);
        race.roulette.set_auto_recording(true);
        race.roulette.set_infinite_loop(true);
        race.roulette.set_loop_delay(500);
        race.start(RaceConfig::default());
        race.cross(ids(&race)[0]);

        race.advance(500.0);
        assert_eq!(race.roulette.replay_state(), ReplayState::Running);
        assert_eq!(race.roulette.recorder().stops, 1);
        assert_eq!(race.roulette.recorder().takes, 2);

        // The replayed race keeps recording past the first race's stop deadline
        race.advance(RECORDING_STOP_DELAY_MS);
        assert!(race.roulette.recorder().recording);
        assert_eq!(race.roulette.recorder().stops, 1);
    }

    #[test]
    fn test_shake_availability_is_edge_triggered() {
        let mut race = TestRace::new(&["A", "B"]);
        race.start(RaceConfig::default());
        race.advance(SHAKE_THRESHOLD_MS + 500.0);

        let changes: Vec<_> = race
            .roulette
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, RaceEvent::ShakeAvailableChanged { .. }))
            .collect();
        assert_eq!(
            changes,
            vec![RaceEvent::ShakeAvailableChanged { available: true }]
        );

        race.advance(1000.0);
        assert!(race.roulette.drain_events().is_empty());

        let leader = ids(&race)[0];
        assert!(race.roulette.shake());
        assert_eq!(race.roulette.physics().impacts, vec![leader]);

        race.cross(leader);
        let events = race.roulette.drain_events();
        assert!(events.contains(&RaceEvent::ShakeAvailableChanged { available: false }));
        assert!(!race.roulette.shake());
    }

    #[test]
    fn test_catch_up_is_clamped() {
        let mut race = TestRace::new(&["A", "B"]);
        race.roulette.update(0.0);
        race.roulette.update(1000.0);
        assert!(race.roulette.physics().steps.is_empty());

        race.roulette.update(1025.0);
        assert_eq!(race.roulette.physics().steps.len(), 2);
    }

    #[test]
    fn test_speed_multiplies_steps() {
        let mut race = TestRace::new(&["A", "B"]);
        race.roulette.set_speed(3.0).unwrap();
        race.roulette.update(0.0);
        race.roulette.update(20.0);
        assert_eq!(race.roulette.physics().steps.len(), 6);
    }

    #[test]
    fn test_slow_motion_shrinks_physics_delta() {
        let mut race = TestRace::new(&["A", "B"]);
        race.start(RaceConfig::default());
        let zoom_y = race.roulette.current_stage().unwrap().zoom_y;
        let order = ids(&race);
        race.place(order[0], zoom_y - 1.0);
        race.place(order[1], zoom_y - 2.0);
        race.advance(20.0);

        let last = *race.roulette.physics().steps.last().unwrap();
        assert!(last < 0.01);
        assert!(race.roulette.time_scale() < 1.0);
        assert!(race.roulette.goal_distance() < crate::config::ZOOM_THRESHOLD);
    }

    #[test]
    fn test_listeners_and_snapshot() {
        let mut race = TestRace::new(&["Alice", "Bob", "Carol"]);
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        race.roulette.subscribe(EventKind::Goal, move |e| {
            if let RaceEvent::Goal { winner } = e {
                sink.borrow_mut().push(winner.display());
            }
        });
        race.start(RaceConfig::default());
        let id = ids(&race)[0];
        let name = race.name_of(id);
        race.cross(id);
        assert_eq!(*seen.borrow(), vec![name.clone()]);

        let mut recording = RecordingSink::default();
        race.roulette.render(&mut recording);
        let frame = &recording.frames[0];
        assert_eq!(frame.winner.as_deref(), Some(name.as_str()));
        assert_eq!(frame.marbles, 2);
        assert_eq!(frame.rows, 3);
        assert!(frame.highlighted.is_empty());
    }

    #[test]
    fn test_snapshot_highlights_target_marbles() {
        let mut race = TestRace::new(&["A", "B", "C", "D"]);
        race.start(RaceConfig {
            winner_rank: 2,
            ..RaceConfig::default()
        });
        let mut recording = RecordingSink::default();
        race.roulette.render(&mut recording);
        assert_eq!(recording.frames[0].highlighted, vec![ids(&race)[2]]);

        race.cross(ids(&race)[0]);
        race.roulette.render(&mut recording);
        assert_eq!(recording.frames[1].highlighted, vec![ids(&race)[1]]);

        let mut race = TestRace::new(&["A", "B", "C", "D"]);
        race.start(RaceConfig {
            winning_range: 3,
            ..RaceConfig::default()
        });
        race.roulette.render(&mut recording);
        assert_eq!(recording.frames[2].highlighted, ids(&race)[..3].to_vec());
    }
}
