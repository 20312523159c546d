//! Race configuration, user options and tuning constants.

use serde::{Deserialize, Serialize};

/// Fixed simulation step in milliseconds.
pub const UPDATE_INTERVAL_MS: f64 = 10.0;

/// Accumulated time above this is wrapped instead of replayed.
pub const MAX_ELAPSED_MS: f64 = 100.0;

/// Proximity to the stage's zoom point that triggers slow motion and zoom.
pub const ZOOM_THRESHOLD: f32 = 5.0;

/// Lowest time-scale factor reached at the zoom point.
pub const MIN_TIME_SCALE: f32 = 0.2;

/// Delay before a finished marble's body is removed from physics.
pub const REMOVAL_DELAY_MS: f64 = 500.0;

/// Delay between race end and stopping the recorder.
pub const RECORDING_STOP_DELAY_MS: f64 = 1000.0;

/// How long the leader must be stuck before shaking is offered.
pub const SHAKE_THRESHOLD_MS: f64 = 3000.0;

/// Default replay delay in milliseconds.
pub const DEFAULT_LOOP_DELAY_MS: u64 = 5000;

/// Ranking rules for a single race, passed explicitly into `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Zero-based rank of the single winner.
    pub winner_rank: usize,
    /// Number of winners; values above one enable range mode.
    pub winning_range: usize,
    /// In range mode, count each name at most once.
    pub prevent_duplicate_winners: bool,
    /// Let marbles roll the impact skill.
    pub use_skills: bool,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            winner_rank: 0,
            winning_range: 1,
            prevent_duplicate_winners: false,
            use_skills: false,
        }
    }
}

impl RaceConfig {
    /// Returns true when the first `winning_range` finishers all win.
    pub fn is_range_mode(&self) -> bool {
        self.winning_range > 1
    }

    /// Clamps the rank below `total` and forces a range of at least one.
    pub(crate) fn clamped(mut self, total: usize) -> Self {
        if self.winner_rank >= total {
            self.winner_rank = total.saturating_sub(1);
        }
        self.winning_range = self.winning_range.max(1);
        self
    }
}

/// User-facing options, loadable from JSON.
///
/// Every field has a default so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouletteOptions {
    pub use_skills: bool,
    pub winning_rank: usize,
    pub auto_recording: bool,
    pub winning_range: usize,
    pub infinite_loop: bool,
    pub loop_delay_ms: u64,
    pub prevent_duplicate_winners: bool,
    pub speed: f64,
    pub map: usize,
    /// Seed for roster shuffles and skill rolls. `None` picks one from the OS.
    pub seed: Option<u64>,
}

impl Default for RouletteOptions {
    fn default() -> Self {
        Self {
            use_skills: false,
            winning_rank: 0,
            auto_recording: true,
            winning_range: 1,
            infinite_loop: false,
            loop_delay_ms: DEFAULT_LOOP_DELAY_MS,
            prevent_duplicate_winners: false,
            speed: 1.0,
            map: 0,
            seed: None,
        }
    }
}

impl RouletteOptions {
    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Extracts the per-race ranking rules.
    pub fn race_config(&self) -> RaceConfig {
        RaceConfig {
            winner_rank: self.winning_rank,
            winning_range: self.winning_range,
            prevent_duplicate_winners: self.prevent_duplicate_winners,
            use_skills: self.use_skills,
        }
    }
}
