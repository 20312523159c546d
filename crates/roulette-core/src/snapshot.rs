//! Per-frame render snapshot handed to the presentation sink.

use serde::Serialize;

use crate::camera::CameraView;
use crate::effects::{Particle, SkillEffect};
use crate::marble::{Marble, MarbleId};
use crate::physics::EntityState;
use crate::ranking::{RankRow, rank_rows};
use crate::stage::StageDef;

/// Everything a renderer needs for one frame, borrowed from the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct RenderSnapshot<'a> {
    pub camera: CameraView,
    pub stage: &'a StageDef,
    pub entities: Vec<EntityState>,
    /// Marbles still racing, leader first.
    pub marbles: &'a [Marble],
    pub winners: &'a [Marble],
    pub duplicates: &'a [Marble],
    pub effects: &'a [SkillEffect],
    pub particles: &'a [Particle],
    pub rank_scroll: f32,
    pub winner_rank: usize,
    pub winning_range: usize,
    /// Representative winner once the race has ended.
    pub winner: Option<&'a Marble>,
}

impl RenderSnapshot<'_> {
    /// Marbles the renderer should highlight: the top `winning_range` in
    /// range mode, otherwise the marble currently holding the target rank.
    pub fn highlighted(&self) -> Vec<MarbleId> {
        if self.winning_range > 1 {
            self.marbles
                .iter()
                .take(self.winning_range)
                .map(|m| m.id)
                .collect()
        } else {
            self.winner_rank
                .checked_sub(self.winners.len())
                .and_then(|index| self.marbles.get(index))
                .map(|m| m.id)
                .into_iter()
                .collect()
        }
    }

    pub fn rank_rows(&self) -> Vec<RankRow> {
        rank_rows(
            self.winners,
            self.duplicates,
            self.marbles,
            self.winner_rank,
            self.winning_range,
        )
    }
}

/// Consumer of render snapshots.
pub trait PresentationSink {
    fn render(&mut self, snapshot: &RenderSnapshot<'_>);
}

/// Sink that discards every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn render(&mut self, _snapshot: &RenderSnapshot<'_>) {}
}
