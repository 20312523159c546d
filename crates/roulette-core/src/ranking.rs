//! Live rank list: row model and the scrolling board state.

use serde::{Deserialize, Serialize};

use crate::marble::{Color, Marble};

/// Height of one rank row in UI pixels.
pub const ROW_HEIGHT: f32 = 16.0;

/// How long a manual scroll suspends auto-follow.
const USER_SCROLL_HOLD_MS: f64 = 2000.0;

/// Easing time constant of the scroll position.
const SCROLL_EASE_MS: f64 = 250.0;

/// Stateful overlay advanced every fixed step.
pub trait UiObject {
    fn update(&mut self, delta_ms: f64);
}

/// Marker shown in front of a finished marble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinnerMarker {
    /// Range mode winner.
    Star,
    /// The marble at the requested rank.
    Target,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankRowKind {
    Winner(WinnerMarker),
    /// Suppressed repeat of a name that already won.
    Duplicate,
    Racing,
}

/// One row of the rank list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRow {
    pub name: String,
    pub color: Color,
    /// One-based rank; duplicates have none.
    pub rank: Option<usize>,
    pub kind: RankRowKind,
}

/// Builds the rank list: winners, then duplicates, then marbles still racing.
pub fn rank_rows(
    winners: &[Marble],
    duplicates: &[Marble],
    marbles: &[Marble],
    winner_rank: usize,
    winning_range: usize,
) -> Vec<RankRow> {
    let finished = winners.iter().enumerate().map(|(i, m)| {
        let marker = if winning_range > 1 {
            WinnerMarker::Star
        } else if i == winner_rank {
            WinnerMarker::Target
        } else {
            WinnerMarker::Finished
        };
        RankRow {
            name: m.name.clone(),
            color: m.color,
            rank: Some(i + 1),
            kind: RankRowKind::Winner(marker),
        }
    });
    let suppressed = duplicates.iter().map(|m| RankRow {
        name: m.name.clone(),
        color: m.color,
        rank: None,
        kind: RankRowKind::Duplicate,
    });
    let racing = marbles.iter().enumerate().map(|(i, m)| RankRow {
        name: m.name.clone(),
        color: m.color,
        rank: Some(winners.len() + i + 1),
        kind: RankRowKind::Racing,
    });
    finished.chain(suppressed).chain(racing).collect()
}

/// Scroll state of the rank list.
///
/// Follows the newest finisher unless the user scrolled recently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankBoard {
    current_y: f32,
    target_y: f32,
    max_y: f32,
    user_moved_ms: f64,
    current_winner: Option<usize>,
}

impl RankBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the list size observed this frame.
    #[allow(clippy::cast_precision_loss)]
    pub fn observe(&mut self, winners: usize, total_rows: usize) {
        self.current_winner = Some(winners);
        self.max_y = (total_rows as f32 * ROW_HEIGHT + ROW_HEIGHT).max(0.0);
    }

    pub fn on_wheel(&mut self, delta_y: f32) {
        self.target_y = (self.target_y + delta_y).min(self.max_y);
        self.user_moved_ms = USER_SCROLL_HOLD_MS;
    }

    pub fn scroll(&self) -> f32 {
        self.current_y
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl UiObject for RankBoard {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn update(&mut self, delta_ms: f64) {
        let Some(winner) = self.current_winner else {
            return;
        };
        if self.user_moved_ms > 0.0 {
            self.user_moved_ms -= delta_ms;
        } else {
            self.target_y = winner as f32 * ROW_HEIGHT + ROW_HEIGHT;
        }
        let ease = (delta_ms / SCROLL_EASE_MS).min(1.0) as f32;
        self.current_y += (self.target_y - self.current_y) * ease;
        if (self.current_y - self.target_y).abs() < 1.0 {
            self.current_y = self.target_y;
        }
    }
}
