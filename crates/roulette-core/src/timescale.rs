//! Dramatic slow motion near the zoom point.
//!
//! Camera zoom and time scale share one distance metric but are computed
//! independently: the camera gets `goal_distance < ZOOM_THRESHOLD`, physics
//! gets the factor from [`time_scale`].

use crate::config::{MIN_TIME_SCALE, RaceConfig, ZOOM_THRESHOLD};
use crate::marble::Marble;

/// Index of the marble that decides the race next, in current order.
///
/// Marbles that already finished are no longer in `marbles`, so the index
/// shrinks as winners accumulate.
pub fn contested_index(config: &RaceConfig, winners: usize) -> Option<usize> {
    if config.is_range_mode() {
        config.winning_range.checked_sub(winners + 1)
    } else {
        config.winner_rank.checked_sub(winners)
    }
}

/// Distance between the contested marble and the zoom point.
///
/// Without a contested marble this is measured from the origin.
pub fn goal_distance(marbles: &[Marble], zoom_y: f32, config: &RaceConfig, winners: usize) -> f32 {
    let y = contested_index(config, winners)
        .and_then(|i| marbles.get(i))
        .map_or(0.0, |m| m.y);
    (zoom_y - y).abs()
}

/// Marble index the camera should follow.
///
/// The camera tracks the leader until the first finisher in single-rank
/// mode, and always in range mode.
pub fn camera_target_index(config: &RaceConfig, winners: usize) -> usize {
    if config.is_range_mode() || winners == 0 {
        0
    } else {
        config.winner_rank.saturating_sub(winners)
    }
}

/// Slow-motion factor in `[MIN_TIME_SCALE, 1.0]`.
///
/// Slows down only while the contested marble is inside the zoom threshold
/// and has a neighbor to fight with.
pub fn time_scale(
    marbles: &[Marble],
    zoom_y: f32,
    config: &RaceConfig,
    winners: usize,
    goal_dist: f32,
) -> f32 {
    if goal_dist >= ZOOM_THRESHOLD {
        return 1.0;
    }
    let approach_line = zoom_y - ZOOM_THRESHOLD * 1.2;

    if config.is_range_mode() {
        let index = config.winning_range - 1;
        let Some(target) = marbles.get(index) else {
            return 1.0;
        };
        let has_rival = index > 0 && marbles.get(index - 1).is_some();
        if target.y > approach_line && has_rival {
            return scale_for((zoom_y - target.y).abs());
        }
    } else if winners < config.winner_rank + 1 {
        let index = config.winner_rank - winners;
        let Some(target) = marbles.get(index) else {
            return 1.0;
        };
        let has_rival = (index > 0 && marbles.get(index - 1).is_some())
            || marbles.get(index + 1).is_some();
        if target.y > approach_line && has_rival {
            return scale_for(goal_dist);
        }
    }
    1.0
}

fn scale_for(distance: f32) -> f32 {
    (distance / ZOOM_THRESHOLD).clamp(MIN_TIME_SCALE, 1.0)
}
