//! Infinite replay scheduling.
//!
//! At most one replay timer is pending; scheduling a new one cancels the old.

use crate::config::{DEFAULT_LOOP_DELAY_MS, RaceConfig};
use crate::events::RankedWinner;
use crate::marble::Marble;
use crate::timer::{TimerId, TimerQueue};

/// Replay cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayState {
    #[default]
    Idle,
    /// Race ended, countdown shown, timer pending.
    CountdownPending,
    /// Timer fired, roster being rebuilt.
    Resetting,
    /// Replayed race in progress.
    Running,
}

/// Replay settings plus the pending timer.
#[derive(Debug, Clone)]
pub struct ReplayScheduler {
    enabled: bool,
    delay_ms: u64,
    pending: Option<TimerId>,
    state: ReplayState,
}

impl Default for ReplayScheduler {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: DEFAULT_LOOP_DELAY_MS,
            pending: None,
            state: ReplayState::Idle,
        }
    }
}

impl ReplayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn set_delay_ms(&mut self, delay_ms: u64) {
        self.delay_ms = delay_ms;
    }

    /// Whole seconds shown by the countdown.
    pub fn countdown_seconds(&self) -> u64 {
        self.delay_ms.div_ceil(1000)
    }

    /// Turns replay on or off; turning it off cancels a pending replay.
    pub fn set_enabled<A>(&mut self, enabled: bool, timers: &mut TimerQueue<A>) {
        self.enabled = enabled;
        if !enabled {
            self.cancel(timers);
        }
    }

    /// Schedules a replay, replacing any pending one.
    pub fn schedule<A>(&mut self, timers: &mut TimerQueue<A>, now_ms: f64, action: A) {
        if let Some(previous) = self.pending.take() {
            timers.cancel(previous);
        }
        #[allow(clippy::cast_precision_loss)]
        let delay = self.delay_ms as f64;
        self.pending = Some(timers.schedule(now_ms, delay, action));
        self.state = ReplayState::CountdownPending;
    }

    /// Cancels the pending replay. Returns true if one was pending.
    pub fn cancel<A>(&mut self, timers: &mut TimerQueue<A>) -> bool {
        let cancelled = self
            .pending
            .take()
            .is_some_and(|id| timers.cancel(id));
        self.state = ReplayState::Idle;
        cancelled
    }

    /// Marks the pending timer as fired.
    pub(crate) fn begin_reset(&mut self) {
        self.pending = None;
        self.state = ReplayState::Resetting;
    }

    pub(crate) fn mark_running(&mut self) {
        self.state = ReplayState::Running;
    }

    pub(crate) fn mark_idle(&mut self) {
        self.state = ReplayState::Idle;
    }
}

/// Winners listed in the countdown: every range winner, or the single winner
/// at its requested rank.
pub fn countdown_winners(
    config: &RaceConfig,
    winners: &[Marble],
    winner: Option<&Marble>,
) -> Vec<RankedWinner> {
    if config.is_range_mode() {
        winners
            .iter()
            .enumerate()
            .map(|(i, m)| RankedWinner {
                name: m.name.clone(),
                rank: i + 1,
            })
            .collect()
    } else {
        winner
            .map(|m| RankedWinner {
                name: m.name.clone(),
                rank: config.winner_rank + 1,
            })
            .into_iter()
            .collect()
    }
}
