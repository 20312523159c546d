//! Deferred one-shot timers on the host clock.
//!
//! The queue never fires by itself; the orchestrator polls it with the
//! current frame time and handles due actions between simulation steps.

/// Handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<A> {
    id: TimerId,
    deadline_ms: f64,
    action: A,
}

/// Pending timers ordered by deadline on demand.
#[derive(Debug, Clone)]
pub struct TimerQueue<A> {
    timers: Vec<Timer<A>>,
    next_id: u64,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 0,
        }
    }
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now_ms: f64, delay_ms: f64, action: A) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            deadline_ms: now_ms + delay_ms.max(0.0),
            action,
        });
        id
    }

    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Removes and returns due actions, earliest deadline first.
    ///
    /// Ties keep scheduling order.
    pub fn take_due(&mut self, now_ms: f64) -> Vec<A> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].deadline_ms <= now_ms {
                due.push(self.timers.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| {
            a.deadline_ms
                .total_cmp(&b.deadline_ms)
                .then(a.id.0.cmp(&b.id.0))
        });
        due.into_iter().map(|t| t.action).collect()
    }
}
