//! Race lifecycle events and the publish/subscribe bus.
//!
//! Listeners run synchronously when an event is emitted. Every event is also
//! queued so a host can drain them once per frame instead of subscribing.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// Winner payload of a goal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GoalWinner {
    Single(String),
    /// Range mode winners in finishing order.
    Multiple(Vec<String>),
}

impl GoalWinner {
    /// Display form; range winners are joined with commas.
    pub fn display(&self) -> String {
        match self {
            Self::Single(name) => name.clone(),
            Self::Multiple(names) => names.join(", "),
        }
    }
}

/// A winner with its one-based rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedWinner {
    pub name: String,
    pub rank: usize,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    Goal { winner: GoalWinner },
    HideUi,
    ShowUi,
    StartCountdown {
        seconds: u64,
        winners: Vec<RankedWinner>,
        is_multiple_winners: bool,
    },
    HideCountdown,
    /// Fired only when availability changes.
    ShakeAvailableChanged { available: bool },
}

/// Discriminant used to subscribe to one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Goal,
    HideUi,
    ShowUi,
    StartCountdown,
    HideCountdown,
    ShakeAvailableChanged,
}

impl RaceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Goal { .. } => EventKind::Goal,
            Self::HideUi => EventKind::HideUi,
            Self::ShowUi => EventKind::ShowUi,
            Self::StartCountdown { .. } => EventKind::StartCountdown,
            Self::HideCountdown => EventKind::HideCountdown,
            Self::ShakeAvailableChanged { .. } => EventKind::ShakeAvailableChanged,
        }
    }
}

type Listener = Box<dyn FnMut(&RaceEvent)>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered listeners per event kind plus a pending queue.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    pending: VecDeque<RaceEvent>,
    next_id: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.values().map(Vec::len).sum::<usize>())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&RaceEvent) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Returns false if the listener was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn emit(&mut self, event: RaceEvent) {
        tracing::debug!(?event, "[events] Emit");
        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for (_, listener) in listeners.iter_mut() {
                listener(&event);
            }
        }
        self.pending.push_back(event);
    }

    /// Takes all events emitted since the last drain.
    pub fn drain(&mut self) -> Vec<RaceEvent> {
        self.pending.drain(..).collect()
    }
}
