//! Roster construction from raw name lines.
//!
//! The same procedure builds the initial roster and every replay, so replays
//! differ only in the random order assignment.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::name::parse_name;

/// Lowest normalized weight.
pub const MIN_WEIGHT: f32 = 0.1;

/// A parsed name with its normalized weight.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub name: String,
    /// Normalized into `[0.1, 1.1]`.
    pub weight: f32,
    pub count: usize,
}

/// One marble to create.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSlot {
    pub name: String,
    pub weight: f32,
    pub order_index: usize,
}

/// Parsed and normalized roster.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Roster {
    pub entries: Vec<RosterEntry>,
}

impl Roster {
    /// Parses raw lines, dropping malformed ones, and normalizes weights.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let parsed: Vec<_> = lines
            .iter()
            .filter_map(|line| {
                let parsed = parse_name(line.as_ref());
                if parsed.is_none() {
                    tracing::debug!(line = line.as_ref(), "[roster] Dropping malformed name");
                }
                parsed
            })
            .collect();

        let min = parsed.iter().map(|p| p.weight).fold(f64::INFINITY, f64::min);
        let max = parsed.iter().map(|p| p.weight).fold(f64::NEG_INFINITY, f64::max);
        // Halved so the spread of any two finite weights stays finite
        let gap = max / 2.0 - min / 2.0;

        let entries = parsed
            .into_iter()
            .map(|p| RosterEntry {
                weight: if gap > 0.0 {
                    #[allow(clippy::cast_possible_truncation)]
                    let unit = ((p.weight / 2.0 - min / 2.0) / gap).clamp(0.0, 1.0) as f32;
                    MIN_WEIGHT + unit
                } else {
                    MIN_WEIGHT
                },
                name: p.name,
                count: p.count,
            })
            .collect();
        Self { entries }
    }

    /// Total number of marbles.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Expands entries into marbles with a uniformly shuffled order slot each.
    pub fn assign_orders(&self, rng: &mut impl Rng) -> Vec<RosterSlot> {
        let mut orders: Vec<usize> = (0..self.total()).collect();
        orders.shuffle(rng);
        let mut orders = orders.into_iter();

        let mut slots = Vec::with_capacity(self.total());
        for entry in &self.entries {
            for order_index in orders.by_ref().take(entry.count) {
                slots.push(RosterSlot {
                    name: entry.name.clone(),
                    weight: entry.weight,
                    order_index,
                });
            }
        }
        slots
    }
}
