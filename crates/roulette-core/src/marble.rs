//! Marble roster entities.
//!
//! The orchestrator owns these records; positions are mirrored from the
//! physics engine every step.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::physics::MarbleState;

/// Stable identifier for a marble. Never reused by one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarbleId(pub u32);

/// Marble radius in world units.
pub const MARBLE_RADIUS: f32 = 0.25;

/// Marbles per spawn row.
const SPAWN_COLUMNS: usize = 10;

/// Spacing between spawn slots.
const SPAWN_SPACING: f32 = 0.6;

/// Left edge of the spawn grid.
const SPAWN_LEFT: f32 = 10.25;

/// Squared movement below which a marble counts as stuck.
const STUCK_EPSILON_SQ: f32 = 0.000_01;

/// RGBA color representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);

    /// Converts an HSL triple (hue in degrees, saturation and lightness in
    /// `[0, 1]`) to an opaque color.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let hue = hue.rem_euclid(360.0);
        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let sector = hue / 60.0;
        let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r, g, b) = match sector as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = lightness - chroma / 2.0;
        let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::rgb(to_byte(r), to_byte(g), to_byte(b))
    }
}

/// Special ability triggered for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Skill {
    #[default]
    None,
    /// Pushes nearby marbles away.
    Impact,
}

/// One racer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marble {
    pub id: MarbleId,
    pub name: String,
    /// Normalized weight in `[0.1, 1.1]`.
    pub weight: f32,
    /// Unique slot in `[0, total)` used for placement and hue.
    pub order_index: usize,
    pub color: Color,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub is_active: bool,
    pub skill: Skill,
    /// Milliseconds since the marble last moved.
    pub stuck_ms: f64,
    cool_time_ms: f64,
    max_cool_time_ms: f64,
    skill_rate: f32,
}

impl Marble {
    /// Creates an inactive marble at its spawn slot.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        id: MarbleId,
        name: String,
        weight: f32,
        order_index: usize,
        total: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let [x, y] = spawn_position(order_index, total);
        let hue = 360.0 / total.max(1) as f32 * order_index as f32;
        let max_cool_time_ms = 1000.0 + f64::from(1.0 - weight).max(0.0) * 4000.0;
        Self {
            id,
            name,
            weight,
            order_index,
            color: Color::from_hsl(hue, 1.0, 0.7),
            x,
            y,
            angle: 0.0,
            is_active: false,
            skill: Skill::None,
            stuck_ms: 0.0,
            cool_time_ms: max_cool_time_ms * rng.random::<f64>(),
            max_cool_time_ms,
            skill_rate: 0.2 * weight,
        }
    }

    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Mirrors the physics state and rolls the skill for this step.
    pub fn update(
        &mut self,
        delta_ms: f64,
        state: Option<MarbleState>,
        use_skills: bool,
        rng: &mut impl Rng,
    ) {
        if let Some(state) = state {
            let dx = state.position[0] - self.x;
            let dy = state.position[1] - self.y;
            if self.is_active && dx * dx + dy * dy < STUCK_EPSILON_SQ {
                self.stuck_ms += delta_ms;
            } else {
                self.stuck_ms = 0.0;
            }
            self.x = state.position[0];
            self.y = state.position[1];
            self.angle = state.angle;
        }

        self.skill = Skill::None;
        if !self.is_active || !use_skills {
            return;
        }
        self.cool_time_ms -= delta_ms;
        if self.cool_time_ms <= 0.0 {
            if rng.random::<f32>() < self.skill_rate {
                self.skill = Skill::Impact;
            }
            self.cool_time_ms = self.max_cool_time_ms;
        }
    }
}

/// Spawn slot for `order` in a roster of `total` marbles.
///
/// Slots fill rows of ten; large rosters stack rows upward so the lowest row
/// stays at the same height.
#[allow(clippy::cast_precision_loss)]
pub fn spawn_position(order: usize, total: usize) -> [f32; 2] {
    let max_line = total.div_ceil(SPAWN_COLUMNS) as f32;
    let line = (order / SPAWN_COLUMNS) as f32;
    let line_delta = -(max_line - 5.0).max(0.0);
    let column = (order % SPAWN_COLUMNS) as f32;
    [
        SPAWN_LEFT + column * SPAWN_SPACING,
        max_line - line + line_delta,
    ]
}
