//! Transient visual effects advanced by the tick loop.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::marble::Color;

/// Lifetime of an impact ring.
const SKILL_EFFECT_MS: f64 = 500.0;

/// Lifetime of a celebration particle.
const PARTICLE_LIFETIME_MS: f64 = 3000.0;

/// Particles spawned per burst.
const PARTICLES_PER_BURST: usize = 200;

/// Downward acceleration of particles, in screen heights per second².
const PARTICLE_GRAVITY: f32 = 0.6;

/// Expanding ring drawn where a marble used its impact skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEffect {
    pub position: [f32; 2],
    pub elapsed_ms: f64,
}

impl SkillEffect {
    pub fn new(position: [f32; 2]) -> Self {
        Self {
            position,
            elapsed_ms: 0.0,
        }
    }

    pub fn update(&mut self, delta_ms: f64) {
        self.elapsed_ms += delta_ms;
    }

    /// Progress in `[0, 1]`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn progress(&self) -> f32 {
        (self.elapsed_ms / SKILL_EFFECT_MS).min(1.0) as f32
    }

    pub fn is_destroyed(&self) -> bool {
        self.elapsed_ms >= SKILL_EFFECT_MS
    }
}

/// One confetti particle in normalized screen space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub color: Color,
    pub elapsed_ms: f64,
}

impl Particle {
    /// Opacity fading out over the lifetime.
    #[allow(clippy::cast_possible_truncation)]
    pub fn alpha(&self) -> f32 {
        (1.0 - self.elapsed_ms / PARTICLE_LIFETIME_MS).clamp(0.0, 1.0) as f32
    }
}

/// Celebration particles fired when a race ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticleManager {
    particles: Vec<Particle>,
}

impl ParticleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires a burst from the bottom center of the screen.
    pub fn shot(&mut self, rng: &mut impl Rng) {
        for _ in 0..PARTICLES_PER_BURST {
            let angle = rng.random_range(-2.6_f32..-0.54);
            let speed = rng.random_range(0.4_f32..1.2);
            self.particles.push(Particle {
                position: [0.5, 1.0],
                velocity: [angle.cos() * speed, angle.sin() * speed],
                color: Color::from_hsl(rng.random_range(0.0..360.0), 1.0, 0.6),
                elapsed_ms: 0.0,
            });
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, delta_ms: f64) {
        let dt = (delta_ms / 1000.0) as f32;
        for p in &mut self.particles {
            p.velocity[1] += PARTICLE_GRAVITY * dt;
            p.position[0] += p.velocity[0] * dt;
            p.position[1] += p.velocity[1] * dt;
            p.elapsed_ms += delta_ms;
        }
        self.particles.retain(|p| p.elapsed_ms < PARTICLE_LIFETIME_MS);
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
