//! Physics contract and its `Rapier2D` implementation.
//!
//! The orchestrator only talks to physics through [`Physics`]; it never
//! touches bodies directly.

use std::collections::HashMap;
use std::fmt;

use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::marble::{MARBLE_RADIUS, MarbleId};
use crate::stage::{EntityShape, StageDef};

/// Half thickness of wall segments.
const WALL_HALF_THICKNESS: f32 = 0.05;

/// Distance within which an impact pushes other marbles.
const IMPACT_RADIUS: f32 = 10.0;

/// Impulse applied at zero distance from an impact.
const IMPACT_POWER: f32 = 5.0;

/// Default gravity vector (downward, in m/s²).
pub fn default_gravity() -> Vector {
    Vector::new(0.0, 10.0)
}

/// Transform of a marble body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarbleState {
    pub position: [f32; 2],
    pub angle: f32,
}

/// Transform and shape of a stage entity, for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub position: [f32; 2],
    pub angle: f32,
    pub shape: EntityShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Narrow physics contract consumed by the orchestrator.
///
/// Removing an unknown marble and stepping with a non-positive delta are
/// no-ops.
pub trait Physics {
    /// Adds the stage's obstacles to the world.
    fn create_stage(&mut self, stage: &StageDef);
    /// Advances the world by `dt` seconds.
    fn step(&mut self, dt: f32);
    /// Current transforms of all stage entities.
    fn entities(&self) -> Vec<EntityState>;
    /// Adds a marble body, frozen until [`Physics::start`].
    fn create_marble(&mut self, id: MarbleId, position: [f32; 2], weight: f32);
    fn remove_marble(&mut self, id: MarbleId);
    fn marble_state(&self, id: MarbleId) -> Option<MarbleState>;
    fn clear_marbles(&mut self);
    /// Removes everything, stage included.
    fn clear(&mut self);
    /// Pushes marbles near `id` away from it.
    fn impact(&mut self, id: MarbleId);
    /// Releases all frozen marbles.
    fn start(&mut self);
}

/// Stage entity body with its render data.
#[derive(Debug, Clone)]
struct StageBody {
    handle: RigidBodyHandle,
    spin: f32,
    shape: EntityShape,
    color: Option<String>,
}

/// [`Physics`] backed by a `Rapier2D` world.
pub struct RapierPhysics {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    stage: Vec<StageBody>,
    marbles: HashMap<MarbleId, RigidBodyHandle>,
}

impl Default for RapierPhysics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RapierPhysics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapierPhysics")
            .field("bodies", &self.bodies.len())
            .field("stage_bodies", &self.stage.len())
            .field("marbles", &self.marbles.len())
            .field("gravity", &self.gravity)
            .finish_non_exhaustive()
    }
}

impl RapierPhysics {
    pub fn new() -> Self {
        Self::with_gravity(default_gravity())
    }

    fn with_gravity(gravity: Vector) -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity,
            stage: Vec::new(),
            marbles: HashMap::new(),
        }
    }

    /// Removes a body together with its colliders.
    fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn shape_colliders(shape: &EntityShape, restitution: f32) -> Vec<Collider> {
        match shape {
            EntityShape::Polyline { points } => points
                .windows(2)
                .map(|pair| {
                    let [start, end] = [pair[0], pair[1]];
                    let dx = end[0] - start[0];
                    let dy = end[1] - start[1];
                    let length = (dx * dx + dy * dy).sqrt();
                    ColliderBuilder::cuboid(length / 2.0, WALL_HALF_THICKNESS)
                        .translation(Vector::new(
                            f32::midpoint(start[0], end[0]),
                            f32::midpoint(start[1], end[1]),
                        ))
                        .rotation(dy.atan2(dx))
                        .restitution(restitution)
                        .build()
                })
                .collect(),
            EntityShape::Box { width, height } => vec![
                ColliderBuilder::cuboid(*width, *height)
                    .restitution(restitution)
                    .build(),
            ],
            EntityShape::Circle { radius } => vec![
                ColliderBuilder::ball(*radius)
                    .restitution(restitution)
                    .build(),
            ],
        }
    }
}

impl Physics for RapierPhysics {
    fn create_stage(&mut self, stage: &StageDef) {
        for entity in &stage.entities {
            let builder = if entity.spin == 0.0 {
                RigidBodyBuilder::fixed()
            } else {
                RigidBodyBuilder::kinematic_position_based()
            };
            let body = builder
                .translation(Vector::new(entity.position[0], entity.position[1]))
                .rotation(entity.angle)
                .build();
            let handle = self.bodies.insert(body);
            for collider in Self::shape_colliders(&entity.shape, entity.restitution) {
                self.colliders
                    .insert_with_parent(collider, handle, &mut self.bodies);
            }
            self.stage.push(StageBody {
                handle,
                spin: entity.spin,
                shape: entity.shape.clone(),
                color: entity.color.clone(),
            });
        }
        tracing::debug!(
            title = %stage.title,
            entities = self.stage.len(),
            "[physics] Stage created"
        );
    }

    fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        for stage_body in self.stage.iter().filter(|b| b.spin != 0.0) {
            if let Some(body) = self.bodies.get_mut(stage_body.handle) {
                let next = body.rotation().angle() + stage_body.spin * dt;
                body.set_next_kinematic_rotation(Rotation::from_angle(next));
            }
        }
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    fn entities(&self) -> Vec<EntityState> {
        self.stage
            .iter()
            .filter_map(|stage_body| {
                let body = self.bodies.get(stage_body.handle)?;
                let pos = body.translation();
                Some(EntityState {
                    position: [pos.x, pos.y],
                    angle: body.rotation().angle(),
                    shape: stage_body.shape.clone(),
                    color: stage_body.color.clone(),
                })
            })
            .collect()
    }

    fn create_marble(&mut self, id: MarbleId, position: [f32; 2], weight: f32) {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position[0], position[1]))
            .linear_damping(0.1)
            .angular_damping(0.1)
            .ccd_enabled(true)
            .enabled(false)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::ball(MARBLE_RADIUS)
            .restitution(0.2)
            .friction(0.2)
            .density(1.0 + weight)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        if let Some(previous) = self.marbles.insert(id, handle) {
            self.remove_body(previous);
        }
    }

    fn remove_marble(&mut self, id: MarbleId) {
        match self.marbles.remove(&id) {
            Some(handle) => self.remove_body(handle),
            None => tracing::trace!(marble = id.0, "[physics] Remove of absent marble ignored"),
        }
    }

    fn marble_state(&self, id: MarbleId) -> Option<MarbleState> {
        let body = self.bodies.get(*self.marbles.get(&id)?)?;
        let pos = body.translation();
        Some(MarbleState {
            position: [pos.x, pos.y],
            angle: body.rotation().angle(),
        })
    }

    fn clear_marbles(&mut self) {
        let handles: Vec<_> = self.marbles.drain().map(|(_, handle)| handle).collect();
        for handle in handles {
            self.remove_body(handle);
        }
    }

    fn clear(&mut self) {
        *self = Self::with_gravity(self.gravity);
    }

    fn impact(&mut self, id: MarbleId) {
        let Some(source) = self.marble_state(id) else {
            return;
        };
        let [sx, sy] = source.position;
        for (&other, &handle) in &self.marbles {
            if other == id {
                continue;
            }
            let Some(body) = self.bodies.get_mut(handle) else {
                continue;
            };
            let pos = body.translation();
            let (dx, dy) = (pos.x - sx, pos.y - sy);
            let dist = (dx * dx + dy * dy).sqrt();
            if dist >= IMPACT_RADIUS || dist <= f32::EPSILON {
                continue;
            }
            let power = 1.0 - dist / IMPACT_RADIUS;
            let scale = power * power * IMPACT_POWER / dist;
            body.apply_impulse(Vector::new(dx * scale, dy * scale), true);
        }
    }

    fn start(&mut self) {
        for handle in self.marbles.values() {
            if let Some(body) = self.bodies.get_mut(*handle) {
                body.set_enabled(true);
                body.wake_up(true);
            }
        }
    }
}
