//! Camera contract and the default follow camera.

use serde::{Deserialize, Serialize};

use crate::marble::Marble;
use crate::stage::StageDef;

/// Zoom level used while the race is contested near the zoom point.
const CONTESTED_ZOOM: f32 = 4.0;

/// Per-frame camera intent computed by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct CameraInput<'a> {
    /// Marbles ordered by progress, leader first.
    pub marbles: &'a [Marble],
    pub stage: &'a StageDef,
    pub need_to_zoom: bool,
    pub target_index: usize,
}

/// Camera transform handed to the presentation sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    pub center: [f32; 2],
    pub zoom: f32,
}

/// Camera collaborator contract.
pub trait CameraController {
    fn update(&mut self, input: CameraInput<'_>);
    /// Moves the camera, optionally animating toward the position.
    fn set_position(&mut self, position: [f32; 2], animate: bool);
    /// While locked, [`CameraController::update`] keeps the current target.
    fn lock(&mut self, locked: bool);
    fn zoom(&self) -> f32;
    fn view(&self) -> CameraView;
}

/// Follows the target marble with exponential smoothing.
#[derive(Debug, Clone)]
pub struct FollowCamera {
    center: [f32; 2],
    target_center: [f32; 2],
    zoom: f32,
    target_zoom: f32,
    locked: bool,
    /// Fraction of the remaining distance covered per frame.
    pub smoothing: f32,
}

impl Default for FollowCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FollowCamera {
    pub fn new() -> Self {
        Self {
            center: [0.0, 0.0],
            target_center: [0.0, 0.0],
            zoom: 1.0,
            target_zoom: 1.0,
            locked: false,
            smoothing: 0.1,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn approach(&mut self) {
        let s = self.smoothing;
        self.center[0] += (self.target_center[0] - self.center[0]) * s;
        self.center[1] += (self.target_center[1] - self.center[1]) * s;
        self.zoom += (self.target_zoom - self.zoom) * s;
    }
}

impl CameraController for FollowCamera {
    fn update(&mut self, input: CameraInput<'_>) {
        if !self.locked {
            let target = input
                .marbles
                .get(input.target_index)
                .or_else(|| input.marbles.first());
            if let Some(marble) = target {
                self.target_center = marble.position();
            }
            self.target_zoom = if input.need_to_zoom { CONTESTED_ZOOM } else { 1.0 };
        }
        self.approach();
    }

    fn set_position(&mut self, position: [f32; 2], animate: bool) {
        self.target_center = position;
        if !animate {
            self.center = position;
        }
    }

    fn lock(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn zoom(&self) -> f32 {
        self.zoom
    }

    fn view(&self) -> CameraView {
        CameraView {
            center: self.center,
            zoom: self.zoom,
        }
    }
}
