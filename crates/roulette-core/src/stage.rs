//! Stage (obstacle course) definitions.
//!
//! Stages are JSON documents embedded at compile time. World units are
//! meters with `y` growing downward, so marbles race toward larger `y`.

use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Collision shape of a stage entity, relative to the entity position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityShape {
    /// Connected wall segments.
    Polyline { points: Vec<[f32; 2]> },
    /// Box given by half extents.
    Box { width: f32, height: f32 },
    Circle { radius: f32 },
}

/// One static or spinning obstacle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntity {
    pub position: [f32; 2],
    /// Initial rotation in radians.
    #[serde(default)]
    pub angle: f32,
    /// Constant angular velocity in radians per second. Zero means static.
    #[serde(default)]
    pub spin: f32,
    pub shape: EntityShape,
    #[serde(default = "default_restitution")]
    pub restitution: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_restitution() -> f32 {
    0.3
}

/// A complete obstacle course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
    pub title: String,
    /// Marbles below this line have finished.
    pub goal_y: f32,
    /// Point where the camera zooms and slow motion peaks.
    pub zoom_y: f32,
    pub entities: Vec<StageEntity>,
}

impl StageDef {
    /// Parses and validates a stage from JSON.
    pub fn from_json(json: &str) -> Result<Self, StageError> {
        let stage: StageDef = serde_json::from_str(json)?;
        if stage.goal_y < stage.zoom_y {
            return Err(StageError::GoalAboveZoom {
                title: stage.title,
                goal_y: stage.goal_y,
                zoom_y: stage.zoom_y,
            });
        }
        Ok(stage)
    }

    /// Serializes the stage to pretty JSON.
    pub fn to_json(&self) -> Result<String, StageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Index and title of a selectable stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub index: usize,
    pub title: String,
}

const BUILTIN_STAGES: [&str; 2] = [
    include_str!("../maps/pegboard.json"),
    include_str!("../maps/zigzag.json"),
];

/// Loads the stages shipped with the crate.
pub fn builtin_stages() -> Vec<StageDef> {
    BUILTIN_STAGES
        .iter()
        .map(|json| StageDef::from_json(json).expect("Failed to parse builtin stage JSON"))
        .collect()
}
