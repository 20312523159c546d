//! Error types for roulette commands.

/// Errors returned by direct command misuse.
///
/// A failed command never mutates the orchestrator.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RouletteError {
    #[error("Speed multiplier must be larger than 0, got {0}")]
    InvalidSpeed(f64),
    #[error("Incorrect map number {index} (available: 0..{available})")]
    MapIndexOutOfRange { index: usize, available: usize },
    #[error("No map has been selected")]
    NoStage,
    #[error("Cannot start a race without marbles")]
    EmptyRoster,
}

/// Errors raised while loading stage definitions.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Invalid stage JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Stage '{title}' has goal line {goal_y} above its zoom point {zoom_y}")]
    GoalAboveZoom { title: String, goal_y: f32, zoom_y: f32 },
}
