//! Marble Roulette Core Library
//!
//! Race orchestration for a weighted marble roulette: roster construction,
//! fixed-step physics on `Rapier2D`, winner rules, dramatic slow motion and
//! the infinite replay loop.
//!
//! Rendering, video capture and camera motion are collaborators behind
//! traits; a host drives everything by calling [`Roulette::frame`].

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod camera;
pub mod config;
pub mod effects;
pub mod error;
pub mod events;
pub mod marble;
pub mod name;
pub mod physics;
pub mod ranking;
pub mod recorder;
pub mod replay;
pub mod roster;
pub mod roulette;
pub mod snapshot;
pub mod stage;
pub mod timer;
pub mod timescale;

#[cfg(test)]
pub(crate) mod test_utils;

pub use camera::{CameraController, CameraInput, CameraView, FollowCamera};
pub use config::{RaceConfig, RouletteOptions};
pub use error::{RouletteError, StageError};
pub use events::{EventKind, GoalWinner, ListenerId, RaceEvent, RankedWinner};
pub use marble::{Color, MARBLE_RADIUS, Marble, MarbleId, Skill};
pub use name::{ParsedName, parse_name};
pub use physics::{Physics, RapierPhysics, default_gravity};
pub use ranking::{RankBoard, RankRow, RankRowKind};
pub use recorder::{NullRecorder, Recorder};
pub use replay::ReplayState;
pub use roster::Roster;
pub use roulette::{RacePhase, Roulette};
pub use snapshot::{NullSink, PresentationSink, RenderSnapshot};
pub use stage::{MapInfo, StageDef, builtin_stages};
