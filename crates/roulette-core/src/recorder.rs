//! Recording collaborator contract.
//!
//! Arming may take several frames. The orchestrator releases marbles only
//! once the recorder reports armed so the opening frames are captured.

/// Video capture contract.
pub trait Recorder {
    /// Begins arming. Calling it while armed restarts the recording.
    fn start(&mut self);
    fn is_armed(&self) -> bool;
    /// Stops recording. A no-op when not recording.
    fn stop(&mut self);
}

/// Recorder that is always armed and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn start(&mut self) {}

    fn is_armed(&self) -> bool {
        true
    }

    fn stop(&mut self) {}
}
