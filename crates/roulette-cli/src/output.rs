//! JSON-lines snapshot capture.
//!
//! `SnapshotRecorder` is the recorder handed to the orchestrator and
//! `SnapshotWriter` is the presentation sink. They share one `Capture`
//! state: frames are written only between `start` and `stop`, each tagged
//! with its take number.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use roulette_core::{MarbleId, PresentationSink, Recorder, RenderSnapshot};
use serde::Serialize;

#[derive(Debug, Default)]
struct Capture {
    recording: bool,
    take: u32,
    frame: u64,
}

#[derive(Serialize)]
struct Line<'a> {
    take: u32,
    frame: u64,
    highlighted: Vec<MarbleId>,
    #[serde(flatten)]
    snapshot: &'a RenderSnapshot<'a>,
}

/// Recorder that opens and closes takes in the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    capture: Rc<RefCell<Capture>>,
}

impl Recorder for SnapshotRecorder {
    fn start(&mut self) {
        let mut capture = self.capture.borrow_mut();
        capture.recording = true;
        capture.take += 1;
        capture.frame = 0;
        tracing::info!(take = capture.take, "[record] Take started");
    }

    fn is_armed(&self) -> bool {
        self.capture.borrow().recording
    }

    fn stop(&mut self) {
        let mut capture = self.capture.borrow_mut();
        if capture.recording {
            capture.recording = false;
            tracing::info!(take = capture.take, frames = capture.frame, "[record] Take stopped");
        }
    }
}

/// Sink writing one JSON object per recorded frame.
pub struct SnapshotWriter {
    capture: Rc<RefCell<Capture>>,
    out: Option<BufWriter<File>>,
}

impl SnapshotWriter {
    /// Creates the file and a recorder bound to it.
    pub fn create(path: &Path) -> io::Result<(Self, SnapshotRecorder)> {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let writer = Self {
            capture: Rc::clone(&capture),
            out: Some(BufWriter::new(File::create(path)?)),
        };
        Ok((writer, SnapshotRecorder { capture }))
    }

    /// A writer that never writes, paired with a recorder for the same state.
    pub fn disabled() -> (Self, SnapshotRecorder) {
        let capture = Rc::new(RefCell::new(Capture::default()));
        let writer = Self {
            capture: Rc::clone(&capture),
            out: None,
        };
        (writer, SnapshotRecorder { capture })
    }

    pub fn finish(mut self) -> io::Result<()> {
        match self.out.take() {
            Some(mut out) => out.flush(),
            None => Ok(()),
        }
    }

    fn write_line(out: &mut BufWriter<File>, line: &Line<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut *out, line)?;
        out.write_all(b"\n")
    }
}

impl PresentationSink for SnapshotWriter {
    fn render(&mut self, snapshot: &RenderSnapshot<'_>) {
        let Some(out) = self.out.as_mut() else {
            return;
        };
        let mut capture = self.capture.borrow_mut();
        if !capture.recording {
            return;
        }
        let line = Line {
            take: capture.take,
            frame: capture.frame,
            highlighted: snapshot.highlighted(),
            snapshot,
        };
        capture.frame += 1;
        if let Err(error) = Self::write_line(out, &line) {
            tracing::warn!(%error, "[record] Snapshot output disabled");
            self.out = None;
        }
    }
}
