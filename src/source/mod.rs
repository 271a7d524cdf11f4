//! Frame sources
//!
//! A source owns its capture device for the whole session. `current_frame`
//! is cheap and non-blocking: it hands out the most recent frame, or a
//! transient [`FrameUnavailable`] while the stream warms up.

use crate::error::{FrameUnavailable, SourceError};
use crate::models::Frame;
use crate::tools::{dataset_iter, load_frame};
use std::path::Path;

#[cfg(feature = "v4l")]
pub mod camera;

#[cfg(feature = "v4l")]
pub use camera::CameraSource;

/// Stream properties reported once the source has started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Frame width, 0 if not known yet
    pub width: u32,
    /// Frame height, 0 if not known yet
    pub height: u32,
}

/// Live (or replayed) frame provider
pub trait FrameSource: Send {
    /// Acquire the device and begin streaming
    fn start(&mut self) -> Result<StreamInfo, SourceError>;

    /// Most recent frame
    fn current_frame(&mut self) -> Result<Frame, FrameUnavailable>;

    /// Resume delivery after [`FrameSource::pause`]
    fn play(&mut self);

    /// Stop delivering frames but keep the device
    fn pause(&mut self);

    /// Release the device; calling it again is a no-op
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Idle,
    Playing,
    Paused,
    Stopped,
}

/// Replays a fixed set of frames in a loop
///
/// Stands in for a camera in tests and in the CLI (a directory of captured
/// images). It can simulate a stream whose dimensions arrive late.
#[derive(Debug)]
pub struct ReplaySource {
    frames: Vec<Frame>,
    cursor: usize,
    seq: u64,
    warmup_polls: usize,
    state: Playback,
    stop_calls: usize,
}

impl ReplaySource {
    /// Replay the given frames
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: 0,
            seq: 0,
            warmup_polls: 0,
            state: Playback::Idle,
            stop_calls: 0,
        }
    }

    /// Replay every loadable image under `dir` (sorted, recursive)
    ///
    /// Unreadable files are skipped with a warning.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let frames = dataset_iter(dir.as_ref(), None, false)
            .enumerate()
            .filter_map(|(i, path)| match load_frame(&path, i as u64) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable image");
                    None
                }
            })
            .collect();
        Self::new(frames)
    }

    /// Report `NotReady` for the first `polls` frame requests
    pub fn with_warmup(mut self, polls: usize) -> Self {
        self.warmup_polls = polls;
        self
    }

    /// How many times `stop` has been called
    pub fn stop_calls(&self) -> usize {
        self.stop_calls
    }

    /// Number of frames in the loop
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when there is nothing to replay
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ReplaySource {
    fn start(&mut self) -> Result<StreamInfo, SourceError> {
        if self.state == Playback::Stopped {
            return Err(SourceError::Unsupported("source already released".into()));
        }
        let Some(first) = self.frames.first() else {
            return Err(SourceError::NoDevice("no frames to replay".into()));
        };
        let info = StreamInfo {
            width: first.width(),
            height: first.height(),
        };
        self.state = Playback::Playing;
        Ok(info)
    }

    fn current_frame(&mut self) -> Result<Frame, FrameUnavailable> {
        match self.state {
            Playback::Playing => {}
            Playback::Idle => return Err(FrameUnavailable::NotReady),
            Playback::Paused | Playback::Stopped => return Err(FrameUnavailable::Stopped),
        }
        if self.warmup_polls > 0 {
            self.warmup_polls -= 1;
            return Err(FrameUnavailable::NotReady);
        }
        if self.frames.is_empty() {
            return Err(FrameUnavailable::NotReady);
        }

        let mut frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        if frame.is_empty() {
            return Err(FrameUnavailable::NotReady);
        }
        self.seq += 1;
        frame.seq = self.seq;
        frame.captured_at = tokio::time::Instant::now();
        Ok(frame)
    }

    fn play(&mut self) {
        if self.state == Playback::Paused {
            self.state = Playback::Playing;
        }
    }

    fn pause(&mut self) {
        if self.state == Playback::Playing {
            self.state = Playback::Paused;
        }
    }

    fn stop(&mut self) {
        self.stop_calls += 1;
        if self.state != Playback::Stopped {
            self.state = Playback::Stopped;
            self.frames.clear();
        }
    }
}

/// A source that can never start; used to exercise fatal-error handling
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    error: SourceError,
}

impl UnavailableSource {
    /// Source whose `start` always fails with `error`
    pub fn new(error: SourceError) -> Self {
        Self { error }
    }
}

impl FrameSource for UnavailableSource {
    fn start(&mut self) -> Result<StreamInfo, SourceError> {
        Err(self.error.clone())
    }

    fn current_frame(&mut self) -> Result<Frame, FrameUnavailable> {
        Err(FrameUnavailable::Stopped)
    }

    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn stop(&mut self) {}
}
