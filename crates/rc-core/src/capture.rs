//! Live capture loop: frame source → classifier → ledger.
//!
//! A session moves `Idle → Capturing` when [`CaptureSession::run`] opens the
//! device, and back to `Idle` when the stop flag is raised, the source runs
//! out of frames, the frame limit is hit, or a frame/classifier failure
//! occurs. Failures end the session immediately; nothing is retried.
//!
//! The frame source is owned by `run`, so the device is released on every
//! exit path, including errors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::classify::{ClassifyError, Classifier};
use crate::ledger::{DetectionEvent, DetectionLedger};

/// A single 3-channel RGB frame.
pub type Frame = image::RgbImage;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// File extensions accepted as frames.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Capture errors.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device could not be opened; the session never started.
    #[error("capture unavailable for {device}: {source}")]
    CaptureUnavailable {
        device: String,
        #[source]
        source: BoxError,
    },
    /// A frame could not be read mid-session.
    #[error("frame read failure at frame {frame}: {source}")]
    FrameReadFailure {
        frame: u64,
        #[source]
        source: BoxError,
    },
    /// The classifier failed on a frame.
    #[error(transparent)]
    Classifier(#[from] ClassifyError),
}

/// Produces frames until exhausted.
pub trait FrameSource {
    /// Reads the next frame; `Ok(None)` when the source has no more frames.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Something that can be opened into a [`FrameSource`].
pub trait CaptureDevice {
    type Source: FrameSource;

    /// Human-readable device name for logs and errors.
    fn name(&self) -> String;

    fn open(&self) -> Result<Self::Source, CaptureError>;
}

/// Receives every credited detection with the frame that produced it.
pub trait DetectionSink {
    fn on_detection(&mut self, event: &DetectionEvent, frame: &Frame);
}

impl DetectionSink for () {
    fn on_detection(&mut self, _event: &DetectionEvent, _frame: &Frame) {}
}

// ========== Image-file devices ==========

/// A directory of image files replayed as a live feed, in file-name order.
#[derive(Debug, Clone)]
pub struct ImageDirDevice {
    dir: PathBuf,
}

impl ImageDirDevice {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CaptureDevice for ImageDirDevice {
    type Source = ImageFileSource;

    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn open(&self) -> Result<ImageFileSource, CaptureError> {
        let unavailable = |source: BoxError| CaptureError::CaptureUnavailable {
            device: self.name(),
            source,
        };
        let entries = std::fs::read_dir(&self.dir).map_err(|err| unavailable(err.into()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| unavailable(err.into()))?.path();
            if path.is_file() && is_frame_file(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(unavailable("no image frames found".into()));
        }
        paths.sort();
        tracing::debug!(device = %self.name(), frames = paths.len(), "opened image directory");
        Ok(ImageFileSource::new(paths))
    }
}

/// A single still image, captured once.
#[derive(Debug, Clone)]
pub struct SnapshotDevice {
    path: PathBuf,
}

impl SnapshotDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureDevice for SnapshotDevice {
    type Source = ImageFileSource;

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<ImageFileSource, CaptureError> {
        let metadata = std::fs::metadata(&self.path).map_err(|err| {
            CaptureError::CaptureUnavailable {
                device: self.name(),
                source: err.into(),
            }
        })?;
        if !metadata.is_file() {
            return Err(CaptureError::CaptureUnavailable {
                device: self.name(),
                source: "not a file".into(),
            });
        }
        Ok(ImageFileSource::new(vec![self.path.clone()]))
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Decodes image files one at a time.
#[derive(Debug)]
pub struct ImageFileSource {
    paths: std::vec::IntoIter<PathBuf>,
    read: u64,
}

impl ImageFileSource {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter(),
            read: 0,
        }
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };
        self.read += 1;
        let image = image::open(&path).map_err(|err| CaptureError::FrameReadFailure {
            frame: self.read,
            source: format!("{}: {err}", path.display()).into(),
        })?;
        Ok(Some(image.to_rgb8()))
    }
}

// ========== Session ==========

/// Capture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
}

/// Cooperative stop flag, checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop flag was raised.
    Stopped,
    /// The frame source ran out of frames.
    Exhausted,
    /// The configured frame limit was reached.
    FrameLimit,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Exhausted => "exhausted",
            Self::FrameLimit => "frame_limit",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Totals for a session that ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    pub frames: u64,
    pub detections: u64,
    pub reason: StopReason,
}

/// Drives one classifier over capture devices, recording into a ledger.
#[derive(Debug)]
pub struct CaptureSession<C> {
    classifier: C,
    state: CaptureState,
    stop: StopHandle,
    max_frames: Option<u64>,
    frames: u64,
}

impl<C: Classifier> CaptureSession<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            state: CaptureState::Idle,
            stop: StopHandle::default(),
            max_frames: None,
            frames: 0,
        }
    }

    /// Ends the session after this many frames.
    #[must_use]
    pub const fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Frames successfully read by the most recent session.
    pub const fn frames_read(&self) -> u64 {
        self.frames
    }

    /// Handle that stops the running session at its next iteration.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs one capture session until it stops or fails.
    ///
    /// Each successfully read frame is classified and a recognized material
    /// is recorded exactly once. Events recorded before a failure stay in
    /// the ledger; the failing frame adds nothing.
    pub fn run<D, S>(
        &mut self,
        device: &D,
        ledger: &mut DetectionLedger,
        sink: &mut S,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        D: CaptureDevice,
        S: DetectionSink + ?Sized,
    {
        let mut source = device.open().inspect_err(|err| {
            tracing::warn!(device = %device.name(), error = %err, "capture device unavailable");
        })?;

        self.stop.reset();
        self.frames = 0;
        self.state = CaptureState::Capturing;
        tracing::info!(device = %device.name(), "capture started");

        let result = self.capture_loop(&mut source, ledger, sink);
        drop(source);
        self.state = CaptureState::Idle;

        match &result {
            Ok(outcome) => tracing::info!(
                frames = outcome.frames,
                detections = outcome.detections,
                reason = %outcome.reason,
                "capture finished"
            ),
            Err(err) => tracing::error!(error = %err, "capture aborted"),
        }
        result
    }

    fn capture_loop<F, S>(
        &mut self,
        source: &mut F,
        ledger: &mut DetectionLedger,
        sink: &mut S,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        F: FrameSource,
        S: DetectionSink + ?Sized,
    {
        let mut detections = 0;

        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }
            if self.max_frames.is_some_and(|max| self.frames >= max) {
                break StopReason::FrameLimit;
            }
            let Some(frame) = source.next_frame()? else {
                break StopReason::Exhausted;
            };
            self.frames += 1;

            if let Some(material) = self.classifier.classify(&frame)? {
                let event = ledger.record(material, Utc::now());
                sink.on_detection(&event, &frame);
                detections += 1;
            } else {
                tracing::trace!(frame = self.frames, "no material recognized");
            }
        };

        Ok(CaptureOutcome {
            frames: self.frames,
            detections,
            reason,
        })
    }
}
