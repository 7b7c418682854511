//! Core domain logic for the recycling assistant.
//!
//! This crate contains the fundamental types and logic for:
//! - Materials: the closed catalog with class ids and credit values
//! - Ledger: the append-only record of credited detections
//! - Classification: the operating point applied to an opaque detector
//! - Capture: the frame → classifier → ledger loop and its state machine
//! - Views: summary, trend and history projections of a ledger
//! - Archive: still-frame persistence for recognized detections

pub mod archive;
pub mod capture;
pub mod classify;
pub mod ledger;
pub mod material;
pub mod views;

pub use archive::{ArchiveError, ArchivedImage, ImageArchive, list_images};
pub use capture::{
    CaptureDevice, CaptureError, CaptureOutcome, CaptureSession, CaptureState, DetectionSink,
    Frame, FrameSource, ImageDirDevice, SnapshotDevice, StopHandle, StopReason,
};
pub use classify::{
    BoundingBox, Candidate, Classifier, ClassifyError, Detector, ThresholdClassifier, Thresholds,
};
pub use ledger::{DetectionEvent, DetectionLedger, LedgerSnapshot};
pub use material::{Material, UnknownMaterial};
pub use views::{View, ViewKind};
