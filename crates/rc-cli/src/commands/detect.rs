//! Detect command: runs one capture session and archives it.
//!
//! The session's ledger lives only for the duration of the command. Once the
//! session ends, normally or with an error, its history is archived so the
//! views can be rendered later. A device that cannot be opened never starts a
//! session, so nothing is archived in that case.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Args;
use rc_core::{
    CaptureDevice, CaptureError, CaptureSession, Classifier, DetectionLedger, ImageArchive,
    ImageDirDevice, SnapshotDevice, ThresholdClassifier,
};
use rc_db::{SessionKind, SessionRecord, format_timestamp};
use rc_detect::HttpDetector;

use super::util::{new_session_id, open_database, short_id};
use crate::Config;

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Directory of frames to replay as a live feed, or an image file with --snapshot.
    pub source: PathBuf,

    /// Classify a single still image instead of a frame directory.
    #[arg(long)]
    pub snapshot: bool,

    /// Archive a still for every detection.
    #[arg(long)]
    pub save_images: bool,

    /// Stop after this many frames.
    #[arg(long)]
    pub max_frames: Option<u64>,
}

/// Per-session settings independent of the device.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub kind: SessionKind,
    pub save_images: bool,
    pub max_frames: Option<u64>,
}

/// Builds the classifier backed by the configured detector endpoint.
pub fn build_classifier(config: &Config) -> Result<ThresholdClassifier<HttpDetector>> {
    let thresholds = config
        .thresholds()
        .context("invalid classifier thresholds")?;
    let endpoint = config
        .detector_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            anyhow!("missing detector endpoint (set RCY_DETECTOR_URL or detector_url in config.toml)")
        })?;
    let detector = HttpDetector::new(endpoint).context("failed to create detector client")?;
    Ok(ThresholdClassifier::new(detector, thresholds))
}

pub fn run<W: Write>(writer: &mut W, args: &DetectArgs, config: &Config) -> Result<()> {
    let classifier = build_classifier(config)?;

    let options = SessionOptions {
        kind: if args.snapshot {
            SessionKind::Snapshot
        } else {
            SessionKind::Camera
        },
        save_images: args.save_images || config.save_images,
        max_frames: args.max_frames,
    };

    if args.snapshot {
        capture(
            writer,
            &SnapshotDevice::new(&args.source),
            classifier,
            options,
            config,
        )
    } else {
        capture(
            writer,
            &ImageDirDevice::new(&args.source),
            classifier,
            options,
            config,
        )
    }
}

/// Runs one session over `device`, archives it and prints a summary.
pub fn capture<W, D, C>(
    writer: &mut W,
    device: &D,
    classifier: C,
    options: SessionOptions,
    config: &Config,
) -> Result<()>
where
    W: Write,
    D: CaptureDevice,
    C: Classifier,
{
    let mut db = open_database(config)?;
    let session_id = new_session_id();
    let started_at = Utc::now();

    let mut session = CaptureSession::new(classifier).with_max_frames(options.max_frames);
    let mut ledger = DetectionLedger::new();
    let mut archive = options
        .save_images
        .then(|| ImageArchive::new(&config.image_dir));

    let result = match archive.as_mut() {
        Some(archive) => session.run(device, &mut ledger, archive),
        None => session.run(device, &mut ledger, &mut ()),
    };

    if let Err(err @ CaptureError::CaptureUnavailable { .. }) = result {
        return Err(err).context("capture session did not start");
    }

    let record = SessionRecord {
        id: session_id.clone(),
        kind: options.kind,
        device: Some(device.name()),
        started_at: format_timestamp(started_at),
        ended_at: Some(format_timestamp(Utc::now())),
        frames: i64::try_from(session.frames_read()).unwrap_or(i64::MAX),
        stop_reason: result
            .as_ref()
            .ok()
            .map(|outcome| outcome.reason.as_str().to_string()),
        error: result.as_ref().err().map(ToString::to_string),
    };
    db.insert_session(&record, ledger.history())
        .context("failed to archive session")?;

    writeln!(writer, "Session {} ({})", short_id(&session_id), options.kind)?;
    writeln!(
        writer,
        "Frames: {}  Detections: {}  Credits: {}",
        session.frames_read(),
        ledger.len(),
        ledger.total_credits()
    )?;
    match &result {
        Ok(outcome) => writeln!(writer, "Stopped: {}", outcome.reason)?,
        Err(err) => writeln!(writer, "Stopped: error: {err}")?,
    }
    if let Some(archive) = &archive {
        writeln!(
            writer,
            "Stills saved: {} ({} failed) in {}",
            archive.saved(),
            archive.failures(),
            archive.root().display()
        )?;
    }

    result.map(|_| ()).context("capture session failed")
}
