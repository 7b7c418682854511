//! Classifier boundary: turns raw detector output into at most one material per frame.
//!
//! The pretrained model sits behind the [`Detector`] trait and is treated as
//! opaque. [`ThresholdClassifier`] applies the fixed operating point on top of
//! whatever candidates the detector returns:
//!
//! 1. drop candidates below the confidence threshold,
//! 2. drop class ids outside the material catalog,
//! 3. suppress candidates overlapping an earlier survivor by more than the IoU threshold,
//! 4. take the first survivor in detector order.
//!
//! Taking only the first survivor keeps a single frame from being credited twice.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::Frame;
use crate::material::Material;

/// Default minimum confidence for a candidate to count.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Default maximum overlap between two kept candidates.
pub const DEFAULT_IOU: f32 = 0.7;

/// Classification errors.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A threshold was outside \[0.0, 1.0\] or NaN.
    #[error("{name} threshold must be between 0.0 and 1.0, got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
    /// The underlying detector failed on a frame.
    #[error("classifier failure: {0}")]
    Detector(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Confidence and overlap operating point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    confidence: f32,
    iou: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
        }
    }
}

impl Thresholds {
    pub fn new(confidence: f32, iou: f32) -> Result<Self, ClassifyError> {
        Ok(Self {
            confidence: check_unit("confidence", confidence)?,
            iou: check_unit("iou", iou)?,
        })
    }

    #[must_use]
    pub const fn confidence(&self) -> f32 {
        self.confidence
    }

    #[must_use]
    pub const fn iou(&self) -> f32 {
        self.iou
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<f32, ClassifyError> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(ClassifyError::InvalidThreshold { name, value });
    }
    Ok(value)
}

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left to `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[must_use]
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    #[must_use]
    pub fn intersect(&self, other: &Self) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Intersection over union; zero when both boxes are degenerate.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersect(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One raw detector output for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub class_id: i64,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// The opaque pretrained model.
///
/// Implementations return candidates in their own ranking order; that order
/// decides which candidate wins when several survive filtering.
pub trait Detector {
    type Error: std::error::Error + Send + Sync + 'static;

    fn detect(&mut self, frame: &Frame, thresholds: &Thresholds)
    -> Result<Vec<Candidate>, Self::Error>;
}

/// Frame-to-material contract consumed by the capture loop.
pub trait Classifier {
    /// Returns the recognized material, or `None` when nothing passes the operating point.
    fn classify(&mut self, frame: &Frame) -> Result<Option<Material>, ClassifyError>;
}

/// [`Classifier`] over any [`Detector`], applying a fixed operating point.
#[derive(Debug)]
pub struct ThresholdClassifier<D> {
    detector: D,
    thresholds: Thresholds,
}

impl<D: Detector> ThresholdClassifier<D> {
    pub const fn new(detector: D, thresholds: Thresholds) -> Self {
        Self {
            detector,
            thresholds,
        }
    }

    pub const fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

impl<D: Detector> Classifier for ThresholdClassifier<D> {
    fn classify(&mut self, frame: &Frame) -> Result<Option<Material>, ClassifyError> {
        let candidates = self
            .detector
            .detect(frame, &self.thresholds)
            .map_err(|err| ClassifyError::Detector(Box::new(err)))?;
        Ok(select(&candidates, &self.thresholds))
    }
}

/// Picks the winning material from a frame's candidates.
pub fn select(candidates: &[Candidate], thresholds: &Thresholds) -> Option<Material> {
    let survivors = suppress(candidates, thresholds);
    if survivors.len() > 1 {
        tracing::debug!(
            survivors = survivors.len(),
            "multiple candidates in frame, crediting the first"
        );
    }
    survivors.first().map(|(material, _)| *material)
}

fn suppress(candidates: &[Candidate], thresholds: &Thresholds) -> Vec<(Material, BoundingBox)> {
    let mut kept: Vec<(Material, BoundingBox)> = Vec::new();
    for candidate in candidates {
        if candidate.confidence.is_nan() || candidate.confidence < thresholds.confidence {
            continue;
        }
        let Ok(material) = Material::from_class_id(candidate.class_id) else {
            tracing::trace!(class_id = candidate.class_id, "ignoring unrecognized class");
            continue;
        };
        let overlaps = kept
            .iter()
            .any(|(_, bbox)| bbox.iou(&candidate.bbox) > thresholds.iou);
        if !overlaps {
            kept.push((material, candidate.bbox));
        }
    }
    kept
}
