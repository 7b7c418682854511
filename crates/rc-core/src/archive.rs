//! Still-frame archive for recognized detections.
//!
//! Layout: `<root>/<material>/<material>_YYYYMMDD_HHMMSS.png`, timestamps in
//! UTC. A second still for the same material within the same second gets a
//! `_N` suffix. Archive failures never touch the ledger.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::capture::{DetectionSink, Frame};
use crate::ledger::DetectionEvent;
use crate::material::Material;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const EXTENSION: &str = "png";

/// Archive errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes detection stills under a single root directory.
#[derive(Debug)]
pub struct ImageArchive {
    root: PathBuf,
    saved: u64,
    failures: u64,
}

impl ImageArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            saved: 0,
            failures: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stills written so far.
    pub const fn saved(&self) -> u64 {
        self.saved
    }

    /// Stills that could not be written.
    pub const fn failures(&self) -> u64 {
        self.failures
    }

    /// Writes one still and returns its path.
    pub fn save(
        &mut self,
        material: Material,
        at: DateTime<Utc>,
        frame: &Frame,
    ) -> Result<PathBuf, ArchiveError> {
        let dir = self.root.join(material.as_str());
        std::fs::create_dir_all(&dir).map_err(|source| ArchiveError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let path = unused_path(&dir, &file_stem(material, at));
        frame.save(&path).map_err(|source| ArchiveError::Write {
            path: path.clone(),
            source,
        })?;
        self.saved += 1;
        Ok(path)
    }
}

impl DetectionSink for ImageArchive {
    fn on_detection(&mut self, event: &DetectionEvent, frame: &Frame) {
        match self.save(event.material, event.timestamp, frame) {
            Ok(path) => tracing::debug!(path = %path.display(), "archived detection still"),
            Err(err) => {
                self.failures += 1;
                tracing::warn!(error = %err, "failed to archive detection still");
            }
        }
    }
}

/// `<material>_YYYYMMDD_HHMMSS`
pub fn file_stem(material: Material, at: DateTime<Utc>) -> String {
    format!("{}_{}", material.as_str(), at.format(STAMP_FORMAT))
}

fn unused_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{EXTENSION}"));
    if !first.exists() {
        return first;
    }
    (2_u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{EXTENSION}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// A still found in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedImage {
    pub material: Material,
    pub path: PathBuf,
    /// Parsed from the file name; `None` for files not written by the archive.
    pub captured_at: Option<NaiveDateTime>,
}

/// Lists archived stills, optionally for one material, oldest first per material.
pub fn list_images(
    root: &Path,
    material: Option<Material>,
) -> Result<Vec<ArchivedImage>, ArchiveError> {
    let materials = material.map_or_else(|| Material::ALL.to_vec(), |m| vec![m]);
    let mut images = Vec::new();

    for material in materials {
        let dir = root.join(material.as_str());
        if !dir.is_dir() {
            continue;
        }
        let entries = std::fs::read_dir(&dir).map_err(|source| ArchiveError::Read {
            path: dir.clone(),
            source,
        })?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| ArchiveError::Read {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if !path.is_file() {
                continue;
            }
            let captured_at = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| parse_stem(material, stem));
            found.push(ArchivedImage {
                material,
                path,
                captured_at,
            });
        }
        found.sort_by(|a, b| {
            a.captured_at
                .cmp(&b.captured_at)
                .then_with(|| a.path.cmp(&b.path))
        });
        images.extend(found);
    }

    Ok(images)
}

fn parse_stem(material: Material, stem: &str) -> Option<NaiveDateTime> {
    let rest = stem.strip_prefix(material.as_str())?.strip_prefix('_')?;
    // YYYYMMDD_HHMMSS is 15 chars; anything after is the collision suffix.
    let stamp = rest.get(..15)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn file_stem_uses_material_and_utc_stamp() {
        assert_eq!(file_stem(Material::Metal, at()), "metal_20250314_092653");
    }

    #[test]
    fn save_writes_under_material_directory() {
        let temp = tempfile::tempdir().unwrap();
        let mut archive = ImageArchive::new(temp.path());

        let path = archive
            .save(Material::Plastic, at(), &Frame::new(4, 4))
            .unwrap();

        assert_eq!(
            path,
            temp.path().join("plastic").join("plastic_20250314_092653.png")
        );
        assert!(path.is_file());
        assert_eq!(archive.saved(), 1);
    }

    #[test]
    fn same_second_collisions_get_suffixes() {
        let temp = tempfile::tempdir().unwrap();
        let mut archive = ImageArchive::new(temp.path());
        let frame = Frame::new(2, 2);

        let first = archive.save(Material::Paper, at(), &frame).unwrap();
        let second = archive.save(Material::Paper, at(), &frame).unwrap();
        let third = archive.save(Material::Paper, at(), &frame).unwrap();

        assert_eq!(first.file_name().unwrap(), "paper_20250314_092653.png");
        assert_eq!(
            second.file_name().unwrap(),
            "paper_20250314_092653_2.png"
        );
        assert_eq!(third.file_name().unwrap(), "paper_20250314_092653_3.png");
    }

    #[test]
    fn sink_counts_failures_without_panicking() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let mut archive = ImageArchive::new(&blocker);

        let event = DetectionEvent {
            timestamp: at(),
            material: Material::Cardboard,
            credits: 7,
        };
        archive.on_detection(&event, &Frame::new(1, 1));

        assert_eq!(archive.saved(), 0);
        assert_eq!(archive.failures(), 1);
    }

    #[test]
    fn list_images_parses_capture_times() {
        let temp = tempfile::tempdir().unwrap();
        let mut archive = ImageArchive::new(temp.path());
        let frame = Frame::new(2, 2);
        archive.save(Material::Metal, at(), &frame).unwrap();
        archive
            .save(Material::Plastic, at() - chrono::Duration::hours(1), &frame)
            .unwrap();
        std::fs::write(temp.path().join("metal").join("manual.png"), b"x").unwrap();

        let all = list_images(temp.path(), None).unwrap();
        let materials: Vec<_> = all.iter().map(|i| i.material).collect();
        assert_eq!(
            materials,
            vec![Material::Metal, Material::Metal, Material::Plastic]
        );
        assert_eq!(all[0].captured_at, None);
        assert_eq!(all[1].captured_at, Some(at().naive_utc()));

        let plastic = list_images(temp.path(), Some(Material::Plastic)).unwrap();
        assert_eq!(plastic.len(), 1);
    }

    #[test]
    fn list_images_on_missing_root_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let images = list_images(&temp.path().join("nothing"), None).unwrap();
        assert!(images.is_empty());
    }
}
