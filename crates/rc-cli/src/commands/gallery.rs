//! Gallery command for browsing archived stills and submitting corrected ones.
//!
//! `gallery submit` classifies one image, reports what the detector saw and
//! files the image under the label the user picked. The label always wins,
//! so a misdetection can be corrected before it lands in the archive.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Subcommand};
use rc_core::{
    CaptureDevice, Classifier, FrameSource, ImageArchive, Material, SnapshotDevice, list_images,
};

use super::detect::build_classifier;
use super::util::parse_material;
use crate::Config;

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct GalleryArgs {
    #[command(subcommand)]
    pub action: Option<GalleryAction>,

    /// Only list stills for this material.
    #[arg(long)]
    pub material: Option<String>,

    /// Output as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum GalleryAction {
    /// Classify an image and archive it under the chosen label.
    Submit {
        /// Image file to classify.
        image: PathBuf,

        /// Correct material for the image (cardboard, metal, paper or plastic).
        #[arg(long)]
        label: String,
    },
}

pub fn run<W: Write>(writer: &mut W, args: &GalleryArgs, config: &Config) -> Result<()> {
    if let Some(GalleryAction::Submit { image, label }) = &args.action {
        let label = parse_material(label)?;
        let mut classifier = build_classifier(config)?;
        return submit(writer, image, label, &mut classifier, config);
    }

    let material = args.material.as_deref().map(parse_material).transpose()?;
    let images = list_images(&config.image_dir, material)
        .with_context(|| format!("failed to read {}", config.image_dir.display()))?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&images)?)?;
        return Ok(());
    }

    if images.is_empty() {
        writeln!(writer, "No stills in {}", config.image_dir.display())?;
        return Ok(());
    }

    let mut current = None;
    for image in &images {
        if current != Some(image.material) {
            if current.is_some() {
                writeln!(writer)?;
            }
            let count = images.iter().filter(|i| i.material == image.material).count();
            writeln!(writer, "{} ({count})", image.material.display_name())?;
            current = Some(image.material);
        }
        let captured = image.captured_at.map_or_else(
            || "unknown time       ".to_string(),
            |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        writeln!(writer, "  {captured}  {}", image.path.display())?;
    }
    Ok(())
}

/// Classifies `image` once and archives it under `label`.
///
/// Nothing is written when the image cannot be read or the classifier fails.
pub fn submit<W, C>(
    writer: &mut W,
    image: &Path,
    label: Material,
    classifier: &mut C,
    config: &Config,
) -> Result<()>
where
    W: Write,
    C: Classifier,
{
    let device = SnapshotDevice::new(image);
    let mut source = device.open()?;
    let Some(frame) = source.next_frame()? else {
        bail!("no frame in {}", image.display());
    };

    let detected = classifier
        .classify(&frame)
        .context("failed to classify image")?;
    match detected {
        Some(material) => writeln!(writer, "Detected: {}", material.display_name())?,
        None => writeln!(writer, "Detected: nothing recognized")?,
    }

    let mut archive = ImageArchive::new(&config.image_dir);
    let path = archive
        .save(label, Utc::now(), &frame)
        .context("failed to archive image")?;
    tracing::debug!(?detected, %label, path = %path.display(), "submitted gallery image");

    match detected {
        Some(material) if material != label => writeln!(
            writer,
            "Saved as {} (corrected from {}): {}",
            label.display_name(),
            material.display_name(),
            path.display()
        )?,
        _ => writeln!(writer, "Saved as {}: {}", label.display_name(), path.display())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use rc_core::{ClassifyError, Frame};

    struct Scripted(VecDeque<Result<Option<Material>, ClassifyError>>);

    impl Classifier for Scripted {
        fn classify(&mut self, _frame: &Frame) -> Result<Option<Material>, ClassifyError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn scripted(answer: Result<Option<Material>, ClassifyError>) -> Scripted {
        Scripted(VecDeque::from([answer]))
    }

    fn write_image(root: &Path) -> PathBuf {
        let path = root.join("photo.png");
        Frame::new(4, 4).save(&path).unwrap();
        path
    }

    fn list_args(material: Option<&str>, json: bool) -> GalleryArgs {
        GalleryArgs {
            action: None,
            material: material.map(str::to_string),
            json,
        }
    }

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            database_path: root.join("rcy.db"),
            image_dir: root.join("stills"),
            ..Config::default()
        }
    }

    fn seed(config: &Config) {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut archive = ImageArchive::new(&config.image_dir);
        let frame = Frame::new(2, 2);
        archive.save(Material::Plastic, at, &frame).unwrap();
        archive
            .save(Material::Plastic, at + chrono::Duration::seconds(4), &frame)
            .unwrap();
        archive.save(Material::Cardboard, at, &frame).unwrap();
    }

    fn render(args: &GalleryArgs, config: &Config) -> String {
        let mut output = Vec::new();
        run(&mut output, args, config).unwrap();
        let output = String::from_utf8(output).unwrap();
        output.replace(&config.image_dir.display().to_string(), "[STILLS]")
    }

    #[test]
    fn lists_stills_grouped_by_material() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let output = render(&list_args(None, false), &config);
        assert_snapshot!(output, @r"
        Cardboard (1)
          2025-06-01 12:00:00  [STILLS]/cardboard/cardboard_20250601_120000.png

        Plastic (2)
          2025-06-01 12:00:00  [STILLS]/plastic/plastic_20250601_120000.png
          2025-06-01 12:00:04  [STILLS]/plastic/plastic_20250601_120004.png
        ");
    }

    #[test]
    fn filters_by_material() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let mut output = Vec::new();
        run(&mut output, &list_args(Some("cardboard"), true), &config).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["material"], "cardboard");
    }

    #[test]
    fn empty_archive() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let output = render(&list_args(None, false), &config);
        assert_eq!(output, "No stills in [STILLS]\n");
    }

    #[test]
    fn submitted_label_overrides_detected_material() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let image = write_image(temp.path());

        let mut output = Vec::new();
        let mut classifier = scripted(Ok(Some(Material::Plastic)));
        submit(&mut output, &image, Material::Metal, &mut classifier, &config).unwrap();

        let output = String::from_utf8(output)
            .unwrap()
            .replace(&config.image_dir.display().to_string(), "[STILLS]");
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("Detected: Plastic"));
        let saved = lines.next().unwrap();
        assert!(saved.starts_with("Saved as Metal (corrected from Plastic): [STILLS]/metal/metal_"));

        let metal = list_images(&config.image_dir, Some(Material::Metal)).unwrap();
        assert_eq!(metal.len(), 1);
        assert!(list_images(&config.image_dir, Some(Material::Plastic))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn submit_without_detection_keeps_label() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let image = write_image(temp.path());

        let mut output = Vec::new();
        let mut classifier = scripted(Ok(None));
        submit(&mut output, &image, Material::Paper, &mut classifier, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Detected: nothing recognized\nSaved as Paper: "));
        let images = list_images(&config.image_dir, None).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].material, Material::Paper);
    }

    #[test]
    fn submit_classifier_failure_archives_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let image = write_image(temp.path());

        let mut output = Vec::new();
        let mut classifier = scripted(Err(ClassifyError::Detector("model offline".into())));
        let err = submit(&mut output, &image, Material::Paper, &mut classifier, &config)
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to classify image"));
        assert!(!config.image_dir.exists());
    }

    #[test]
    fn submit_missing_image_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());

        let mut output = Vec::new();
        let mut classifier = scripted(Ok(Some(Material::Metal)));
        let err = submit(
            &mut output,
            &temp.path().join("missing.png"),
            Material::Metal,
            &mut classifier,
            &config,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("capture unavailable"));
        assert!(output.is_empty());
    }
}
