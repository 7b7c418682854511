//! Status command for showing where data lives and the latest session.

use std::io::Write;

use anyhow::Result;

use super::util::{open_database, short_id};
use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;

    writeln!(writer, "Recycling assistant status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Stills: {}", config.image_dir.display())?;
    writeln!(
        writer,
        "Detector: {}",
        config.detector_url.as_deref().unwrap_or("not configured")
    )?;

    let count = db.session_count()?;
    let Some(latest) = db.latest_session()? else {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    };

    writeln!(writer, "Sessions: {count}")?;
    writeln!(
        writer,
        "Latest: {} ({}) started {}",
        short_id(&latest.id),
        latest.kind,
        latest.started_at
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use rc_db::{SessionKind, SessionRecord};

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            database_path: root.join("rcy.db"),
            image_dir: root.join("stills"),
            detector_url: Some("http://127.0.0.1:8000/detect".to_string()),
            ..Config::default()
        }
    }

    fn render(config: &Config, root: &std::path::Path) -> String {
        let mut output = Vec::new();
        run(&mut output, config).unwrap();
        let output = String::from_utf8(output).unwrap();
        output.replace(&root.display().to_string(), "[TEMP]")
    }

    #[test]
    fn status_command_outputs_latest_session() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let mut db = open_database(&config).unwrap();
        for (id, started_at) in [
            ("0a1b2c3d-first", "2025-01-01T00:00:00.000Z"),
            ("9f8e7d6c-second", "2025-01-02T08:30:00.000Z"),
        ] {
            db.insert_session(
                &SessionRecord {
                    id: id.to_string(),
                    kind: SessionKind::Camera,
                    device: None,
                    started_at: started_at.to_string(),
                    ended_at: None,
                    frames: 0,
                    stop_reason: None,
                    error: None,
                },
                &[],
            )
            .unwrap();
        }

        assert_snapshot!(render(&config, temp.path()), @r"
        Recycling assistant status
        Database: [TEMP]/rcy.db
        Stills: [TEMP]/stills
        Detector: http://127.0.0.1:8000/detect
        Sessions: 2
        Latest: 9f8e7d6c (camera) started 2025-01-02T08:30:00.000Z
        ");
    }

    #[test]
    fn status_without_sessions() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            detector_url: None,
            ..test_config(temp.path())
        };

        assert_snapshot!(render(&config, temp.path()), @r"
        Recycling assistant status
        Database: [TEMP]/rcy.db
        Stills: [TEMP]/stills
        Detector: not configured
        No sessions recorded.
        ");
    }
}
