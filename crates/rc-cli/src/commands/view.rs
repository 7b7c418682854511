//! View command: renders a ledger view over archived detections.
//!
//! Without a scope flag the latest session is shown, which is the ledger the
//! live views displayed while that session ran.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rc_core::views::{RawRow, TableView};
use rc_core::{Material, View, ViewKind};
use rc_db::{Database, DetectionRecord, Scope};

use super::render::{write_view, write_view_json};
use super::util::{open_database, short_id};
use crate::Config;

/// View names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewName {
    /// Item count per material.
    Summary,
    /// Cumulative credits per material.
    Trend,
    /// Every detection in arrival order.
    History,
}

impl From<ViewName> for ViewKind {
    fn from(name: ViewName) -> Self {
        match name {
            ViewName::Summary => Self::Summary,
            ViewName::Trend => Self::Trend,
            ViewName::History => Self::History,
        }
    }
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// Which view to render.
    #[arg(value_enum, default_value_t = ViewName::Summary)]
    pub view: ViewName,

    /// Session ID or unique ID prefix to show (defaults to the latest session).
    #[arg(long, conflicts_with = "all")]
    pub session: Option<String>,

    /// Aggregate across every archived session.
    #[arg(long)]
    pub all: bool,

    /// Output as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &ViewArgs, config: &Config) -> Result<()> {
    let db = open_database(config)?;

    let session_id = if args.all {
        None
    } else if let Some(prefix) = &args.session {
        Some(
            db.resolve_session_id(prefix)
                .context("failed to resolve session")?,
        )
    } else {
        match db.latest_session()? {
            Some(session) => Some(session.id),
            None => {
                writeln!(writer, "No sessions recorded.")?;
                return Ok(());
            }
        }
    };
    let scope = session_id.as_deref().map_or(Scope::All, Scope::Session);

    let view = project(&db, args.view.into(), scope)?;
    tracing::debug!(view = ?args.view, ?scope, "rendering view");

    if args.json {
        write_view_json(writer, &view)
    } else {
        if let Some(id) = &session_id {
            writeln!(writer, "Session {}", short_id(id))?;
        } else {
            writeln!(writer, "All sessions")?;
        }
        writeln!(writer)?;
        write_view(writer, &view)?;
        Ok(())
    }
}

/// Builds a view over archived detections.
///
/// Summary and trend replay the ledger. History is built from the stored
/// rows directly so that a row with an unreadable timestamp is hidden
/// instead of failing the whole table.
pub fn project(db: &Database, kind: ViewKind, scope: Scope<'_>) -> Result<View> {
    match kind {
        ViewKind::History => {
            let records = db
                .list_detections(scope)
                .context("failed to load detections")?;
            Ok(View::History(history_table(&records)))
        }
        ViewKind::Summary | ViewKind::Trend => {
            let ledger = db.load_ledger(scope).context("failed to load ledger")?;
            Ok(kind.project(&ledger))
        }
    }
}

fn history_table(records: &[DetectionRecord]) -> TableView {
    TableView::from_rows(records.iter().filter_map(|record| {
        match record.material.parse::<Material>() {
            Ok(material) => Some(RawRow {
                timestamp: &record.timestamp,
                material,
                credits: u32::try_from(record.credits).unwrap_or(material.credits()),
            }),
            Err(err) => {
                tracing::warn!(session = %record.session_id, error = %err, "skipping row");
                None
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use rc_core::DetectionEvent;
    use rc_db::{SessionKind, SessionRecord, format_timestamp};

    fn session(id: &str, started_at: &str) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            kind: SessionKind::Camera,
            device: Some("frames".to_string()),
            started_at: started_at.to_string(),
            ended_at: None,
            frames: 0,
            stop_reason: Some("exhausted".to_string()),
            error: None,
        }
    }

    fn seed(config: &Config) {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut db = open_database(config).unwrap();
        db.insert_session(
            &session("aaaaaaaa-1111", &format_timestamp(base)),
            &[
                DetectionEvent::new(Material::Paper, base),
                DetectionEvent::new(Material::Paper, base + chrono::Duration::seconds(3)),
            ],
        )
        .unwrap();
        let later = base + chrono::Duration::hours(1);
        db.insert_session(
            &session("bbbbbbbb-2222", &format_timestamp(later)),
            &[DetectionEvent::new(Material::Metal, later)],
        )
        .unwrap();
    }

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            database_path: root.join("rcy.db"),
            image_dir: root.join("stills"),
            ..Config::default()
        }
    }

    fn render(args: &ViewArgs, config: &Config) -> String {
        let mut output = Vec::new();
        run(&mut output, args, config).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn args(view: ViewName) -> ViewArgs {
        ViewArgs {
            view,
            session: None,
            all: false,
            json: false,
        }
    }

    #[test]
    fn defaults_to_latest_session() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let output = render(&args(ViewName::Summary), &config);
        assert_snapshot!(output, @r"
        Session bbbbbbbb

        RECYCLING SUMMARY

        Cardboard  ░░░░░░░░░░░░░░░░░░░░  0
        Metal      ████████████████████  1
        Paper      ░░░░░░░░░░░░░░░░░░░░  0
        Plastic    ░░░░░░░░░░░░░░░░░░░░  0

        Items: 1  Credits: 10
        ");
    }

    #[test]
    fn all_sessions_trend() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let mut view_args = args(ViewName::Trend);
        view_args.all = true;
        let output = render(&view_args, &config);
        assert_snapshot!(output, @r"
        All sessions

        CUMULATIVE CREDITS

        Cardboard  -
        Metal      10
        Paper      5 10
        Plastic    -
        ");
    }

    #[test]
    fn history_for_named_session() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let mut view_args = args(ViewName::History);
        view_args.session = Some("aaaaaaaa-1111".to_string());
        let output = render(&view_args, &config);
        assert_snapshot!(output, @r"
        Session aaaaaaaa

        DETECTION HISTORY

        DATE        TIME      MATERIAL   CREDITS
        2025-06-01  12:00:00  Paper      5
        2025-06-01  12:00:03  Paper      5
        ");
    }

    #[test]
    fn session_selected_by_displayed_short_id() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let mut view_args = args(ViewName::Summary);
        view_args.session = Some(short_id("aaaaaaaa-1111").to_string());
        let output = render(&view_args, &config);
        assert!(output.starts_with("Session aaaaaaaa\n"));
        assert!(output.contains("Items: 2  Credits: 10"));
    }

    #[test]
    fn ambiguous_session_prefix_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let mut view_args = args(ViewName::Summary);
        view_args.session = Some(String::new());
        let mut output = Vec::new();
        let err = run(&mut output, &view_args, &config).unwrap_err();
        assert!(format!("{err:#}").contains("session not found"));

        let mut db = open_database(&config).unwrap();
        db.insert_session(&session("aaaaaaaa-2222", "2025-06-01T14:00:00.000Z"), &[])
            .unwrap();
        view_args.session = Some("aaaaaaaa".to_string());
        let err = run(&mut output, &view_args, &config).unwrap_err();
        assert!(format!("{err:#}").contains("session ID aaaaaaaa is ambiguous (2 sessions match)"));
    }

    #[test]
    fn unknown_session_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let mut view_args = args(ViewName::Summary);
        view_args.session = Some("missing".to_string());
        let mut output = Vec::new();
        let err = run(&mut output, &view_args, &config).unwrap_err();
        assert!(format!("{err:#}").contains("session not found: missing"));
    }

    #[test]
    fn empty_database_reports_no_sessions() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());

        let output = render(&args(ViewName::History), &config);
        assert_eq!(output, "No sessions recorded.\n");
    }

    #[test]
    fn json_output_skips_header() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed(&config);

        let mut view_args = args(ViewName::Summary);
        view_args.all = true;
        view_args.json = true;
        let output = render(&view_args, &config);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["view"], "summary");
        assert_eq!(value["total_items"], 3);
        assert_eq!(value["total_credits"], 20);
    }
}
