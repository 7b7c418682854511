//! Sessions command for listing archived sessions.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use rc_db::SessionSummary;

use super::util::{open_database, short_id};
use crate::Config;

#[derive(Debug, Args)]
pub struct SessionsArgs {
    /// Output as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &SessionsArgs, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let sessions = db.list_sessions().context("failed to list sessions")?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&sessions)?)?;
        return Ok(());
    }

    if sessions.is_empty() {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<8}  {:<8}  {:<24}  {:>6}  {:>5}  {:>7}  OUTCOME",
        "ID", "KIND", "STARTED", "FRAMES", "ITEMS", "CREDITS"
    )?;
    for summary in &sessions {
        write_row(writer, summary)?;
    }
    Ok(())
}

fn write_row<W: Write>(writer: &mut W, summary: &SessionSummary) -> Result<()> {
    let session = &summary.session;
    let outcome = match (&session.stop_reason, &session.error) {
        (_, Some(error)) => format!("error: {error}"),
        (Some(reason), None) => reason.clone(),
        (None, None) => "-".to_string(),
    };
    writeln!(
        writer,
        "{:<8}  {:<8}  {:<24}  {:>6}  {:>5}  {:>7}  {outcome}",
        short_id(&session.id),
        session.kind,
        session.started_at,
        session.frames,
        summary.detections,
        summary.credits,
    )?;
    Ok(())
}
