//! Implementation of the `rcy export` command.
//!
//! Writes every archived detection as JSONL, in arrival order.

use std::io::Write;

use anyhow::{Context, Result};
use rc_db::Scope;

use super::util::open_database;
use crate::Config;

/// Run the export command.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let detections = db
        .list_detections(Scope::All)
        .context("failed to load detections")?;

    for detection in &detections {
        serde_json::to_writer(&mut *writer, detection).context("failed to serialize detection")?;
        // Handle broken pipe gracefully (e.g., when piped to `head`)
        if writeln!(writer).is_err() {
            break;
        }
    }
    writer.flush()?;

    tracing::debug!(count = detections.len(), "exported detections");
    Ok(())
}
