//! Log command for recording hand-sorted items as a manual session.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Args;
use rc_core::DetectionLedger;
use rc_db::{SessionKind, SessionRecord, format_timestamp};

use super::util::{new_session_id, open_database, parse_material, short_id};
use crate::Config;

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Material label (cardboard, metal, paper or plastic).
    pub material: String,

    /// Number of items to record.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,
}

pub fn run<W: Write>(writer: &mut W, args: &LogArgs, config: &Config) -> Result<()> {
    if args.count == 0 {
        bail!("count must be at least 1");
    }
    let material = parse_material(&args.material)?;

    let mut ledger = DetectionLedger::new();
    let now = Utc::now();
    for _ in 0..args.count {
        ledger.record(material, now);
    }

    let session_id = new_session_id();
    let record = SessionRecord {
        id: session_id.clone(),
        kind: SessionKind::Manual,
        device: None,
        started_at: format_timestamp(now),
        ended_at: Some(format_timestamp(now)),
        frames: 0,
        stop_reason: None,
        error: None,
    };
    let mut db = open_database(config)?;
    db.insert_session(&record, ledger.history())
        .context("failed to archive session")?;

    writeln!(
        writer,
        "Logged {} {} ({} credits) in session {}",
        args.count,
        material,
        ledger.total_credits(),
        short_id(&session_id)
    )?;
    Ok(())
}
