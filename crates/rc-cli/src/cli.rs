//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{detect, gallery, goal, log, sessions, view};

/// Recycling assistant.
///
/// Classifies recyclable items from a camera feed or still images, keeps a
/// running ledger of items and credits, and tracks progress toward goals.
#[derive(Debug, Parser)]
#[command(name = "rcy", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a capture session over a frame feed or a single snapshot.
    Detect(detect::DetectArgs),

    /// Log recycled items by hand.
    Log(log::LogArgs),

    /// Render the summary, trend or history view.
    View(view::ViewArgs),

    /// Manage per-material recycling goals.
    #[command(subcommand)]
    Goal(goal::GoalAction),

    /// List archived detection stills.
    Gallery(gallery::GalleryArgs),

    /// List archived sessions.
    Sessions(sessions::SessionsArgs),

    /// Export archived detections as JSONL to stdout.
    Export,

    /// Show database location and the latest session.
    Status,
}
