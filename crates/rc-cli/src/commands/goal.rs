//! Goal commands for per-material item targets.
//!
//! Progress is measured against every archived session, so goals survive
//! across capture sessions.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use rc_core::Material;
use rc_db::Database;
use serde::Serialize;

use super::render::bar;
use super::util::{open_database, parse_material};
use crate::Config;

#[derive(Debug, Subcommand)]
pub enum GoalAction {
    /// Set or replace the item target for a material.
    Set {
        /// Material label.
        material: String,
        /// Number of items to reach.
        target: u32,
    },
    /// Remove the goal for a material, or every goal with --all.
    Clear {
        /// Material label.
        #[arg(required_unless_present = "all")]
        material: Option<String>,
        /// Remove every goal.
        #[arg(long, conflicts_with = "material")]
        all: bool,
    },
    /// Show progress toward every goal.
    List {
        /// Output as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// Progress toward one goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalProgress {
    pub material: Material,
    pub target: u64,
    pub recycled: u64,
    pub percent: u64,
    pub reached: bool,
}

impl GoalProgress {
    fn new(material: Material, target: u64, recycled: u64) -> Self {
        let percent = if target == 0 {
            100
        } else {
            recycled.saturating_mul(100) / target
        };
        Self {
            material,
            target,
            recycled,
            percent,
            reached: recycled >= target,
        }
    }
}

pub fn run<W: Write>(writer: &mut W, action: &GoalAction, config: &Config) -> Result<()> {
    let mut db = open_database(config)?;
    match action {
        GoalAction::Set { material, target } => {
            let material = parse_material(material)?;
            db.set_goal(material, i64::from(*target))
                .context("failed to save goal")?;
            writeln!(writer, "Goal for {material}: {target} items")?;
        }
        GoalAction::Clear { all: true, .. } => {
            match db.clear_goals().context("failed to clear goals")? {
                0 => writeln!(writer, "No goals set.")?,
                1 => writeln!(writer, "Cleared 1 goal")?,
                n => writeln!(writer, "Cleared {n} goals")?,
            }
        }
        GoalAction::Clear { material, .. } => {
            let Some(material) = material else {
                bail!("material or --all is required");
            };
            let material = parse_material(material)?;
            if db.clear_goal(material).context("failed to clear goal")? {
                writeln!(writer, "Cleared goal for {material}")?;
            } else {
                writeln!(writer, "No goal set for {material}")?;
            }
        }
        GoalAction::List { json } => {
            let progress = progress(&db)?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&progress)?)?;
            } else {
                write_progress(writer, &progress)?;
            }
        }
    }
    Ok(())
}

/// Progress for every goal, in catalog order.
pub fn progress(db: &Database) -> Result<Vec<GoalProgress>> {
    let goals = db.list_goals().context("failed to load goals")?;
    let totals = db
        .material_totals()
        .context("failed to load material totals")?;
    Ok(goals
        .into_iter()
        .map(|goal| {
            let recycled = totals.get(&goal.material).copied().unwrap_or(0);
            GoalProgress::new(
                goal.material,
                u64::try_from(goal.target).unwrap_or(0),
                u64::try_from(recycled).unwrap_or(0),
            )
        })
        .collect())
}

fn write_progress<W: Write>(writer: &mut W, progress: &[GoalProgress]) -> Result<()> {
    if progress.is_empty() {
        writeln!(writer, "No goals set.")?;
        return Ok(());
    }
    writeln!(writer, "GOALS")?;
    writeln!(writer)?;
    for goal in progress {
        writeln!(
            writer,
            "{:<10} {}  {}/{} ({}%){}",
            goal.material.display_name(),
            bar(goal.recycled.min(goal.target), goal.target),
            goal.recycled,
            goal.target,
            goal.percent,
            if goal.reached { "  reached" } else { "" }
        )?;
    }
    Ok(())
}
