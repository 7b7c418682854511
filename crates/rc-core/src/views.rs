//! Read-only projections of a ledger for the summary, trend and history views.
//!
//! None of these hold state of their own; each is rebuilt from the ledger on
//! every render.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::ledger::{DetectionEvent, DetectionLedger};
use crate::material::Material;

/// The views a host can render over a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Per-material item counts (bar chart).
    Summary,
    /// Cumulative credits per material (line chart).
    Trend,
    /// Detection history (table).
    History,
}

/// A projected view, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Summary(BarView),
    Trend(TrendView),
    History(TableView),
}

impl ViewKind {
    /// Projects the ledger into this view.
    pub fn project(self, ledger: &DetectionLedger) -> View {
        match self {
            Self::Summary => View::Summary(BarView::from_ledger(ledger)),
            Self::Trend => View::Trend(TrendView::from_ledger(ledger)),
            Self::History => View::History(TableView::from_history(ledger.history())),
        }
    }
}

// ========== Bar chart ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bar {
    pub material: Material,
    pub count: u64,
}

/// One bar per material, height = item count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarView {
    pub bars: Vec<Bar>,
    pub total_items: u64,
    pub total_credits: u64,
}

impl BarView {
    pub fn from_ledger(ledger: &DetectionLedger) -> Self {
        let bars = Material::ALL
            .into_iter()
            .map(|material| Bar {
                material,
                count: ledger.count(material),
            })
            .collect::<Vec<_>>();
        Self {
            total_items: bars.iter().map(|b| b.count).sum(),
            total_credits: ledger.total_credits(),
            bars,
        }
    }

    /// Tallest bar, for scaling.
    pub fn max_count(&self) -> u64 {
        self.bars.iter().map(|b| b.count).max().unwrap_or(0)
    }
}

// ========== Cumulative time series ==========

/// `x` is the event index within the material's own sub-sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: usize,
    pub y: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub material: Material,
    pub points: Vec<Point>,
}

/// One cumulative-credit line per material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendView {
    pub series: Vec<Series>,
}

impl TrendView {
    pub fn from_ledger(ledger: &DetectionLedger) -> Self {
        let series = Material::ALL
            .into_iter()
            .map(|material| Series {
                material,
                points: ledger
                    .cumulative_credits(material)
                    .into_iter()
                    .enumerate()
                    .map(|(x, y)| Point { x, y })
                    .collect(),
            })
            .collect();
        Self { series }
    }
}

// ========== History table ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub material: Material,
    pub credits: u32,
}

/// A history row whose timestamp is still text, as stored.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    pub timestamp: &'a str,
    pub material: Material,
    pub credits: u32,
}

/// Detection history with the timestamp split into date and time (UTC).
///
/// Rows whose timestamp does not parse are left out of the table and counted
/// in `dropped`; the history they came from is not modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub rows: Vec<TableRow>,
    pub dropped: usize,
}

impl TableView {
    pub fn from_history(history: &[DetectionEvent]) -> Self {
        let stamps: Vec<String> = history
            .iter()
            .map(|e| e.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
            .collect();
        Self::from_rows(history.iter().zip(&stamps).map(|(e, ts)| RawRow {
            timestamp: ts,
            material: e.material,
            credits: e.credits,
        }))
    }

    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = RawRow<'a>>,
    {
        let mut table = Self {
            rows: Vec::new(),
            dropped: 0,
        };
        for raw in rows {
            match DateTime::parse_from_rfc3339(raw.timestamp) {
                Ok(ts) => {
                    let ts = ts.with_timezone(&Utc);
                    table.rows.push(TableRow {
                        date: ts.date_naive(),
                        time: ts.time(),
                        material: raw.material,
                        credits: raw.credits,
                    });
                }
                Err(err) => {
                    tracing::warn!(timestamp = raw.timestamp, error = %err, "dropping row with unparseable timestamp");
                    table.dropped += 1;
                }
            }
        }
        table
    }
}
