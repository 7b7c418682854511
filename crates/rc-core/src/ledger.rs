//! Append-only detection ledger with derived counts and credits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::material::{Material, UnknownMaterial};

/// One credited detection.
///
/// Created exactly once per successful classification (or manual entry) and
/// never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// When the item was recognized.
    pub timestamp: DateTime<Utc>,
    /// The recognized material.
    pub material: Material,
    /// Credits awarded, looked up from the material catalog.
    pub credits: u32,
}

impl DetectionEvent {
    /// Event for `material` at `timestamp`, credited from the catalog.
    pub fn new(material: Material, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            material,
            credits: material.credits(),
        }
    }
}

/// Per-session record of credited detections.
///
/// Holds the history in arrival order together with a per-material count.
/// The count for a material always equals the number of history entries with
/// that material; everything else is projected from the history on demand.
#[derive(Debug, Clone)]
pub struct DetectionLedger {
    history: Vec<DetectionEvent>,
    counts: BTreeMap<Material, u64>,
}

impl Default for DetectionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionLedger {
    /// Creates an empty ledger with a zero count for every material.
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            counts: Material::ALL.into_iter().map(|m| (m, 0)).collect(),
        }
    }

    /// Rebuilds a ledger by replaying events in the given order.
    ///
    /// Credits are re-derived from the catalog, so a replayed ledger always
    /// agrees with the current credit table.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = (Material, DateTime<Utc>)>,
    {
        let mut ledger = Self::new();
        for (material, at) in events {
            ledger.record(material, at);
        }
        ledger
    }

    /// Records one detection and returns the created event.
    pub fn record(&mut self, material: Material, at: DateTime<Utc>) -> DetectionEvent {
        let event = DetectionEvent::new(material, at);
        self.history.push(event);
        *self.counts.entry(material).or_insert(0) += 1;
        tracing::debug!(%material, credits = event.credits, "recorded detection");
        event
    }

    /// Records a detection from a free-form label.
    ///
    /// Labels outside the catalog are rejected and leave the ledger untouched.
    pub fn try_record(
        &mut self,
        label: &str,
        at: DateTime<Utc>,
    ) -> Result<DetectionEvent, UnknownMaterial> {
        let material: Material = label.parse()?;
        Ok(self.record(material, at))
    }

    /// Cumulative count per material, including zeros.
    pub fn counts(&self) -> &BTreeMap<Material, u64> {
        &self.counts
    }

    /// Count for a single material.
    pub fn count(&self, material: Material) -> u64 {
        self.counts.get(&material).copied().unwrap_or(0)
    }

    /// Full event log in arrival order.
    pub fn history(&self) -> &[DetectionEvent] {
        &self.history
    }

    /// Running credit total over the material's events, in arrival order.
    pub fn cumulative_credits(&self, material: Material) -> Vec<u64> {
        cumulative_credits(&self.history, material)
    }

    /// Sum of credits across every recorded event.
    pub fn total_credits(&self) -> u64 {
        self.history.iter().map(|e| u64::from(e.credits)).sum()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Owned copy of counts and history taken in one step.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            counts: self.counts.clone(),
            history: self.history.clone(),
        }
    }
}

/// Point-in-time copy of a ledger for readers outside the capture loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub counts: BTreeMap<Material, u64>,
    pub history: Vec<DetectionEvent>,
}

/// Prefix sum of credits over the events matching `material`.
pub fn cumulative_credits(history: &[DetectionEvent], material: Material) -> Vec<u64> {
    history
        .iter()
        .filter(|e| e.material == material)
        .scan(0_u64, |total, e| {
            *total += u64::from(e.credits);
            Some(*total)
        })
        .collect()
}
