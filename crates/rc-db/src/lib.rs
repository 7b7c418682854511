//! Storage layer for the recycling assistant.
//!
//! Archives finished capture and manual-entry sessions, their detections and
//! the user's recycling goals using `rusqlite`. The live ledger is never
//! written mid-session; a session's history is archived in one transaction
//! once the session ends, and views over past sessions are rebuilt by
//! replaying archived detections into a fresh ledger.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Share it across threads behind a `Mutex` or open one instance per thread.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC (e.g. `2025-01-15T10:30:00.000Z`),
//! so lexicographic order matches chronological order. Detections keep their
//! arrival order through the `seq` column, never through their timestamps.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rc_core::{DetectionEvent, DetectionLedger, Material, UnknownMaterial};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in session {session_id}: {timestamp}")]
    TimestampParse {
        session_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored material label is outside the catalog.
    #[error("invalid material in session {session_id}: {source}")]
    InvalidMaterial {
        session_id: String,
        #[source]
        source: UnknownMaterial,
    },
    /// A stored session kind is not recognized.
    #[error("invalid session kind: {0}")]
    InvalidSessionKind(String),
    /// The requested session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// A session ID prefix matches more than one session.
    #[error("session ID {prefix} is ambiguous ({matches} sessions match)")]
    AmbiguousSession { prefix: String, matches: usize },
    /// A goal target must be positive.
    #[error("goal target must be greater than zero")]
    InvalidGoalTarget,
}

/// How a session's detections were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Live capture over a frame feed.
    Camera,
    /// A single still image.
    Snapshot,
    /// Items logged by hand.
    Manual,
}

impl SessionKind {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Snapshot => "snapshot",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for SessionKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "camera" => Ok(Self::Camera),
            "snapshot" => Ok(Self::Snapshot),
            "manual" => Ok(Self::Manual),
            _ => Err(DbError::InvalidSessionKind(s.to_string())),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// An archived session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub kind: SessionKind,
    pub device: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub frames: i64,
    pub stop_reason: Option<String>,
    pub error: Option<String>,
}

/// An archived detection, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionRecord {
    pub session_id: String,
    pub seq: i64,
    pub timestamp: String,
    pub material: String,
    pub credits: i64,
}

/// A session together with its detection count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session: SessionRecord,
    pub detections: i64,
    pub credits: i64,
}

/// A per-material item target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalRecord {
    pub material: Material,
    pub target: i64,
    pub updated_at: String,
}

/// Which detections a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Every archived session.
    All,
    /// One session by ID.
    Session(&'a str),
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                device TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                frames INTEGER DEFAULT 0,
                stop_reason TEXT,
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at);

            -- Detections keep arrival order through seq, per session.
            -- material: lower-case catalog label (e.g. 'plastic')
            CREATE TABLE IF NOT EXISTS detections (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                material TEXT NOT NULL,
                credits INTEGER NOT NULL,
                PRIMARY KEY (session_id, seq),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_detections_material ON detections(material);

            CREATE TABLE IF NOT EXISTS goals (
                material TEXT PRIMARY KEY,
                target INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Archives a finished session and its history in one transaction.
    ///
    /// Returns the number of detections written.
    pub fn insert_session(
        &mut self,
        session: &SessionRecord,
        history: &[DetectionEvent],
    ) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO sessions (id, kind, device, started_at, ended_at, frames, stop_reason, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                session.id,
                session.kind.as_str(),
                session.device,
                session.started_at,
                session.ended_at,
                session.frames,
                session.stop_reason,
                session.error,
            ],
        )?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO detections (session_id, seq, timestamp, material, credits)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for (seq, event) in (0_i64..).zip(history) {
                inserted += stmt.execute(params![
                    session.id,
                    seq,
                    format_timestamp(event.timestamp),
                    event.material.as_str(),
                    i64::from(event.credits),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(session = %session.id, detections = inserted, "archived session");
        Ok(inserted)
    }

    /// Lists sessions, oldest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT s.id, s.kind, s.device, s.started_at, s.ended_at, s.frames, s.stop_reason, s.error,
                   COUNT(d.seq), COALESCE(SUM(d.credits), 0)
            FROM sessions s
            LEFT JOIN detections d ON d.session_id = s.id
            GROUP BY s.id
            ORDER BY s.started_at ASC, s.id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                RawSession {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    device: row.get(2)?,
                    started_at: row.get(3)?,
                    ended_at: row.get(4)?,
                    frames: row.get(5)?,
                    stop_reason: row.get(6)?,
                    error: row.get(7)?,
                },
                row.get::<_, i64>(8)?,
                row.get::<_, i64>(9)?,
            ))
        })?;
        let mut sessions = Vec::new();
        for row in rows {
            let (raw, detections, credits) = row?;
            sessions.push(SessionSummary {
                session: raw.into_record()?,
                detections,
                credits,
            });
        }
        Ok(sessions)
    }

    /// Returns a single session by ID.
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, DbError> {
        let raw = self
            .conn
            .query_row(
                "
                SELECT id, kind, device, started_at, ended_at, frames, stop_reason, error
                FROM sessions WHERE id = ?
                ",
                [id],
                |row| {
                    Ok(RawSession {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        device: row.get(2)?,
                        started_at: row.get(3)?,
                        ended_at: row.get(4)?,
                        frames: row.get(5)?,
                        stop_reason: row.get(6)?,
                        error: row.get(7)?,
                    })
                },
            )
            .optional()?;
        raw.map(RawSession::into_record).transpose()
    }

    /// Resolves a full session ID from a unique prefix of it.
    ///
    /// An exact match always wins, so a full ID never counts as ambiguous.
    pub fn resolve_session_id(&self, prefix: &str) -> Result<String, DbError> {
        if prefix.is_empty() {
            return Err(DbError::SessionNotFound(String::new()));
        }
        let mut stmt = self.conn.prepare(
            "SELECT id FROM sessions WHERE substr(id, 1, length(?1)) = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([prefix], |row| row.get::<_, String>(0))?;
        let mut matches = Vec::new();
        for row in rows {
            matches.push(row?);
        }

        if matches.iter().any(|id| id == prefix) {
            return Ok(prefix.to_string());
        }
        match matches.len() {
            0 => Err(DbError::SessionNotFound(prefix.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(DbError::AmbiguousSession {
                prefix: prefix.to_string(),
                matches: n,
            }),
        }
    }

    /// Returns the most recently started session.
    pub fn latest_session(&self) -> Result<Option<SessionRecord>, DbError> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM sessions ORDER BY started_at DESC, id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_session(&id),
            None => Ok(None),
        }
    }

    /// Counts archived sessions.
    pub fn session_count(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    /// Lists detections in arrival order: sessions oldest first, then `seq`.
    pub fn list_detections(&self, scope: Scope<'_>) -> Result<Vec<DetectionRecord>, DbError> {
        if let Scope::Session(id) = scope {
            if self.get_session(id)?.is_none() {
                return Err(DbError::SessionNotFound(id.to_string()));
            }
        }
        let session_filter = match scope {
            Scope::All => None,
            Scope::Session(id) => Some(id),
        };
        let mut stmt = self.conn.prepare(
            "
            SELECT d.session_id, d.seq, d.timestamp, d.material, d.credits
            FROM detections d
            JOIN sessions s ON s.id = d.session_id
            WHERE ?1 IS NULL OR d.session_id = ?1
            ORDER BY s.started_at ASC, s.id ASC, d.seq ASC
            ",
        )?;
        let rows = stmt.query_map([session_filter], |row| {
            Ok(DetectionRecord {
                session_id: row.get(0)?,
                seq: row.get(1)?,
                timestamp: row.get(2)?,
                material: row.get(3)?,
                credits: row.get(4)?,
            })
        })?;
        let mut detections = Vec::new();
        for row in rows {
            detections.push(row?);
        }
        Ok(detections)
    }

    /// Rebuilds a ledger by replaying archived detections in arrival order.
    pub fn load_ledger(&self, scope: Scope<'_>) -> Result<DetectionLedger, DbError> {
        let records = self.list_detections(scope)?;
        let mut events = Vec::with_capacity(records.len());
        for record in &records {
            let material = record
                .material
                .parse::<Material>()
                .map_err(|source| DbError::InvalidMaterial {
                    session_id: record.session_id.clone(),
                    source,
                })?;
            let timestamp = parse_timestamp(&record.timestamp, &record.session_id)?;
            events.push((material, timestamp));
        }
        Ok(DetectionLedger::from_events(events))
    }

    /// Item count per material across every archived session.
    pub fn material_totals(&self) -> Result<BTreeMap<Material, i64>, DbError> {
        let mut totals: BTreeMap<Material, i64> = Material::ALL.into_iter().map(|m| (m, 0)).collect();
        let mut stmt = self
            .conn
            .prepare("SELECT material, COUNT(*) FROM detections GROUP BY material")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (label, count) = row?;
            match label.parse::<Material>() {
                Ok(material) => {
                    totals.insert(material, count);
                }
                Err(err) => tracing::warn!(error = %err, "skipping detections with unknown material"),
            }
        }
        Ok(totals)
    }

    /// Sets or replaces the item target for a material.
    pub fn set_goal(&mut self, material: Material, target: i64) -> Result<(), DbError> {
        if target <= 0 {
            return Err(DbError::InvalidGoalTarget);
        }
        self.conn.execute(
            "
            INSERT INTO goals (material, target, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(material) DO UPDATE SET
                target = excluded.target,
                updated_at = excluded.updated_at
            ",
            params![material.as_str(), target, format_timestamp(Utc::now())],
        )?;
        Ok(())
    }

    /// Removes a material's goal; returns whether one existed.
    pub fn clear_goal(&mut self, material: Material) -> Result<bool, DbError> {
        let removed = self
            .conn
            .execute("DELETE FROM goals WHERE material = ?", [material.as_str()])?;
        Ok(removed > 0)
    }

    /// Removes every goal and returns how many there were.
    pub fn clear_goals(&mut self) -> Result<usize, DbError> {
        Ok(self.conn.execute("DELETE FROM goals", [])?)
    }

    /// Lists goals in catalog order.
    pub fn list_goals(&self) -> Result<Vec<GoalRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT material, target, updated_at FROM goals")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut goals = Vec::new();
        for row in rows {
            let (label, target, updated_at) = row?;
            let material = label
                .parse::<Material>()
                .map_err(|source| DbError::InvalidMaterial {
                    session_id: "goals".to_string(),
                    source,
                })?;
            goals.push(GoalRecord {
                material,
                target,
                updated_at,
            });
        }
        goals.sort_by_key(|g| g.material);
        Ok(goals)
    }
}

#[derive(Debug)]
struct RawSession {
    id: String,
    kind: String,
    device: Option<String>,
    started_at: String,
    ended_at: Option<String>,
    frames: i64,
    stop_reason: Option<String>,
    error: Option<String>,
}

impl RawSession {
    fn into_record(self) -> Result<SessionRecord, DbError> {
        Ok(SessionRecord {
            kind: self.kind.parse()?,
            id: self.id,
            device: self.device,
            started_at: self.started_at,
            ended_at: self.ended_at,
            frames: self.frames,
            stop_reason: self.stop_reason,
            error: self.error,
        })
    }
}

fn parse_timestamp(timestamp: &str, session_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            session_id: session_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

/// Formats a timestamp the way the database stores it.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
