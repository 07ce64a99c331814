//! Run history storage
//!
//! A run is written once, after it reaches a terminal state, and is read back
//! only for replay. Structured parts (plan, log, artifacts) are stored as JSON.

use super::Database;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

// ============================================================================
// Data Types
// ============================================================================

/// Terminal status of a stored run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Finished,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Finished => write!(f, "finished"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "finished" => Ok(RunStatus::Finished),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            _ => Err(anyhow!("Unknown run status: {}", s)),
        }
    }
}

/// A finished run as stored in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub goal: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub uploaded_file: Option<serde_json::Value>,
    pub plan: serde_json::Value,
    pub log: serde_json::Value,
    pub scratchpad: String,
    pub artifacts: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Summary view of a run (for listing)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub goal: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp in history: {}", value))?
        .with_timezone(&Utc))
}

fn parse_json_column(value: &str, column: &str) -> Result<serde_json::Value> {
    serde_json::from_str(value).with_context(|| format!("Invalid JSON in column {}", column))
}

/// Raw column values, decoded outside the rusqlite row callback so that
/// decode failures surface as regular errors
struct RawRunRow {
    id: String,
    goal: String,
    status: String,
    started_at: String,
    completed_at: String,
    duration_ms: i64,
    uploaded_file: Option<String>,
    plan: String,
    log: String,
    scratchpad: String,
    artifacts: Option<String>,
    error: Option<String>,
}

impl RawRunRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            goal: row.get(1)?,
            status: row.get(2)?,
            started_at: row.get(3)?,
            completed_at: row.get(4)?,
            duration_ms: row.get(5)?,
            uploaded_file: row.get(6)?,
            plan: row.get(7)?,
            log: row.get(8)?,
            scratchpad: row.get(9)?,
            artifacts: row.get(10)?,
            error: row.get(11)?,
        })
    }

    fn decode(self) -> Result<RunRecord> {
        Ok(RunRecord {
            id: self.id,
            goal: self.goal,
            status: self.status.parse()?,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: parse_timestamp(&self.completed_at)?,
            duration_ms: self.duration_ms,
            uploaded_file: self
                .uploaded_file
                .as_deref()
                .map(|v| parse_json_column(v, "uploaded_file"))
                .transpose()?,
            plan: parse_json_column(&self.plan, "plan")?,
            log: parse_json_column(&self.log, "log")?,
            scratchpad: self.scratchpad,
            artifacts: self
                .artifacts
                .as_deref()
                .map(|v| parse_json_column(v, "artifacts"))
                .transpose()?,
            error: self.error,
        })
    }
}

// ============================================================================
// Database Operations
// ============================================================================

impl Database {
    /// Save a finished run (replaces an existing record with the same id)
    pub fn save_run(&self, record: &RunRecord) -> Result<()> {
        let uploaded_file = record
            .uploaded_file
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let plan = serde_json::to_string(&record.plan)?;
        let log = serde_json::to_string(&record.log)?;
        let artifacts = record
            .artifacts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO runs (
                id, goal, status, started_at, completed_at, duration_ms,
                uploaded_file, plan, log, scratchpad, artifacts, error
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            (
                &record.id,
                &record.goal,
                record.status.to_string(),
                record.started_at.to_rfc3339(),
                record.completed_at.to_rfc3339(),
                record.duration_ms,
                uploaded_file,
                plan,
                log,
                &record.scratchpad,
                artifacts,
                &record.error,
            ),
        )
        .context("Failed to save run")?;

        tracing::debug!(run_id = %record.id, status = %record.status, "Saved run");
        Ok(())
    }

    /// Get a run by ID
    pub fn get_run(&self, id: &str) -> Result<Option<RunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, goal, status, started_at, completed_at, duration_ms,
                   uploaded_file, plan, log, scratchpad, artifacts, error
            FROM runs
            WHERE id = ?1
            "#,
        )?;

        match stmt.query_row([id], RawRunRow::from_row) {
            Ok(raw) => raw.decode().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List the most recent runs, newest first
    pub fn list_runs(&self, limit: u32) -> Result<Vec<RunSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, goal, status, started_at, duration_ms
            FROM runs
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, goal, status, started_at, duration_ms)| {
                Ok(RunSummary {
                    id,
                    goal,
                    status: status.parse()?,
                    started_at: parse_timestamp(&started_at)?,
                    duration_ms,
                })
            })
            .collect()
    }

    /// Delete every stored run, returning how many were removed
    pub fn clear_runs(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM runs", [])?;
        Ok(removed)
    }
}
