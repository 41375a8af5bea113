//! SQLite ledger and audit log

use chrono::{DateTime, Local, NaiveDate};
use rollcall_api::Verdict;
use rollcall_util::MeetingId;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, RecordOutcome, Store, StoreError, StoreResult, VerdictRecord};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Attendance ledger: one verdict per meeting per day
            CREATE TABLE IF NOT EXISTS attendance (
                meeting_id TEXT NOT NULL,
                day TEXT NOT NULL,
                label TEXT NOT NULL,
                verdict TEXT NOT NULL,
                decided_at TEXT NOT NULL,
                cost REAL,
                PRIMARY KEY (meeting_id, day)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_attendance_day ON attendance(day);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| rollcall_util::now())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String, Option<f64>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_record(
    (meeting_id, day, label, verdict, decided_at, cost): (String, String, String, String, String, Option<f64>),
) -> StoreResult<VerdictRecord> {
    let day = NaiveDate::parse_from_str(&day, DAY_FORMAT)
        .map_err(|e| StoreError::Serialization(format!("bad ledger day '{}': {}", day, e)))?;
    let verdict: Verdict = verdict.parse().map_err(StoreError::Serialization)?;

    Ok(VerdictRecord {
        meeting_id: MeetingId::new(meeting_id),
        day,
        label,
        verdict,
        decided_at: parse_timestamp(&decided_at),
        cost,
    })
}

const RECORD_COLUMNS: &str = "meeting_id, day, label, verdict, decided_at, cost";

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?")?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, timestamp, json)| -> StoreResult<AuditEvent> {
                Ok(AuditEvent {
                    id,
                    timestamp: parse_timestamp(&timestamp),
                    event: serde_json::from_str(&json)?,
                })
            })
            .collect()
    }

    fn record_verdict(&self, record: &VerdictRecord) -> StoreResult<RecordOutcome> {
        let conn = self.conn()?;
        let day_str = record.day.format(DAY_FORMAT).to_string();

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO attendance (meeting_id, day, label, verdict, decided_at, cost)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.meeting_id.as_str(),
                day_str,
                record.label,
                record.verdict.as_str(),
                record.decided_at.to_rfc3339(),
                record.cost,
            ],
        )?;

        if inserted == 0 {
            warn!(
                meeting_id = %record.meeting_id,
                day = %day_str,
                verdict = %record.verdict,
                "Duplicate verdict ignored"
            );
            return Ok(RecordOutcome::Duplicate);
        }

        debug!(meeting_id = %record.meeting_id, day = %day_str, verdict = %record.verdict, "Verdict recorded");
        Ok(RecordOutcome::Recorded)
    }

    fn get_verdict(&self, meeting_id: &MeetingId, day: NaiveDate) -> StoreResult<Option<VerdictRecord>> {
        let conn = self.conn()?;
        let day_str = day.format(DAY_FORMAT).to_string();

        let row = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE meeting_id = ? AND day = ?"),
                params![meeting_id.as_str(), day_str],
                row_to_record,
            )
            .optional()?;

        row.map(decode_record).transpose()
    }

    fn verdicts_for_day(&self, day: NaiveDate) -> StoreResult<Vec<VerdictRecord>> {
        let conn = self.conn()?;
        let day_str = day.format(DAY_FORMAT).to_string();

        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance WHERE day = ? ORDER BY rowid"
        ))?;
        let rows = stmt.query_map([day_str], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode_record(row?)?);
        }
        Ok(records)
    }

    fn recent_verdicts(&self, limit: usize) -> StoreResult<Vec<VerdictRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance ORDER BY rowid DESC LIMIT ?"
        ))?;
        let rows = stmt.query_map([limit as i64], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode_record(row?)?);
        }
        Ok(records)
    }
}
