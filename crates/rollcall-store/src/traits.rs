//! Store trait definitions

use chrono::{DateTime, Local, NaiveDate};
use rollcall_api::Verdict;
use rollcall_util::MeetingId;
use serde::{Deserialize, Serialize};

use crate::{AuditEvent, StoreResult};

/// Main store trait
///
/// The ledger half of this trait is the sink for attendance verdicts.
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Attendance ledger

    /// Record a verdict. A second verdict for the same meeting and day is
    /// ignored and reported as [`RecordOutcome::Duplicate`].
    fn record_verdict(&self, record: &VerdictRecord) -> StoreResult<RecordOutcome>;

    /// Get the verdict for a meeting on a specific day
    fn get_verdict(&self, meeting_id: &MeetingId, day: NaiveDate) -> StoreResult<Option<VerdictRecord>>;

    /// All verdicts for a day, in decision order
    fn verdicts_for_day(&self, day: NaiveDate) -> StoreResult<Vec<VerdictRecord>>;

    /// Most recent verdicts, newest first
    fn recent_verdicts(&self, limit: usize) -> StoreResult<Vec<VerdictRecord>>;
}

/// One attendance ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub meeting_id: MeetingId,
    pub day: NaiveDate,
    pub label: String,
    pub verdict: Verdict,
    pub decided_at: DateTime<Local>,
    pub cost: Option<f64>,
}

/// Result of recording a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Duplicate,
}
