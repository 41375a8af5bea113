//! Audit event types

use chrono::{DateTime, Local, NaiveDate};
use rollcall_api::{AuthorizationStatus, Verdict};
use rollcall_util::{MeetingId, RunId};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// A new daily agenda was applied (configure or day rollover)
    AgendaApplied {
        run_id: RunId,
        day: NaiveDate,
        catalog_size: usize,
        agenda_size: usize,
    },

    /// Location permission changed
    AuthorizationChanged { status: AuthorizationStatus },

    /// Geofence registered with the location service
    RegionRegistered { meeting_id: MeetingId },

    /// Geofence removed from the location service
    RegionReleased { meeting_id: MeetingId },

    /// Qualifying region entry, dwell clock started
    DwellStarted { meeting_id: MeetingId },

    /// Region exit before dwell was confirmed
    DwellAbandoned { meeting_id: MeetingId },

    /// Terminal verdict reached
    VerdictReached {
        meeting_id: MeetingId,
        verdict: Verdict,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self::at(event, rollcall_util::now())
    }

    /// Create an event stamped with an explicit time (engine clock)
    pub fn at(event: AuditEventType, timestamp: DateTime<Local>) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp,
            event,
        }
    }
}
