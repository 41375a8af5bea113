//! Core events emitted by the engine

use chrono::{DateTime, Local, NaiveDate};
use rollcall_api::{AuthorizationStatus, Verdict};
use rollcall_util::{MeetingId, RunId};

/// Events emitted by the core engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A daily agenda was applied (configure or midnight rollover)
    AgendaApplied {
        run_id: RunId,
        day: NaiveDate,
        meeting_count: usize,
    },

    /// Location permission changed
    AuthorizationChanged {
        status: AuthorizationStatus,
    },

    /// Qualifying entry, dwell clock started
    DwellStarted {
        meeting_id: MeetingId,
        entered_at: DateTime<Local>,
    },

    /// Dwell clock stopped before confirmation
    DwellAbandoned {
        meeting_id: MeetingId,
    },

    /// Terminal verdict. Emitted once per meeting per day.
    VerdictReached {
        meeting_id: MeetingId,
        verdict: Verdict,
        at: DateTime<Local>,
    },
}
