//! Per-meeting attendance state machine

use chrono::{DateTime, Local, NaiveDate};
use rollcall_api::{LocationSample, Meeting, MeetingStatus, MeetingView, Verdict};
use rollcall_config::EngineParams;
use rollcall_util::to_chrono;

use crate::{MonitoringWindow, TimerHandle};

/// Where a meeting stands today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceState {
    /// Not inside the region during the gate
    Idle,

    /// Inside the region during the gate, accumulating dwell time
    Confirming {
        entered_at: DateTime<Local>,
        dwell_timer: TimerHandle,
    },

    /// Terminal for this occurrence
    Decided {
        verdict: Verdict,
        at: DateTime<Local>,
    },
}

/// Runtime state for one agenda meeting on one day
#[derive(Debug, Clone)]
pub struct MeetingRuntime {
    pub meeting: Meeting,
    pub day: NaiveDate,
    pub window: MonitoringWindow,
    pub state: AttendanceState,
    pub finalize_timer: Option<TimerHandle>,
}

impl MeetingRuntime {
    pub fn new(meeting: Meeting, window: MonitoringWindow) -> Self {
        Self {
            day: window.occurrence.day(),
            meeting,
            window,
            state: AttendanceState::Idle,
            finalize_timer: None,
        }
    }

    /// Runtime for a meeting the ledger already holds a verdict for
    pub fn decided(meeting: Meeting, window: MonitoringWindow, verdict: Verdict, at: DateTime<Local>) -> Self {
        Self {
            state: AttendanceState::Decided { verdict, at },
            ..Self::new(meeting, window)
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, AttendanceState::Decided { .. })
    }

    pub fn is_confirming(&self) -> bool {
        matches!(self.state, AttendanceState::Confirming { .. })
    }

    pub fn entered_at(&self) -> Option<DateTime<Local>> {
        match self.state {
            AttendanceState::Confirming { entered_at, .. } => Some(entered_at),
            _ => None,
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self.state {
            AttendanceState::Decided { verdict, .. } => Some(verdict),
            _ => None,
        }
    }

    /// Reported status; an idle meeting with a live geofence is `Watching`
    pub fn status(&self, region_registered: bool) -> MeetingStatus {
        match self.state {
            AttendanceState::Idle if region_registered => MeetingStatus::Watching,
            AttendanceState::Idle => MeetingStatus::Idle,
            AttendanceState::Confirming { .. } => MeetingStatus::Confirming,
            AttendanceState::Decided { verdict: Verdict::Present, .. } => MeetingStatus::Present,
            AttendanceState::Decided { verdict: Verdict::Absent, .. } => MeetingStatus::Absent,
        }
    }

    /// Idle -> Confirming. Ignored unless idle.
    pub fn begin_dwell(&mut self, entered_at: DateTime<Local>, dwell_timer: TimerHandle) -> bool {
        if self.state != AttendanceState::Idle {
            return false;
        }
        self.state = AttendanceState::Confirming { entered_at, dwell_timer };
        true
    }

    /// Confirming -> Idle. Returns the dwell timer to cancel.
    pub fn abandon_dwell(&mut self) -> Option<TimerHandle> {
        match self.state {
            AttendanceState::Confirming { dwell_timer, .. } => {
                self.state = AttendanceState::Idle;
                Some(dwell_timer)
            }
            _ => None,
        }
    }

    /// Whether a confirming meeting has dwelled long enough at `now`
    pub fn dwell_satisfied(&self, now: DateTime<Local>, params: &EngineParams) -> bool {
        self.entered_at()
            .is_some_and(|entered_at| now - entered_at >= to_chrono(params.dwell_required))
    }

    /// Move to a terminal state. Returns false if a verdict already exists.
    ///
    /// Callers cancel any dwell timer through [`Self::abandon_dwell`] first.
    pub fn decide(&mut self, verdict: Verdict, at: DateTime<Local>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = AttendanceState::Decided { verdict, at };
        true
    }

    /// Whether a sample is consistent with being inside this meeting's region
    pub fn sample_qualifies(&self, sample: &LocationSample, params: &EngineParams) -> bool {
        sample_qualifies(&self.meeting, sample, params)
    }

    pub fn view(&self, region_registered: bool) -> MeetingView {
        MeetingView {
            meeting_id: self.meeting.id.clone(),
            name: self.meeting.name.clone(),
            status: self.status(region_registered),
            gate_open: self.window.gate_open,
            gate_close: self.window.gate_close,
            entered_at: self.entered_at(),
            region_registered,
        }
    }
}

/// Accuracy, speed and distance filter for location samples.
pub fn sample_qualifies(meeting: &Meeting, sample: &LocationSample, params: &EngineParams) -> bool {
    sample.is_usable(&params.sample_limits())
        && meeting.center.distance_to(&sample.coordinate) <= meeting.radius_meters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TimerKind, TimerQueue, window_on};
    use chrono::{TimeZone, Weekday};
    use rollcall_api::Coordinate;
    use rollcall_util::{MeetingId, WallClock};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 30, hour, minute, second).unwrap()
    }

    fn runtime() -> MeetingRuntime {
        let meeting = Meeting {
            id: MeetingId::new("cs-331"),
            name: "Computer Engineering 331".into(),
            center: Coordinate::new(42.0267, -93.6465),
            radius_meters: 80.0,
            weekday: Weekday::Tue,
            start: WallClock::new(10, 0).unwrap(),
            end: WallClock::new(10, 50).unwrap(),
            cost: Some(312.5),
        };
        let params = EngineParams::default();
        let window = window_on(&meeting, at(0, 0, 0).date_naive(), &params).unwrap();
        MeetingRuntime::new(meeting, window)
    }

    fn handle() -> TimerHandle {
        TimerQueue::new().schedule_at(TimerKind::Rollover, at(0, 0, 0))
    }

    #[test]
    fn status_reflects_registration() {
        let rt = runtime();
        assert_eq!(rt.status(false), MeetingStatus::Idle);
        assert_eq!(rt.status(true), MeetingStatus::Watching);
        assert_eq!(rt.day, at(0, 0, 0).date_naive());
    }

    #[test]
    fn dwell_lifecycle() {
        let params = EngineParams::default();
        let mut rt = runtime();
        let timer = handle();

        assert!(rt.begin_dwell(at(9, 55, 0), timer));
        assert!(!rt.begin_dwell(at(9, 56, 0), timer));
        assert_eq!(rt.entered_at(), Some(at(9, 55, 0)));
        assert_eq!(rt.status(true), MeetingStatus::Confirming);

        assert!(!rt.dwell_satisfied(at(10, 11, 39), &params));
        assert!(rt.dwell_satisfied(at(10, 11, 40), &params));

        assert_eq!(rt.abandon_dwell(), Some(timer));
        assert_eq!(rt.state, AttendanceState::Idle);
        assert_eq!(rt.abandon_dwell(), None);
        assert!(!rt.dwell_satisfied(at(10, 30, 0), &params));
    }

    #[test]
    fn decide_is_terminal_and_once() {
        let mut rt = runtime();
        let timer = handle();
        rt.begin_dwell(at(9, 55, 0), timer);

        assert_eq!(rt.abandon_dwell(), Some(timer));
        assert!(rt.decide(Verdict::Present, at(10, 11, 40)));
        assert!(rt.is_terminal());
        assert_eq!(rt.verdict(), Some(Verdict::Present));

        assert!(!rt.decide(Verdict::Absent, at(10, 50, 0)));
        assert_eq!(rt.verdict(), Some(Verdict::Present));
        assert!(!rt.begin_dwell(at(10, 55, 0), timer));
        assert_eq!(rt.status(false), MeetingStatus::Present);
    }

    #[test]
    fn sample_filter() {
        let params = EngineParams::default();
        let rt = runtime();
        let inside = Coordinate::new(42.0268, -93.6465);

        assert!(rt.sample_qualifies(&LocationSample::new(inside, 10.0, 0.5), &params));
        assert!(rt.sample_qualifies(&LocationSample::new(inside, 10.0, -1.0), &params));

        // Invalid or too coarse
        assert!(!rt.sample_qualifies(&LocationSample::new(inside, -1.0, 0.5), &params));
        assert!(!rt.sample_qualifies(&LocationSample::new(inside, 51.0, 0.5), &params));
        // Moving through
        assert!(!rt.sample_qualifies(&LocationSample::new(inside, 10.0, 9.0), &params));
        // Outside the radius
        let outside = Coordinate::new(42.03, -93.6465);
        assert!(!rt.sample_qualifies(&LocationSample::new(outside, 10.0, 0.5), &params));
    }

    #[test]
    fn view_carries_gate() {
        let rt = runtime();
        let view = rt.view(true);
        assert_eq!(view.gate_open, at(9, 50, 0));
        assert_eq!(view.gate_close, at(10, 50, 0));
        assert_eq!(view.status, MeetingStatus::Watching);
        assert!(view.entered_at.is_none());
    }
}
