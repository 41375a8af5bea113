//! Gate window calculation
//!
//! Everything here is a pure function of the meeting, a reference instant
//! and the engine parameters. The state machine and the finalization timer
//! both derive window boundaries from these functions independently, so
//! identical inputs must always produce identical outputs.

use chrono::{DateTime, Datelike, Local, NaiveDate};
use rollcall_api::Meeting;
use rollcall_config::EngineParams;
use rollcall_util::to_chrono;

/// Days scanned for an occurrence: yesterday (for gates still open after
/// midnight) through a full week ahead.
const SCAN_DAYS: usize = 9;

/// One concrete occurrence of a weekly meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl Occurrence {
    /// Calendar day the occurrence belongs to (the ledger key)
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

/// Occurrence widened by lead-in and grace-out. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringWindow {
    pub occurrence: Occurrence,
    pub gate_open: DateTime<Local>,
    pub gate_close: DateTime<Local>,
}

impl MonitoringWindow {
    fn around(occurrence: Occurrence, params: &EngineParams) -> Self {
        Self {
            occurrence,
            gate_open: occurrence.start - to_chrono(params.lead_in),
            gate_close: occurrence.end + to_chrono(params.grace_out),
        }
    }

    pub fn contains(&self, instant: DateTime<Local>) -> bool {
        self.gate_open <= instant && instant <= self.gate_close
    }

    /// Whether any part of the gate falls within `[from, to]`
    pub fn overlaps(&self, from: DateTime<Local>, to: DateTime<Local>) -> bool {
        self.gate_open <= to && self.gate_close >= from
    }
}

/// The occurrence of `meeting` on `date`, if the meeting is held that day
/// and its times resolve to real local instants.
pub fn occurrence_on(meeting: &Meeting, date: NaiveDate) -> Option<Occurrence> {
    if date.weekday() != meeting.weekday || !meeting.has_valid_times() {
        return None;
    }

    let start = meeting.start.on_date(date)?;
    let end = meeting.end.on_date(date)?;
    (start < end).then_some(Occurrence { start, end })
}

/// The gated window for the occurrence on `date`
pub fn window_on(meeting: &Meeting, date: NaiveDate, params: &EngineParams) -> Option<MonitoringWindow> {
    occurrence_on(meeting, date).map(|occurrence| MonitoringWindow::around(occurrence, params))
}

fn soonest_occurrence(
    meeting: &Meeting,
    reference: DateTime<Local>,
    slack: chrono::Duration,
) -> Option<Occurrence> {
    if !meeting.has_valid_times() {
        return None;
    }

    let first = reference.date_naive().pred_opt()?;
    first
        .iter_days()
        .take(SCAN_DAYS)
        .filter_map(|date| occurrence_on(meeting, date))
        .find(|occurrence| occurrence.end + slack >= reference)
}

/// The soonest occurrence that has not yet ended at `reference`.
///
/// If `reference` falls inside a meeting, that meeting's occurrence is
/// returned. Returns `None` for malformed meetings.
pub fn next_occurrence(meeting: &Meeting, reference: DateTime<Local>) -> Option<Occurrence> {
    soonest_occurrence(meeting, reference, chrono::Duration::zero())
}

/// The soonest window whose gate has not yet closed at `reference`
pub fn monitoring_window(
    meeting: &Meeting,
    reference: DateTime<Local>,
    params: &EngineParams,
) -> Option<MonitoringWindow> {
    soonest_occurrence(meeting, reference, to_chrono(params.grace_out))
        .map(|occurrence| MonitoringWindow::around(occurrence, params))
}

/// Whether `instant` falls inside the gate of the occurrence nearest it
pub fn in_window(meeting: &Meeting, instant: DateTime<Local>, params: &EngineParams) -> bool {
    monitoring_window(meeting, instant, params).is_some_and(|window| window.contains(instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};
    use rollcall_api::Coordinate;
    use rollcall_util::{MeetingId, WallClock};
    use std::time::Duration;

    // 2025-12-30 is a Tuesday
    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, day, hour, minute, second).unwrap()
    }

    fn tuesday_class() -> Meeting {
        Meeting {
            id: MeetingId::new("cs-331"),
            name: "Computer Engineering 331".into(),
            center: Coordinate::new(42.0267, -93.6465),
            radius_meters: 80.0,
            weekday: Weekday::Tue,
            start: WallClock::new(10, 0).unwrap(),
            end: WallClock::new(10, 50).unwrap(),
            cost: None,
        }
    }

    #[test]
    fn next_occurrence_same_day_before_start() {
        let occ = next_occurrence(&tuesday_class(), at(30, 8, 0, 0)).unwrap();
        assert_eq!(occ.start, at(30, 10, 0, 0));
        assert_eq!(occ.end, at(30, 10, 50, 0));
        assert_eq!(occ.day(), NaiveDate::from_ymd_opt(2025, 12, 30).unwrap());
    }

    #[test]
    fn next_occurrence_during_meeting_is_current() {
        let occ = next_occurrence(&tuesday_class(), at(30, 10, 30, 0)).unwrap();
        assert_eq!(occ.start, at(30, 10, 0, 0));

        // End instant itself still counts as current
        let occ = next_occurrence(&tuesday_class(), at(30, 10, 50, 0)).unwrap();
        assert_eq!(occ.start, at(30, 10, 0, 0));
    }

    #[test]
    fn next_occurrence_rolls_over_week() {
        let occ = next_occurrence(&tuesday_class(), at(30, 11, 0, 0)).unwrap();
        assert_eq!(occ.start, Local.with_ymd_and_hms(2026, 1, 6, 10, 0, 0).unwrap());

        // From a Wednesday
        let occ = next_occurrence(&tuesday_class(), at(31, 9, 0, 0)).unwrap();
        assert_eq!(occ.start, Local.with_ymd_and_hms(2026, 1, 6, 10, 0, 0).unwrap());
    }

    #[test]
    fn monitoring_window_applies_lead_in_and_grace() {
        let mut params = EngineParams::default();
        params.grace_out = Duration::from_secs(5 * 60);

        let window = monitoring_window(&tuesday_class(), at(30, 9, 0, 0), &params).unwrap();
        assert_eq!(window.gate_open, at(30, 9, 50, 0));
        assert_eq!(window.gate_close, at(30, 10, 55, 0));

        // During grace the same occurrence is still current
        let window = monitoring_window(&tuesday_class(), at(30, 10, 53, 0), &params).unwrap();
        assert_eq!(window.occurrence.start, at(30, 10, 0, 0));
    }

    #[test]
    fn in_window_bounds_are_inclusive() {
        let params = EngineParams::default();
        let class = tuesday_class();

        assert!(!in_window(&class, at(30, 9, 49, 59), &params));
        assert!(in_window(&class, at(30, 9, 50, 0), &params));
        assert!(in_window(&class, at(30, 10, 11, 40), &params));
        assert!(in_window(&class, at(30, 10, 50, 0), &params));
        assert!(!in_window(&class, at(30, 10, 50, 1), &params));
        assert!(!in_window(&class, at(29, 10, 0, 0), &params));
    }

    #[test]
    fn window_functions_are_deterministic() {
        let params = EngineParams::default();
        let class = tuesday_class();
        let reference = at(30, 9, 55, 0);

        let first = monitoring_window(&class, reference, &params);
        for _ in 0..10 {
            assert_eq!(monitoring_window(&class, reference, &params), first);
            assert_eq!(next_occurrence(&class, reference), first.map(|w| w.occurrence));
            assert!(in_window(&class, reference, &params));
        }
    }

    #[test]
    fn malformed_meetings_have_no_occurrence() {
        let params = EngineParams::default();

        let mut reversed = tuesday_class();
        reversed.start = WallClock::new(11, 0).unwrap();
        reversed.end = WallClock::new(10, 0).unwrap();
        assert!(next_occurrence(&reversed, at(30, 8, 0, 0)).is_none());

        let mut malformed = tuesday_class();
        malformed.end = WallClock { hour: 10, minute: 99 };
        assert!(monitoring_window(&malformed, at(30, 8, 0, 0), &params).is_none());
        assert!(!in_window(&malformed, at(30, 10, 0, 0), &params));
    }

    #[test]
    fn window_on_requires_matching_weekday() {
        let params = EngineParams::default();
        let class = tuesday_class();

        assert!(window_on(&class, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(), &params).is_none());
        let window = window_on(&class, NaiveDate::from_ymd_opt(2025, 12, 30).unwrap(), &params).unwrap();
        assert!(window.overlaps(at(30, 6, 0, 0), at(30, 9, 50, 0)));
        assert!(!window.overlaps(at(30, 6, 0, 0), at(30, 9, 49, 0)));
    }

    #[test]
    fn late_gate_spans_midnight() {
        let mut params = EngineParams::default();
        params.grace_out = Duration::from_secs(30 * 60);

        let mut late = tuesday_class();
        late.start = WallClock::new(23, 0).unwrap();
        late.end = WallClock::new(23, 50).unwrap();

        // 00:10 on Wednesday is still inside Tuesday's grace period
        let reference = at(31, 0, 10, 0);
        let window = monitoring_window(&late, reference, &params).unwrap();
        assert_eq!(window.occurrence.start, at(30, 23, 0, 0));
        assert!(in_window(&late, reference, &params));
    }
}
