//! Meeting catalog and daily agenda

use chrono::{DateTime, Datelike, Local, NaiveDate};
use rollcall_api::Meeting;
use rollcall_config::EngineParams;
use rollcall_util::{MeetingId, Result, RollcallError};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::{MonitoringWindow, window_on};

/// The full set of known meetings. Replaced wholesale, never edited in place.
#[derive(Debug, Default)]
pub struct MeetingCatalog {
    meetings: Vec<Meeting>,
}

impl MeetingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog. On a duplicate id the previous catalog is kept.
    pub fn configure(&mut self, meetings: Vec<Meeting>) -> Result<()> {
        let mut seen = HashSet::new();
        for meeting in &meetings {
            if !seen.insert(&meeting.id) {
                return Err(RollcallError::DuplicateMeeting(meeting.id.clone()));
            }
        }

        debug!(meeting_count = meetings.len(), "Catalog replaced");
        self.meetings = meetings;
        Ok(())
    }

    pub fn get(&self, id: &MeetingId) -> Option<&Meeting> {
        self.meetings.iter().find(|m| &m.id == id)
    }

    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }

    /// Agenda for the local day containing `now`
    pub fn today(&self, now: DateTime<Local>, params: &EngineParams) -> DailyAgenda {
        self.agenda_for(now.date_naive(), params)
    }

    /// Tomorrow's meetings whose gate opens before midnight tonight
    pub fn opening_tonight(&self, now: DateTime<Local>, params: &EngineParams) -> Vec<AgendaItem> {
        let today = now.date_naive();
        let Some(tomorrow) = today.succ_opt() else {
            return Vec::new();
        };

        self.agenda_for(tomorrow, params)
            .items
            .into_iter()
            .filter(|item| item.window.gate_open.date_naive() <= today)
            .collect()
    }

    /// Meetings held on `day`, sorted by start time then id.
    ///
    /// Meetings whose occurrence cannot be resolved that day are left out.
    pub fn agenda_for(&self, day: NaiveDate, params: &EngineParams) -> DailyAgenda {
        let mut items: Vec<AgendaItem> = self
            .meetings
            .iter()
            .filter(|meeting| meeting.weekday == day.weekday())
            .filter_map(|meeting| match window_on(meeting, day, params) {
                Some(window) => Some(AgendaItem {
                    meeting: meeting.clone(),
                    window,
                }),
                None => {
                    warn!(
                        meeting_id = %meeting.id,
                        start = %meeting.start,
                        end = %meeting.end,
                        day = %day,
                        "Meeting has no valid occurrence today, skipping"
                    );
                    None
                }
            })
            .collect();

        items.sort_by(|a, b| {
            a.meeting
                .start
                .cmp(&b.meeting.start)
                .then_with(|| a.meeting.id.cmp(&b.meeting.id))
        });

        DailyAgenda { day, items }
    }
}

/// One meeting on the day's agenda with its resolved gate
#[derive(Debug, Clone)]
pub struct AgendaItem {
    pub meeting: Meeting,
    pub window: MonitoringWindow,
}

/// Today's meetings in start order
#[derive(Debug, Clone)]
pub struct DailyAgenda {
    pub day: NaiveDate,
    pub items: Vec<AgendaItem>,
}

impl DailyAgenda {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};
    use rollcall_api::Coordinate;
    use rollcall_util::WallClock;

    fn meeting(id: &str, weekday: Weekday, start: (u8, u8), end: (u8, u8)) -> Meeting {
        Meeting {
            id: MeetingId::new(id),
            name: id.to_uppercase(),
            center: Coordinate::new(42.0, -93.0),
            radius_meters: 60.0,
            weekday,
            start: WallClock { hour: start.0, minute: start.1 },
            end: WallClock { hour: end.0, minute: end.1 },
            cost: None,
        }
    }

    #[test]
    fn duplicate_ids_rejected_and_previous_kept() {
        let mut catalog = MeetingCatalog::new();
        catalog
            .configure(vec![meeting("a", Weekday::Tue, (9, 0), (9, 50))])
            .unwrap();

        let err = catalog
            .configure(vec![
                meeting("b", Weekday::Tue, (9, 0), (9, 50)),
                meeting("b", Weekday::Wed, (9, 0), (9, 50)),
            ])
            .unwrap_err();
        assert!(matches!(err, RollcallError::DuplicateMeeting(id) if id.as_str() == "b"));

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(&MeetingId::new("a")).is_some());
    }

    #[test]
    fn agenda_filters_by_weekday_and_sorts() {
        let mut catalog = MeetingCatalog::new();
        catalog
            .configure(vec![
                meeting("zoo", Weekday::Tue, (9, 0), (9, 50)),
                meeting("late", Weekday::Tue, (14, 0), (14, 50)),
                meeting("abc", Weekday::Tue, (9, 0), (9, 50)),
                meeting("wed", Weekday::Wed, (8, 0), (8, 50)),
            ])
            .unwrap();

        // 2025-12-30 is a Tuesday
        let now = Local.with_ymd_and_hms(2025, 12, 30, 7, 0, 0).unwrap();
        let agenda = catalog.today(now, &EngineParams::default());

        let ids: Vec<_> = agenda.items.iter().map(|i| i.meeting.id.as_str()).collect();
        assert_eq!(ids, vec!["abc", "zoo", "late"]);
        assert_eq!(agenda.day, now.date_naive());
    }

    #[test]
    fn gates_opening_before_midnight_come_early() {
        let mut catalog = MeetingCatalog::new();
        catalog
            .configure(vec![
                meeting("night", Weekday::Wed, (0, 5), (0, 55)),
                meeting("morning", Weekday::Wed, (8, 0), (8, 50)),
                meeting("today", Weekday::Tue, (23, 0), (23, 50)),
            ])
            .unwrap();

        let now = Local.with_ymd_and_hms(2025, 12, 30, 20, 0, 0).unwrap();
        let early = catalog.opening_tonight(now, &EngineParams::default());
        let ids: Vec<_> = early.iter().map(|i| i.meeting.id.as_str()).collect();
        assert_eq!(ids, vec!["night"]);
        assert_eq!(early[0].window.occurrence.day(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn invalid_meetings_excluded_from_agenda() {
        let mut catalog = MeetingCatalog::new();
        catalog
            .configure(vec![
                meeting("ok", Weekday::Tue, (9, 0), (9, 50)),
                meeting("reversed", Weekday::Tue, (11, 0), (10, 0)),
                meeting("malformed", Weekday::Tue, (25, 0), (26, 0)),
            ])
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 12, 30).unwrap();
        let agenda = catalog.agenda_for(day, &EngineParams::default());
        assert_eq!(agenda.len(), 1);
        assert_eq!(agenda.items[0].meeting.id.as_str(), "ok");
    }
}
