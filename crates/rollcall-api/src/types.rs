//! Shared types for rollcall

use chrono::{DateTime, Local, NaiveDate, Weekday};
use rollcall_util::{MeetingId, RunId, WallClock};
use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// A recurring, location-bound class session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub weekday: Weekday,
    pub start: WallClock,
    pub end: WallClock,

    /// What one session is worth (e.g. tuition per class), carried into the ledger
    #[serde(default)]
    pub cost: Option<f64>,
}

impl Meeting {
    /// Whether the time components describe a usable same-day interval
    pub fn has_valid_times(&self) -> bool {
        self.start.is_valid() && self.end.is_valid() && self.start < self.end
    }
}

/// Terminal attendance classification for one meeting occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Present,
    Absent,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Present => "present",
            Verdict::Absent => "absent",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Verdict::Present),
            "absent" => Ok(Verdict::Absent),
            other => Err(format!("Unknown verdict: {}", other)),
        }
    }
}

/// Per-meeting monitoring status for the current day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    /// Not inside the region (or not yet registered)
    Idle,
    /// Idle, with the region registered at the location service
    Watching,
    /// Inside the region during the window, accumulating dwell time
    Confirming,
    Present,
    Absent,
}

/// Location permission state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Restricted,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways
        )
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AuthorizationStatus::Denied | AuthorizationStatus::Restricted)
    }
}

/// View of one agenda meeting for status displays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingView {
    pub meeting_id: MeetingId,
    pub name: String,
    pub status: MeetingStatus,
    pub gate_open: DateTime<Local>,
    pub gate_close: DateTime<Local>,
    pub entered_at: Option<DateTime<Local>>,
    pub region_registered: bool,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub run_id: Option<RunId>,
    pub day: Option<NaiveDate>,
    pub authorization: AuthorizationStatus,
    pub catalog_size: usize,
    pub agenda: Vec<MeetingView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting(start: WallClock, end: WallClock) -> Meeting {
        Meeting {
            id: MeetingId::new("cs-331"),
            name: "Computer Engineering 331".into(),
            center: Coordinate::new(42.0267, -93.6465),
            radius_meters: 80.0,
            weekday: Weekday::Tue,
            start,
            end,
            cost: None,
        }
    }

    #[test]
    fn meeting_time_validity() {
        let ok = meeting(WallClock::new(10, 0).unwrap(), WallClock::new(10, 50).unwrap());
        assert!(ok.has_valid_times());

        let reversed = meeting(WallClock::new(11, 0).unwrap(), WallClock::new(10, 0).unwrap());
        assert!(!reversed.has_valid_times());

        let malformed = meeting(WallClock { hour: 10, minute: 75 }, WallClock::new(11, 0).unwrap());
        assert!(!malformed.has_valid_times());
    }

    #[test]
    fn verdict_round_trips_through_str() {
        for v in [Verdict::Present, Verdict::Absent] {
            assert_eq!(v.as_str().parse::<Verdict>().unwrap(), v);
        }
        assert!("late".parse::<Verdict>().is_err());
    }

    #[test]
    fn authorization_classification() {
        assert!(AuthorizationStatus::AuthorizedAlways.is_authorized());
        assert!(!AuthorizationStatus::NotDetermined.is_authorized());
        assert!(!AuthorizationStatus::NotDetermined.is_denied());
        assert!(AuthorizationStatus::Restricted.is_denied());
    }
}
