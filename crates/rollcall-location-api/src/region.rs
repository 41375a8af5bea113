//! Circular geofence regions

use rollcall_api::{Coordinate, Meeting};
use rollcall_util::MeetingId;
use serde::{Deserialize, Serialize};

/// A circular region registered with the location service.
///
/// The region identifier is the meeting ID, so events coming back from the
/// service map directly onto meetings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub meeting_id: MeetingId,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub notify_on_entry: bool,
    pub notify_on_exit: bool,
}

impl Region {
    pub fn for_meeting(meeting: &Meeting) -> Self {
        Self {
            meeting_id: meeting.id.clone(),
            center: meeting.center,
            radius_meters: meeting.radius_meters,
            notify_on_entry: true,
            notify_on_exit: true,
        }
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        self.center.distance_to(point) <= self.radius_meters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use rollcall_util::WallClock;

    #[test]
    fn region_mirrors_meeting_geometry() {
        let meeting = Meeting {
            id: MeetingId::new("bio-212"),
            name: "Biology 212".into(),
            center: Coordinate::new(42.0, -93.0),
            radius_meters: 100.0,
            weekday: Weekday::Wed,
            start: WallClock::new(13, 10).unwrap(),
            end: WallClock::new(14, 0).unwrap(),
            cost: None,
        };

        let region = Region::for_meeting(&meeting);
        assert_eq!(region.meeting_id, meeting.id);
        assert!(region.notify_on_entry && region.notify_on_exit);
        assert!(region.contains(&Coordinate::new(42.0005, -93.0)));
        assert!(!region.contains(&Coordinate::new(42.01, -93.0)));
    }
}
