//! Time utilities for rollcall
//!
//! All attendance decisions are made against wall-clock time because
//! meeting windows are calendar based (weekday + time of day).
//!
//! # Mock Time for Development
//!
//! In debug builds, the `ROLLCALL_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for replaying a recorded location feed against a class schedule.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 09:45:00`)
//!
//! Example:
//! ```bash
//! ROLLCALL_MOCK_TIME="2025-12-25 09:45:00" rollcalld --config schedule.toml
//! ```

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Debug-only override of the process clock
pub const MOCK_TIME_ENV_VAR: &str = "ROLLCALL_MOCK_TIME";

/// Layout of [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Offset between the mocked start instant and the real clock, fixed at first
// use so mocked time keeps running.
static CLOCK_SKEW: OnceLock<Option<chrono::Duration>> = OnceLock::new();

/// Parse a mock time value into a local instant
pub fn parse_mock_time(value: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), MOCK_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

#[cfg(debug_assertions)]
fn skew_from_env() -> Option<chrono::Duration> {
    let value = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
    let Some(mocked) = parse_mock_time(&value) else {
        tracing::warn!(
            value = %value,
            expected = MOCK_TIME_FORMAT,
            "Ignoring unparseable {}", MOCK_TIME_ENV_VAR
        );
        return None;
    };

    #[allow(clippy::disallowed_methods)]
    let skew = mocked - Local::now();
    tracing::info!(mocked = %mocked, skew_secs = skew.num_seconds(), "Clock is mocked");
    Some(skew)
}

#[cfg(not(debug_assertions))]
fn skew_from_env() -> Option<chrono::Duration> {
    None
}

fn clock_skew() -> Option<chrono::Duration> {
    *CLOCK_SKEW.get_or_init(skew_from_env)
}

/// Whether `ROLLCALL_MOCK_TIME` is in effect
pub fn is_mock_time_active() -> bool {
    clock_skew().is_some()
}

/// Current local time. Honours `ROLLCALL_MOCK_TIME` in debug builds.
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Local> {
    let real = Local::now();
    clock_skew().map_or(real, |skew| real + skew)
}

/// Time of day with minute resolution, as written in a class schedule.
///
/// Fields are public so a schedule source can hand over whatever it parsed;
/// out-of-range values are representable and surface as `None` from
/// [`WallClock::to_naive_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        let clock = Self { hour, minute };
        clock.is_valid().then_some(clock)
    }

    pub fn is_valid(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }

    pub fn to_naive_time(self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0)
    }

    /// Resolve this time of day on `date` in the local timezone.
    ///
    /// Ambiguous local times (DST fall-back) resolve to the earlier instant.
    /// Nonexistent local times (DST spring-forward) and malformed components
    /// yield `None`.
    pub fn on_date(self, date: NaiveDate) -> Option<DateTime<Local>> {
        let naive = date.and_time(self.to_naive_time()?);
        match Local.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => None,
        }
    }
}

impl std::fmt::Display for WallClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The first local midnight strictly after `dt`.
pub fn next_local_midnight(dt: &DateTime<Local>) -> Option<DateTime<Local>> {
    let tomorrow = dt.date_naive().succ_opt()?;
    // Some zones skip midnight on DST days; fall back to the first valid minute.
    (0..120u8)
        .filter_map(|minutes| WallClock::new(minutes / 60, minutes % 60))
        .find_map(|clock| clock.on_date(tomorrow))
}

/// Convert a std duration into a chrono duration, saturating on overflow.
pub fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Format a DateTime for display in logs and summaries.
pub fn format_clock_time(dt: &DateTime<Local>) -> String {
    dt.format("%H:%M:%S").to_string()
}

/// Compact duration for summaries: `16m 40s`, `1h 0m 5s`, `45s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, s) => format!("{h}h {m}m {s}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_wall_clock_ordering() {
        let lecture = WallClock::new(9, 50).unwrap();
        assert!(lecture < WallClock::new(10, 0).unwrap());
        assert!(lecture > WallClock::new(8, 59).unwrap());
    }

    #[test]
    fn test_wall_clock_rejects_out_of_range() {
        assert!(WallClock::new(24, 0).is_none());
        assert!(WallClock::new(12, 60).is_none());

        let malformed = WallClock { hour: 25, minute: 0 };
        assert!(!malformed.is_valid());
        assert!(malformed.to_naive_time().is_none());
        assert!(malformed.on_date(NaiveDate::from_ymd_opt(2025, 12, 29).unwrap()).is_none());
    }

    #[test]
    fn test_wall_clock_on_date() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 29).unwrap();
        let dt = WallClock::new(9, 45).unwrap().on_date(date).unwrap();
        assert_eq!(dt.date_naive(), date);
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (9, 45, 0));
    }

    #[test]
    fn test_wall_clock_display() {
        assert_eq!(WallClock::new(9, 5).unwrap().to_string(), "09:05");
    }

    #[test]
    fn test_next_local_midnight() {
        let dt = Local.with_ymd_and_hms(2025, 12, 31, 22, 15, 0).unwrap();
        let midnight = next_local_midnight(&dt).unwrap();
        assert_eq!(midnight.year(), 2026);
        assert_eq!(midnight.date_naive().ordinal(), 1);
        assert_eq!(midnight.hour(), 0);
        assert!(midnight > dt);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(1000)), "16m 40s");
        assert_eq!(format_duration(Duration::from_secs(3605)), "1h 0m 5s");
    }

    #[test]
    fn test_format_clock_time() {
        let dt = Local.with_ymd_and_hms(2025, 12, 25, 10, 11, 40).unwrap();
        assert_eq!(format_clock_time(&dt), "10:11:40");
    }

    #[test]
    fn test_to_chrono_saturates() {
        assert_eq!(to_chrono(Duration::from_secs(5)), chrono::Duration::seconds(5));
        assert_eq!(to_chrono(Duration::MAX), chrono::Duration::MAX);
    }

    #[test]
    fn test_parse_mock_time() {
        let parsed = parse_mock_time("2025-12-30 09:55:00").unwrap();
        assert_eq!(parsed, Local.with_ymd_and_hms(2025, 12, 30, 9, 55, 0).unwrap());
        assert!(parse_mock_time(" 2025-12-30 09:55:00\n").is_some());

        for bad in ["2025-12-30", "09:55:00", "2025-12-30T09:55:00", ""] {
            assert!(parse_mock_time(bad).is_none(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_now_is_plausible() {
        assert!((2020..2100).contains(&now().year()));
    }
}
