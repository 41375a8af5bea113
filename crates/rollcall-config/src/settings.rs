//! Validated settings structures

use crate::schema::{RawConfig, RawEngineConfig, RawMeeting, RawServiceConfig};
use crate::validation::{parse_time, parse_weekday};
use rollcall_api::{Coordinate, Meeting, SampleLimits};
use rollcall_util::{MeetingId, WallClock, default_data_dir};
use std::path::PathBuf;
use std::time::Duration;

/// Validated configuration ready for use by the core engine
#[derive(Debug, Clone)]
pub struct Settings {
    /// Service configuration
    pub service: ServiceConfig,

    /// Engine tuning
    pub engine: EngineParams,

    /// Meeting catalog
    pub meetings: Vec<Meeting>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            engine: EngineParams::from_raw(&raw.engine),
            meetings: raw.meetings.into_iter().filter_map(convert_meeting).collect(),
        }
    }

    /// Get meeting by ID
    pub fn get_meeting(&self, id: &MeetingId) -> Option<&Meeting> {
        self.meetings.iter().find(|m| &m.id == id)
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Attendance engine parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    pub dwell_required: Duration,
    pub accuracy_max_meters: f64,
    pub speed_max_meters_per_second: f64,
    pub lead_in: Duration,
    pub grace_out: Duration,
    pub registration_horizon: Duration,
    pub dwell_check_interval: Duration,
    pub registration_refresh: Duration,
    pub exclusive_dwell: bool,
}

impl EngineParams {
    pub const DEFAULT_DWELL_REQUIRED_SECONDS: u64 = 1000;
    pub const DEFAULT_ACCURACY_MAX_METERS: f64 = 50.0;
    pub const DEFAULT_SPEED_MAX_METERS_PER_SECOND: f64 = 8.0;
    pub const DEFAULT_LEAD_IN_MINUTES: u64 = 10;
    pub const DEFAULT_GRACE_OUT_MINUTES: u64 = 0;
    pub const DEFAULT_REGISTRATION_HORIZON_HOURS: u64 = 8;
    pub const DEFAULT_DWELL_CHECK_INTERVAL_SECONDS: u64 = 5;
    pub const DEFAULT_REGISTRATION_REFRESH_MINUTES: u64 = 15;

    fn from_raw(raw: &RawEngineConfig) -> Self {
        let minutes = |m: u64| Duration::from_secs(m * 60);

        Self {
            dwell_required: Duration::from_secs(
                raw.dwell_required_seconds
                    .unwrap_or(Self::DEFAULT_DWELL_REQUIRED_SECONDS),
            ),
            accuracy_max_meters: raw
                .accuracy_max_meters
                .unwrap_or(Self::DEFAULT_ACCURACY_MAX_METERS),
            speed_max_meters_per_second: raw
                .speed_max_meters_per_second
                .unwrap_or(Self::DEFAULT_SPEED_MAX_METERS_PER_SECOND),
            lead_in: minutes(raw.lead_in_minutes.unwrap_or(Self::DEFAULT_LEAD_IN_MINUTES)),
            grace_out: minutes(
                raw.grace_out_minutes
                    .unwrap_or(Self::DEFAULT_GRACE_OUT_MINUTES),
            ),
            registration_horizon: Duration::from_secs(
                raw.registration_horizon_hours
                    .unwrap_or(Self::DEFAULT_REGISTRATION_HORIZON_HOURS)
                    * 3600,
            ),
            dwell_check_interval: Duration::from_secs(
                raw.dwell_check_interval_seconds
                    .unwrap_or(Self::DEFAULT_DWELL_CHECK_INTERVAL_SECONDS),
            ),
            registration_refresh: minutes(
                raw.registration_refresh_minutes
                    .unwrap_or(Self::DEFAULT_REGISTRATION_REFRESH_MINUTES),
            ),
            exclusive_dwell: raw.exclusive_dwell.unwrap_or(false),
        }
    }

    pub fn sample_limits(&self) -> SampleLimits {
        SampleLimits {
            accuracy_max_meters: self.accuracy_max_meters,
            speed_max_meters_per_second: self.speed_max_meters_per_second,
        }
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self::from_raw(&RawEngineConfig::default())
    }
}

fn convert_meeting(raw: RawMeeting) -> Option<Meeting> {
    // Validation has already rejected anything that fails to parse here.
    let (start_h, start_m) = parse_time(&raw.start).ok()?;
    let (end_h, end_m) = parse_time(&raw.end).ok()?;

    Some(Meeting {
        id: MeetingId::new(raw.id),
        name: raw.name,
        center: Coordinate::new(raw.latitude, raw.longitude),
        radius_meters: raw.radius_meters,
        weekday: parse_weekday(&raw.weekday).ok()?,
        start: WallClock::new(start_h, start_m)?,
        end: WallClock::new(end_h, end_m)?,
        cost: raw.cost,
    })
}
