//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Attendance engine tuning
    #[serde(default)]
    pub engine: RawEngineConfig,

    /// Recurring class meetings
    #[serde(default)]
    pub meetings: Vec<RawMeeting>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the attendance ledger
    pub data_dir: Option<PathBuf>,
}

/// Engine parameters. Every field falls back to its default when omitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEngineConfig {
    /// Continuous presence required before crediting attendance
    pub dwell_required_seconds: Option<u64>,

    /// Samples less accurate than this are discarded
    pub accuracy_max_meters: Option<f64>,

    /// Samples faster than this are treated as transit
    pub speed_max_meters_per_second: Option<f64>,

    /// Gate opens this long before the meeting starts
    pub lead_in_minutes: Option<u64>,

    /// Gate closes this long after the meeting ends
    pub grace_out_minutes: Option<u64>,

    /// Only meetings whose window starts within this horizon get a region
    pub registration_horizon_hours: Option<u64>,

    /// Dwell re-evaluation period while confirming
    pub dwell_check_interval_seconds: Option<u64>,

    /// How often the registration horizon is advanced
    pub registration_refresh_minutes: Option<u64>,

    /// Only the most recently entered region accumulates dwell time
    pub exclusive_dwell: Option<bool>,
}

/// Raw meeting definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawMeeting {
    /// Unique stable ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Region center
    pub latitude: f64,
    pub longitude: f64,

    /// Region radius in meters
    pub radius_meters: f64,

    /// Day of week: "mon".."sun" or full names
    pub weekday: String,

    /// Start time (HH:MM format)
    pub start: String,

    /// End time (HH:MM format)
    pub end: String,

    /// Value of one session (e.g. tuition per class)
    pub cost: Option<f64>,
}
