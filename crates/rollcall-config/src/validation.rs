//! Configuration validation

use crate::schema::{RawConfig, RawEngineConfig, RawMeeting};
use chrono::Weekday;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Meeting '{meeting_id}': {message}")]
    MeetingError { meeting_id: String, message: String },

    #[error("Duplicate meeting ID: {0}")]
    DuplicateMeetingId(String),

    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Invalid weekday '{0}'")]
    InvalidWeekday(String),

    #[error("Engine setting '{field}': {message}")]
    EngineError { field: &'static str, message: String },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen_ids = HashSet::new();
    for meeting in &config.meetings {
        if !seen_ids.insert(&meeting.id) {
            errors.push(ValidationError::DuplicateMeetingId(meeting.id.clone()));
        }
    }

    for meeting in &config.meetings {
        errors.extend(validate_meeting(meeting));
    }

    errors.extend(validate_engine(&config.engine));

    errors
}

fn validate_meeting(meeting: &RawMeeting) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let meeting_error = |message: &str| ValidationError::MeetingError {
        meeting_id: meeting.id.clone(),
        message: message.to_string(),
    };

    if meeting.id.trim().is_empty() {
        errors.push(meeting_error("id cannot be empty"));
    }

    if !(meeting.latitude.is_finite() && (-90.0..=90.0).contains(&meeting.latitude)) {
        errors.push(meeting_error("latitude must be within -90..=90"));
    }
    if !(meeting.longitude.is_finite() && (-180.0..=180.0).contains(&meeting.longitude)) {
        errors.push(meeting_error("longitude must be within -180..=180"));
    }
    if !(meeting.radius_meters.is_finite() && meeting.radius_meters > 0.0) {
        errors.push(meeting_error("radius_meters must be positive"));
    }

    if parse_weekday(&meeting.weekday).is_err() {
        errors.push(ValidationError::InvalidWeekday(meeting.weekday.clone()));
    }

    let start = parse_time(&meeting.start);
    if let Err(e) = &start {
        errors.push(ValidationError::InvalidTimeFormat {
            value: meeting.start.clone(),
            message: e.clone(),
        });
    }
    let end = parse_time(&meeting.end);
    if let Err(e) = &end {
        errors.push(ValidationError::InvalidTimeFormat {
            value: meeting.end.clone(),
            message: e.clone(),
        });
    }
    if let (Ok(start), Ok(end)) = (start, end)
        && start >= end
    {
        errors.push(meeting_error("start must be before end"));
    }

    if let Some(cost) = meeting.cost
        && !(cost.is_finite() && cost >= 0.0)
    {
        errors.push(meeting_error("cost must be a non-negative number"));
    }

    errors
}

fn validate_engine(engine: &RawEngineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let positive_secs = [
        ("dwell_required_seconds", engine.dwell_required_seconds),
        ("dwell_check_interval_seconds", engine.dwell_check_interval_seconds),
        ("registration_horizon_hours", engine.registration_horizon_hours),
        ("registration_refresh_minutes", engine.registration_refresh_minutes),
    ];
    for (field, value) in positive_secs {
        if value == Some(0) {
            errors.push(ValidationError::EngineError {
                field,
                message: "must be greater than zero".into(),
            });
        }
    }

    // Gates and timers are resolved within about a day of the meeting
    let upper_bounds = [
        ("lead_in_minutes", engine.lead_in_minutes, 24 * 60),
        ("grace_out_minutes", engine.grace_out_minutes, 24 * 60),
        ("registration_horizon_hours", engine.registration_horizon_hours, 7 * 24),
        ("dwell_check_interval_seconds", engine.dwell_check_interval_seconds, 24 * 3600),
        ("registration_refresh_minutes", engine.registration_refresh_minutes, 24 * 60),
    ];
    for (field, value, max) in upper_bounds {
        if let Some(v) = value
            && v > max
        {
            errors.push(ValidationError::EngineError {
                field,
                message: format!("must be at most {}", max),
            });
        }
    }

    let positive_floats = [
        ("accuracy_max_meters", engine.accuracy_max_meters),
        ("speed_max_meters_per_second", engine.speed_max_meters_per_second),
    ];
    for (field, value) in positive_floats {
        if let Some(v) = value
            && !(v.is_finite() && v > 0.0)
        {
            errors.push(ValidationError::EngineError {
                field,
                message: "must be a positive number".into(),
            });
        }
    }

    errors
}

/// Parse a 24-hour `HH:MM` clock time
pub fn parse_time(s: &str) -> Result<(u8, u8), String> {
    let (hour, minute) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| "expected HH:MM".to_string())?;

    let hour: u8 = hour.parse().map_err(|_| format!("bad hour '{}'", hour))?;
    let minute: u8 = minute.parse().map_err(|_| format!("bad minute '{}'", minute))?;

    match (hour, minute) {
        (h, _) if h > 23 => Err(format!("hour {} is past 23", h)),
        (_, m) if m > 59 => Err(format!("minute {} is past 59", m)),
        clock => Ok(clock),
    }
}

/// Parse a weekday name
pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    match s.to_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        other => Err(format!("Unknown day: {}", other)),
    }
}
