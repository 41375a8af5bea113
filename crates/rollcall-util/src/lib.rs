//! Shared utilities for rollcall
//!
//! This crate provides:
//! - ID types (MeetingId, RunId)
//! - Time utilities (mock-able wall clock, time-of-day, duration helpers)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
