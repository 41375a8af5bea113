//! Shared domain types for rollcall
//!
//! This crate defines the vocabulary every other rollcall crate speaks:
//! - Meetings (recurring, location-bound class sessions)
//! - Geographic coordinates and location samples
//! - Attendance status and verdicts
//! - Engine state snapshots

mod geo;
mod types;

pub use geo::*;
pub use types::*;
