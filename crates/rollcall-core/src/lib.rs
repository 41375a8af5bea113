//! Attendance engine for rollcall
//!
//! This crate is the heart of rollcalld, containing:
//! - The meeting catalog and daily agenda
//! - Gate window calculation (lead-in before start, grace after end)
//! - Geofence registration against the location service
//! - The per-meeting state machine (Idle -> Confirming -> Present | Absent)
//! - A cancellable timer queue driven by an explicit clock

mod attendance;
mod catalog;
mod engine;
mod events;
mod timers;
mod watch;
mod window;

pub use attendance::*;
pub use catalog::*;
pub use engine::*;
pub use events::*;
pub use timers::*;
pub use watch::*;
pub use window::*;
