//! Location-monitoring service interfaces for rollcall
//!
//! This crate defines the boundary between the attendance engine and
//! whatever reports device location. It contains no positioning code itself:
//! - `LocationMonitor`: geofence registration, authorization, one-shot fixes
//! - `LocationEvent`: asynchronous deliveries from the service
//! - `MockLocationMonitor`: scriptable monitor for tests
//! - `FeedMonitor`: replays NDJSON events from any async reader

mod feed;
mod mock;
mod region;
mod traits;

pub use feed::*;
pub use mock::*;
pub use region::*;
pub use traits::*;
