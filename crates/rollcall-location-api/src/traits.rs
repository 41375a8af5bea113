//! Location monitor traits

use rollcall_api::{AuthorizationStatus, LocationSample};
use rollcall_util::MeetingId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::Region;

/// Errors from location service operations
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location monitoring is not authorized")]
    NotAuthorized,

    #[error("Region limit reached ({limit} regions)")]
    RegionLimit { limit: usize },

    #[error("Region not monitored: {0}")]
    UnknownRegion(MeetingId),

    #[error("Location service unavailable: {0}")]
    Unavailable(String),
}

pub type LocationResult<T> = Result<T, LocationError>;

/// Events delivered by the location service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationEvent {
    /// Permission state changed
    AuthorizationChanged { status: AuthorizationStatus },

    /// Device crossed into a monitored region
    RegionEntered { meeting_id: MeetingId },

    /// Device crossed out of a monitored region
    RegionExited { meeting_id: MeetingId },

    /// A position fix (requested or unsolicited)
    Sample { sample: LocationSample },
}

/// Location monitor trait - implemented by platform-specific services.
///
/// Every call is fire-and-forget: results arrive later as [`LocationEvent`]s
/// on the channel returned by [`LocationMonitor::subscribe`], which may be
/// fed from a background thread.
pub trait LocationMonitor: Send + Sync {
    /// Current permission state
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask the user/platform for permission
    fn request_authorization(&self) -> LocationResult<()>;

    /// Begin delivering entry/exit events for a region
    fn start_monitoring(&self, region: &Region) -> LocationResult<()>;

    /// Stop delivering events for a region
    fn stop_monitoring(&self, meeting_id: &MeetingId) -> LocationResult<()>;

    /// Regions currently registered, by identifier
    fn monitored_regions(&self) -> Vec<MeetingId>;

    /// Request a single position fix
    fn request_location(&self) -> LocationResult<()>;

    /// Take the event stream. Returns `None` once it has been taken.
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<LocationEvent>>;

    /// Platform cap on concurrently monitored regions, if any
    fn max_monitored_regions(&self) -> Option<usize> {
        None
    }
}
