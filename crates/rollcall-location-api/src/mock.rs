//! Mock location monitor for testing

use rollcall_api::{AuthorizationStatus, Coordinate, LocationSample};
use rollcall_util::MeetingId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::{LocationError, LocationEvent, LocationMonitor, LocationResult, Region};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scriptable location monitor for unit and integration tests.
///
/// Nothing is delivered on its own: tests drive entries, exits, and samples
/// explicitly through the `simulate_*` methods.
pub struct MockLocationMonitor {
    authorization: Mutex<AuthorizationStatus>,
    regions: Mutex<BTreeMap<MeetingId, Region>>,
    region_limit: Option<usize>,
    event_tx: mpsc::UnboundedSender<LocationEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<LocationEvent>>>,

    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    authorization_requests: AtomicUsize,
    location_requests: AtomicUsize,

    /// Configure start_monitoring to fail
    pub fail_start: Mutex<bool>,

    /// Configure request_location to fail
    pub fail_location: Mutex<bool>,
}

impl MockLocationMonitor {
    pub fn new(authorization: AuthorizationStatus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            authorization: Mutex::new(authorization),
            regions: Mutex::new(BTreeMap::new()),
            region_limit: None,
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            authorization_requests: AtomicUsize::new(0),
            location_requests: AtomicUsize::new(0),
            fail_start: Mutex::new(false),
            fail_location: Mutex::new(false),
        }
    }

    /// Monitor that starts out fully authorized
    pub fn authorized() -> Self {
        Self::new(AuthorizationStatus::AuthorizedAlways)
    }

    pub fn with_region_limit(mut self, limit: usize) -> Self {
        self.region_limit = Some(limit);
        self
    }

    /// Change the permission state and notify subscribers
    pub fn set_authorization(&self, status: AuthorizationStatus) {
        *lock(&self.authorization) = status;
        let _ = self.event_tx.send(LocationEvent::AuthorizationChanged { status });
    }

    pub fn is_monitoring(&self, meeting_id: &MeetingId) -> bool {
        lock(&self.regions).contains_key(meeting_id)
    }

    pub fn region(&self, meeting_id: &MeetingId) -> Option<Region> {
        lock(&self.regions).get(meeting_id).cloned()
    }

    /// Deliver an entry event, as the platform would on crossing the boundary
    pub fn simulate_enter(&self, meeting_id: &MeetingId) {
        let _ = self.event_tx.send(LocationEvent::RegionEntered {
            meeting_id: meeting_id.clone(),
        });
    }

    pub fn simulate_exit(&self, meeting_id: &MeetingId) {
        let _ = self.event_tx.send(LocationEvent::RegionExited {
            meeting_id: meeting_id.clone(),
        });
    }

    pub fn simulate_sample(&self, coordinate: Coordinate, accuracy: f64, speed: f64) {
        let _ = self.event_tx.send(LocationEvent::Sample {
            sample: LocationSample::new(coordinate, accuracy, speed),
        });
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    pub fn location_requests(&self) -> usize {
        self.location_requests.load(Ordering::SeqCst)
    }
}

impl Default for MockLocationMonitor {
    fn default() -> Self {
        Self::authorized()
    }
}

impl LocationMonitor for MockLocationMonitor {
    fn authorization_status(&self) -> AuthorizationStatus {
        *lock(&self.authorization)
    }

    fn request_authorization(&self) -> LocationResult<()> {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start_monitoring(&self, region: &Region) -> LocationResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        if *lock(&self.fail_start) {
            return Err(LocationError::Unavailable("Mock start failure".into()));
        }
        if !self.authorization_status().is_authorized() {
            return Err(LocationError::NotAuthorized);
        }

        let mut regions = lock(&self.regions);
        if let Some(limit) = self.region_limit
            && regions.len() >= limit
            && !regions.contains_key(&region.meeting_id)
        {
            return Err(LocationError::RegionLimit { limit });
        }
        regions.insert(region.meeting_id.clone(), region.clone());
        Ok(())
    }

    fn stop_monitoring(&self, meeting_id: &MeetingId) -> LocationResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);

        match lock(&self.regions).remove(meeting_id) {
            Some(_) => Ok(()),
            None => Err(LocationError::UnknownRegion(meeting_id.clone())),
        }
    }

    fn monitored_regions(&self) -> Vec<MeetingId> {
        lock(&self.regions).keys().cloned().collect()
    }

    fn request_location(&self) -> LocationResult<()> {
        self.location_requests.fetch_add(1, Ordering::SeqCst);

        if *lock(&self.fail_location) {
            return Err(LocationError::Unavailable("Mock location failure".into()));
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<LocationEvent>> {
        lock(&self.event_rx).take()
    }

    fn max_monitored_regions(&self) -> Option<usize> {
        self.region_limit
    }
}
