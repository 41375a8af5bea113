//! Geofence registration against the location service

use rollcall_api::AuthorizationStatus;
use rollcall_location_api::{LocationMonitor, Region};
use rollcall_util::MeetingId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registrations changed by one reconcile pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub registered: Vec<MeetingId>,
    pub released: Vec<MeetingId>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty() && self.released.is_empty()
    }
}

/// The only component that talks to the [`LocationMonitor`].
///
/// Tracks which regions are registered so that reconciling only touches the
/// difference between the registered set and the desired set.
pub struct RegionWatch {
    monitor: Arc<dyn LocationMonitor>,
    registered: BTreeSet<MeetingId>,
    authorization: AuthorizationStatus,
    authorization_requested: bool,
}

impl RegionWatch {
    pub fn new(monitor: Arc<dyn LocationMonitor>) -> Self {
        let authorization = monitor.authorization_status();
        Self {
            monitor,
            registered: BTreeSet::new(),
            authorization,
            authorization_requested: false,
        }
    }

    pub fn authorization(&self) -> AuthorizationStatus {
        self.authorization
    }

    pub fn is_registered(&self, meeting_id: &MeetingId) -> bool {
        self.registered.contains(meeting_id)
    }

    /// Record a permission change. Returns whether the status changed.
    pub fn set_authorization(&mut self, status: AuthorizationStatus) -> bool {
        if status == self.authorization {
            return false;
        }

        info!(from = ?self.authorization, to = ?status, "Location authorization changed");
        self.authorization = status;
        true
    }

    /// Bring the registered set in line with `desired`.
    ///
    /// `desired` should be in priority order: when the platform caps the
    /// number of regions, the tail is dropped. Without permission nothing is
    /// registered, and an undetermined status triggers a single permission
    /// request.
    pub fn reconcile(&mut self, desired: &[Region]) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        if !self.authorization.is_authorized() {
            if self.authorization == AuthorizationStatus::NotDetermined && !self.authorization_requested {
                self.authorization_requested = true;
                if let Err(e) = self.monitor.request_authorization() {
                    warn!(error = %e, "Failed to request location authorization");
                }
            }
            debug!(status = ?self.authorization, "Not authorized, skipping region registration");
            return outcome;
        }

        let limit = self.monitor.max_monitored_regions().unwrap_or(usize::MAX);
        if desired.len() > limit {
            warn!(
                desired = desired.len(),
                limit,
                "More eligible regions than the location service allows, registering the soonest"
            );
        }
        let wanted: Vec<&Region> = desired.iter().take(limit).collect();
        let wanted_ids: BTreeSet<&MeetingId> = wanted.iter().map(|r| &r.meeting_id).collect();

        let stale: Vec<MeetingId> = self
            .registered
            .iter()
            .filter(|id| !wanted_ids.contains(id))
            .cloned()
            .collect();
        for meeting_id in stale {
            if self.release(&meeting_id) {
                outcome.released.push(meeting_id);
            }
        }

        for region in wanted {
            if self.registered.contains(&region.meeting_id) {
                continue;
            }
            match self.monitor.start_monitoring(region) {
                Ok(()) => {
                    debug!(meeting_id = %region.meeting_id, "Region registered");
                    self.registered.insert(region.meeting_id.clone());
                    outcome.registered.push(region.meeting_id.clone());
                }
                Err(e) => {
                    warn!(meeting_id = %region.meeting_id, error = %e, "Failed to register region");
                }
            }
        }

        if !outcome.is_empty() {
            info!(
                registered = outcome.registered.len(),
                released = outcome.released.len(),
                active = self.registered.len(),
                "Regions reconciled"
            );
        }
        outcome
    }

    /// Stop monitoring one region. Returns whether it was registered.
    pub fn release(&mut self, meeting_id: &MeetingId) -> bool {
        if !self.registered.remove(meeting_id) {
            return false;
        }
        if let Err(e) = self.monitor.stop_monitoring(meeting_id) {
            warn!(meeting_id = %meeting_id, error = %e, "Failed to release region");
        }
        debug!(meeting_id = %meeting_id, "Region released");
        true
    }

    /// Stop monitoring every region, including any the service still holds
    /// from before this engine started.
    pub fn release_all(&mut self) -> Vec<MeetingId> {
        let mut released: Vec<MeetingId> = std::mem::take(&mut self.registered).into_iter().collect();
        for meeting_id in &released {
            if let Err(e) = self.monitor.stop_monitoring(meeting_id) {
                debug!(meeting_id = %meeting_id, error = %e, "Region already gone");
            }
        }

        for meeting_id in self.monitor.monitored_regions() {
            debug!(meeting_id = %meeting_id, "Releasing leftover region");
            if let Err(e) = self.monitor.stop_monitoring(&meeting_id) {
                warn!(meeting_id = %meeting_id, error = %e, "Failed to release leftover region");
            }
            if !released.contains(&meeting_id) {
                released.push(meeting_id);
            }
        }

        released
    }

    /// Ask for one position fix
    pub fn request_sample(&self) {
        if let Err(e) = self.monitor.request_location() {
            warn!(error = %e, "Failed to request location sample");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_api::Coordinate;
    use rollcall_location_api::MockLocationMonitor;

    fn region(id: &str) -> Region {
        Region {
            meeting_id: MeetingId::new(id),
            center: Coordinate::new(42.0, -93.0),
            radius_meters: 50.0,
            notify_on_entry: true,
            notify_on_exit: true,
        }
    }

    fn ids(list: &[&str]) -> Vec<MeetingId> {
        list.iter().map(|s| MeetingId::new(*s)).collect()
    }

    #[test]
    fn reconcile_only_touches_the_difference() {
        let monitor = Arc::new(MockLocationMonitor::authorized());
        let mut watch = RegionWatch::new(monitor.clone());

        let outcome = watch.reconcile(&[region("a"), region("b")]);
        assert_eq!(outcome.registered, ids(&["a", "b"]));
        assert_eq!(monitor.start_calls(), 2);

        let outcome = watch.reconcile(&[region("b"), region("c")]);
        assert_eq!(outcome.registered, ids(&["c"]));
        assert_eq!(outcome.released, ids(&["a"]));
        // b was left alone
        assert_eq!(monitor.start_calls(), 3);
        assert_eq!(monitor.stop_calls(), 1);

        let outcome = watch.reconcile(&[region("b"), region("c")]);
        assert!(outcome.is_empty());
        assert_eq!(monitor.monitored_regions(), ids(&["b", "c"]));
    }

    #[test]
    fn undetermined_authorization_requested_once() {
        let monitor = Arc::new(MockLocationMonitor::new(AuthorizationStatus::NotDetermined));
        let mut watch = RegionWatch::new(monitor.clone());

        assert!(watch.reconcile(&[region("a")]).is_empty());
        assert!(watch.reconcile(&[region("a")]).is_empty());
        assert_eq!(monitor.authorization_requests(), 1);
        assert_eq!(monitor.start_calls(), 0);
    }

    #[test]
    fn denied_registers_nothing() {
        let monitor = Arc::new(MockLocationMonitor::new(AuthorizationStatus::Denied));
        let mut watch = RegionWatch::new(monitor.clone());

        assert!(watch.reconcile(&[region("a")]).is_empty());
        assert_eq!(monitor.authorization_requests(), 0);
        assert!(monitor.monitored_regions().is_empty());
    }

    #[test]
    fn authorization_change_detected_once() {
        let monitor = Arc::new(MockLocationMonitor::authorized());
        let mut watch = RegionWatch::new(monitor.clone());
        watch.reconcile(&[region("a"), region("b")]);

        assert!(watch.set_authorization(AuthorizationStatus::Denied));
        assert!(!watch.set_authorization(AuthorizationStatus::Denied));

        // Registrations stay until released; reconciling while denied is a no-op
        assert!(watch.is_registered(&MeetingId::new("a")));
        assert!(watch.is_registered(&MeetingId::new("b")));
        assert!(watch.reconcile(&[region("c")]).is_empty());
    }

    #[test]
    fn platform_cap_keeps_highest_priority() {
        let monitor = Arc::new(MockLocationMonitor::authorized().with_region_limit(2));
        let mut watch = RegionWatch::new(monitor.clone());

        let outcome = watch.reconcile(&[region("first"), region("second"), region("third")]);
        assert_eq!(outcome.registered, ids(&["first", "second"]));
        assert!(!watch.is_registered(&MeetingId::new("third")));
    }

    #[test]
    fn registration_failure_is_not_fatal() {
        let monitor = Arc::new(MockLocationMonitor::authorized());
        *monitor.fail_start.lock().unwrap() = true;
        let mut watch = RegionWatch::new(monitor.clone());

        assert!(watch.reconcile(&[region("a")]).registered.is_empty());
        assert!(!watch.is_registered(&MeetingId::new("a")));

        *monitor.fail_start.lock().unwrap() = false;
        assert_eq!(watch.reconcile(&[region("a")]).registered, ids(&["a"]));
    }

    #[test]
    fn release_all_clears_leftover_regions() {
        let monitor = Arc::new(MockLocationMonitor::authorized());
        monitor.start_monitoring(&region("stale")).unwrap();

        let mut watch = RegionWatch::new(monitor.clone());
        watch.reconcile(&[region("a")]);

        let mut released = watch.release_all();
        released.sort();
        assert_eq!(released, ids(&["a", "stale"]));
        assert!(monitor.monitored_regions().is_empty());
    }
}
