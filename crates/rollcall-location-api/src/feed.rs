//! Location monitor backed by a newline-delimited JSON event feed
//!
//! Each input line is one [`LocationEvent`] in its tagged JSON form:
//!
//! ```text
//! {"type":"authorization_changed","status":"authorized_always"}
//! {"type":"sample","sample":{"coordinate":{"latitude":42.0267,"longitude":-93.6465},"horizontal_accuracy":12.0,"speed":0.3}}
//! {"type":"region_entered","meeting_id":"cs-331"}
//! ```
//!
//! Region events are only forwarded for regions that are currently
//! monitored. Samples additionally drive a software geofence: when a sample
//! moves the device across the boundary of a monitored region, the matching
//! entry or exit event is synthesized ahead of the sample itself. Only
//! samples within the configured [`SampleLimits`] move a boundary; a coarse
//! or fast-moving fix is forwarded as a plain sample.

use rollcall_api::{AuthorizationStatus, LocationSample, SampleLimits};
use rollcall_util::MeetingId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::{LocationError, LocationEvent, LocationMonitor, LocationResult, Region};

#[derive(Debug)]
struct FeedState {
    authorization: AuthorizationStatus,
    limits: SampleLimits,
    regions: BTreeMap<MeetingId, Region>,
    inside: BTreeSet<MeetingId>,
}

impl FeedState {
    /// Translate one feed line into the events subscribers should see
    fn apply(&mut self, event: LocationEvent) -> Vec<LocationEvent> {
        match event {
            LocationEvent::AuthorizationChanged { status } => {
                self.authorization = status;
                vec![LocationEvent::AuthorizationChanged { status }]
            }
            LocationEvent::RegionEntered { meeting_id } => {
                if !self.regions.contains_key(&meeting_id) {
                    trace!(meeting_id = %meeting_id, "Entry for unmonitored region dropped");
                    return Vec::new();
                }
                self.inside.insert(meeting_id.clone());
                vec![LocationEvent::RegionEntered { meeting_id }]
            }
            LocationEvent::RegionExited { meeting_id } => {
                if !self.regions.contains_key(&meeting_id) {
                    trace!(meeting_id = %meeting_id, "Exit for unmonitored region dropped");
                    return Vec::new();
                }
                self.inside.remove(&meeting_id);
                vec![LocationEvent::RegionExited { meeting_id }]
            }
            LocationEvent::Sample { sample } => {
                let mut out = self.crossings(&sample);
                out.push(LocationEvent::Sample { sample });
                out
            }
        }
    }

    fn crossings(&mut self, sample: &LocationSample) -> Vec<LocationEvent> {
        if !sample.is_usable(&self.limits) {
            trace!(
                accuracy = sample.horizontal_accuracy,
                speed = sample.speed,
                "Sample outside limits, no crossing"
            );
            return Vec::new();
        }

        let mut out = Vec::new();
        for (meeting_id, region) in &self.regions {
            let contained = region.contains(&sample.coordinate);
            let was_inside = self.inside.contains(meeting_id);

            if contained && !was_inside && region.notify_on_entry {
                self.inside.insert(meeting_id.clone());
                out.push(LocationEvent::RegionEntered {
                    meeting_id: meeting_id.clone(),
                });
            } else if !contained && was_inside {
                self.inside.remove(meeting_id);
                if region.notify_on_exit {
                    out.push(LocationEvent::RegionExited {
                        meeting_id: meeting_id.clone(),
                    });
                }
            }
        }
        out
    }
}

/// Location monitor that replays events from an NDJSON stream
/// (stdin, a file, or a socket).
pub struct FeedMonitor {
    state: Arc<Mutex<FeedState>>,
    event_tx: mpsc::UnboundedSender<LocationEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<LocationEvent>>>,
}

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FeedMonitor {
    pub fn new(authorization: AuthorizationStatus, limits: SampleLimits) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            state: Arc::new(Mutex::new(FeedState {
                authorization,
                limits,
                regions: BTreeMap::new(),
                inside: BTreeSet::new(),
            })),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        }
    }

    /// Start reading events from `reader` on a background task.
    ///
    /// The task ends at EOF or on the first read error. Lines that do not
    /// parse are logged and skipped.
    pub fn spawn_reader<R>(&self, reader: R) -> JoinHandle<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let state = self.state.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut reader = reader;
            let mut line = String::new();
            let mut line_no: u64 = 0;

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        info!(lines = line_no, "Location feed ended");
                        break;
                    }
                    Ok(_) => {
                        line_no += 1;
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }

                        let event = match serde_json::from_str::<LocationEvent>(trimmed) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!(line = line_no, error = %e, "Invalid location feed line");
                                continue;
                            }
                        };

                        let outgoing = lock(&state).apply(event);
                        for event in outgoing {
                            if event_tx.send(event).is_err() {
                                debug!("Location feed subscriber gone");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Location feed read error");
                        break;
                    }
                }
            }
        })
    }
}

impl LocationMonitor for FeedMonitor {
    fn authorization_status(&self) -> AuthorizationStatus {
        lock(&self.state).authorization
    }

    fn request_authorization(&self) -> LocationResult<()> {
        // The feed itself decides; an authorization_changed line answers this.
        debug!("Authorization requested from location feed");
        Ok(())
    }

    fn start_monitoring(&self, region: &Region) -> LocationResult<()> {
        let mut state = lock(&self.state);
        if !state.authorization.is_authorized() {
            return Err(LocationError::NotAuthorized);
        }
        state.regions.insert(region.meeting_id.clone(), region.clone());
        debug!(meeting_id = %region.meeting_id, radius = region.radius_meters, "Feed region registered");
        Ok(())
    }

    fn stop_monitoring(&self, meeting_id: &MeetingId) -> LocationResult<()> {
        let mut state = lock(&self.state);
        state.inside.remove(meeting_id);
        match state.regions.remove(meeting_id) {
            Some(_) => Ok(()),
            None => Err(LocationError::UnknownRegion(meeting_id.clone())),
        }
    }

    fn monitored_regions(&self) -> Vec<MeetingId> {
        lock(&self.state).regions.keys().cloned().collect()
    }

    fn request_location(&self) -> LocationResult<()> {
        // Fixes arrive at the feed's own pace; the next sample line answers this.
        trace!("Location fix requested from feed");
        Ok(())
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<LocationEvent>> {
        self.event_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}
