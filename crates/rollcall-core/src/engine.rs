//! Core attendance engine

use chrono::{DateTime, Local, NaiveDate};
use rollcall_api::{
    AuthorizationStatus, EngineSnapshot, LocationSample, Meeting, MeetingStatus, MeetingView, Verdict,
};
use rollcall_config::EngineParams;
use rollcall_location_api::{LocationEvent, LocationMonitor, Region};
use rollcall_store::{AuditEvent, AuditEventType, RecordOutcome, Store, VerdictRecord};
use rollcall_util::{MeetingId, Result, RunId, format_clock_time, next_local_midnight, to_chrono};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::{
    AgendaItem, CoreEvent, MeetingCatalog, MeetingRuntime, RegionWatch, TimerHandle, TimerKind,
    TimerQueue, in_window,
};

/// The attendance engine.
///
/// A plain owned value: every transition is a `&mut self` call carrying the
/// current instant, so the caller decides what "now" is. The daemon feeds it
/// from one serialized loop; tests feed it simulated instants.
pub struct CoreEngine {
    params: EngineParams,
    store: Arc<dyn Store>,
    watch: RegionWatch,
    catalog: MeetingCatalog,
    runtimes: BTreeMap<MeetingId, MeetingRuntime>,
    timers: TimerQueue,
    run_id: Option<RunId>,
    day: Option<NaiveDate>,
}

impl CoreEngine {
    /// Create a new engine with an empty catalog
    pub fn new(params: EngineParams, store: Arc<dyn Store>, monitor: Arc<dyn LocationMonitor>) -> Self {
        let watch = RegionWatch::new(monitor);

        info!(
            dwell_required_secs = params.dwell_required.as_secs(),
            lead_in_secs = params.lead_in.as_secs(),
            grace_out_secs = params.grace_out.as_secs(),
            exclusive_dwell = params.exclusive_dwell,
            authorization = ?watch.authorization(),
            "Core engine initialized"
        );

        Self {
            params,
            store,
            watch,
            catalog: MeetingCatalog::new(),
            runtimes: BTreeMap::new(),
            timers: TimerQueue::new(),
            run_id: None,
            day: None,
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn catalog(&self) -> &MeetingCatalog {
        &self.catalog
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn runtime(&self, meeting_id: &MeetingId) -> Option<&MeetingRuntime> {
        self.runtimes.get(meeting_id)
    }

    pub fn status(&self, meeting_id: &MeetingId) -> Option<MeetingStatus> {
        self.runtimes
            .get(meeting_id)
            .map(|rt| rt.status(self.watch.is_registered(meeting_id)))
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<DateTime<Local>> {
        self.timers.next_deadline()
    }

    /// Replace the catalog and start a fresh run for the current day.
    ///
    /// Every outstanding timer is cancelled and every region released before
    /// the new agenda is applied. On error (duplicate meeting id) nothing
    /// changes.
    pub fn configure(&mut self, meetings: Vec<Meeting>, now: DateTime<Local>) -> Result<Vec<CoreEvent>> {
        self.catalog.configure(meetings)?;

        self.teardown(now);
        self.run_id = Some(RunId::new());

        let mut events = vec![self.apply_agenda(now)];

        self.timers.schedule_every(
            TimerKind::HorizonRefresh,
            now + to_chrono(self.params.registration_refresh),
            self.params.registration_refresh,
        );
        self.schedule_rollover(now);
        self.reconcile(now);

        let authorization = self.watch.authorization();
        if authorization.is_denied() {
            warn!(status = ?authorization, "Location access denied, every meeting will finalize absent");
            self.audit(AuditEventType::AuthorizationChanged { status: authorization }, now);
            events.push(CoreEvent::AuthorizationChanged { status: authorization });
        }

        // Gates that already closed today finalize immediately
        events.extend(self.tick(now));
        Ok(events)
    }

    /// Cancel all timers and release all regions
    pub fn shutdown(&mut self, now: DateTime<Local>) {
        self.teardown(now);
        self.run_id = None;
        info!("Core engine stopped");
    }

    fn teardown(&mut self, now: DateTime<Local>) {
        self.timers.cancel_all();
        for meeting_id in self.watch.release_all() {
            self.audit(AuditEventType::RegionReleased { meeting_id }, now);
        }
        self.runtimes.clear();
    }

    /// Build runtimes for today's agenda, plus tomorrow's meetings whose lead-in
    /// starts before midnight. Runtimes that already exist (a gate from
    /// yesterday that is still open) are kept as they are.
    fn apply_agenda(&mut self, now: DateTime<Local>) -> CoreEvent {
        let agenda = self.catalog.today(now, &self.params);
        let opening_tonight = self.catalog.opening_tonight(now, &self.params);
        let run_id = self.run_id.unwrap_or_default();
        let meeting_count = agenda.len() + opening_tonight.len();
        self.day = Some(agenda.day);

        for item in agenda.items.into_iter().chain(opening_tonight) {
            if self.runtimes.contains_key(&item.meeting.id) {
                continue;
            }

            let mut runtime = self.restore_runtime(item);
            if !runtime.is_terminal() {
                runtime.finalize_timer = Some(self.timers.schedule_at(
                    TimerKind::Finalize(runtime.meeting.id.clone()),
                    runtime.window.gate_close,
                ));
            }
            self.runtimes.insert(runtime.meeting.id.clone(), runtime);
        }

        self.audit(
            AuditEventType::AgendaApplied {
                run_id,
                day: agenda.day,
                catalog_size: self.catalog.len(),
                agenda_size: meeting_count,
            },
            now,
        );

        info!(
            run_id = %run_id,
            day = %agenda.day,
            catalog_size = self.catalog.len(),
            meeting_count,
            "Agenda applied"
        );

        CoreEvent::AgendaApplied {
            run_id,
            day: agenda.day,
            meeting_count,
        }
    }

    /// Start from the ledger so a verdict is never issued twice for a day
    fn restore_runtime(&self, item: AgendaItem) -> MeetingRuntime {
        let day = item.window.occurrence.day();
        match self.store.get_verdict(&item.meeting.id, day) {
            Ok(Some(record)) => {
                debug!(
                    meeting_id = %item.meeting.id,
                    verdict = %record.verdict,
                    "Verdict already recorded for today"
                );
                MeetingRuntime::decided(item.meeting, item.window, record.verdict, record.decided_at)
            }
            Ok(None) => MeetingRuntime::new(item.meeting, item.window),
            Err(e) => {
                warn!(meeting_id = %item.meeting.id, error = %e, "Failed to read ledger");
                MeetingRuntime::new(item.meeting, item.window)
            }
        }
    }

    fn schedule_rollover(&mut self, now: DateTime<Local>) {
        match next_local_midnight(&now) {
            Some(midnight) => {
                self.timers.schedule_at(TimerKind::Rollover, midnight);
            }
            None => warn!(now = %now, "Could not compute next midnight, day rollover disabled"),
        }
    }

    /// Register geofences for undecided meetings whose gate overlaps the
    /// registration horizon, soonest first.
    fn reconcile(&mut self, now: DateTime<Local>) {
        let horizon_end = now + to_chrono(self.params.registration_horizon);

        let mut eligible: Vec<&MeetingRuntime> = self
            .runtimes
            .values()
            .filter(|rt| !rt.is_terminal() && rt.window.overlaps(now, horizon_end))
            .collect();
        eligible.sort_by(|a, b| {
            a.window
                .gate_open
                .cmp(&b.window.gate_open)
                .then_with(|| a.meeting.id.cmp(&b.meeting.id))
        });
        let desired: Vec<Region> = eligible.iter().map(|rt| Region::for_meeting(&rt.meeting)).collect();

        let outcome = self.watch.reconcile(&desired);
        for meeting_id in outcome.released {
            self.audit(AuditEventType::RegionReleased { meeting_id }, now);
        }
        for meeting_id in outcome.registered {
            self.audit(AuditEventType::RegionRegistered { meeting_id }, now);
        }
    }

    /// Apply one event from the location service
    pub fn handle_location_event(&mut self, event: LocationEvent, now: DateTime<Local>) -> Vec<CoreEvent> {
        match event {
            LocationEvent::AuthorizationChanged { status } => self.on_authorization_changed(status, now),
            LocationEvent::RegionEntered { meeting_id } => self.on_region_entered(&meeting_id, now),
            LocationEvent::RegionExited { meeting_id } => {
                self.on_region_exited(&meeting_id, now).into_iter().collect()
            }
            LocationEvent::Sample { sample } => {
                self.on_sample(&sample);
                Vec::new()
            }
        }
    }

    fn on_authorization_changed(&mut self, status: AuthorizationStatus, now: DateTime<Local>) -> Vec<CoreEvent> {
        if !self.watch.set_authorization(status) {
            debug!(status = ?status, "Authorization unchanged");
            return Vec::new();
        }

        self.audit(AuditEventType::AuthorizationChanged { status }, now);
        let mut events = vec![CoreEvent::AuthorizationChanged { status }];

        if status.is_denied() {
            warn!(status = ?status, "Location access denied, remaining meetings will finalize absent");

            // Without location access a dwell can no longer be verified
            let confirming: Vec<MeetingId> = self
                .runtimes
                .values()
                .filter(|rt| rt.is_confirming())
                .map(|rt| rt.meeting.id.clone())
                .collect();
            for meeting_id in confirming {
                events.extend(self.abandon_dwell(&meeting_id, now));
            }

            for meeting_id in self.watch.release_all() {
                self.audit(AuditEventType::RegionReleased { meeting_id }, now);
            }
        } else {
            self.reconcile(now);
        }

        events
    }

    fn on_region_entered(&mut self, meeting_id: &MeetingId, now: DateTime<Local>) -> Vec<CoreEvent> {
        let Some(runtime) = self.runtimes.get(meeting_id) else {
            debug!(meeting_id = %meeting_id, "Entry for unknown meeting ignored");
            return Vec::new();
        };
        if runtime.is_terminal() {
            debug!(meeting_id = %meeting_id, "Entry after verdict ignored");
            return Vec::new();
        }
        if runtime.is_confirming() {
            debug!(meeting_id = %meeting_id, "Repeated entry while confirming ignored");
            return Vec::new();
        }
        if !in_window(&runtime.meeting, now, &self.params) {
            debug!(
                meeting_id = %meeting_id,
                at = %format_clock_time(&now),
                gate_open = %format_clock_time(&runtime.window.gate_open),
                "Entry outside gate ignored"
            );
            return Vec::new();
        }

        let mut events = Vec::new();

        if self.params.exclusive_dwell {
            let others: Vec<MeetingId> = self
                .runtimes
                .values()
                .filter(|rt| rt.is_confirming() && &rt.meeting.id != meeting_id)
                .map(|rt| rt.meeting.id.clone())
                .collect();
            for other in others {
                debug!(meeting_id = %other, entered = %meeting_id, "Dwell handed to newer entry");
                events.extend(self.abandon_dwell(&other, now));
            }
        }

        let interval = self.params.dwell_check_interval;
        let dwell_timer = self.timers.schedule_every(
            TimerKind::DwellCheck(meeting_id.clone()),
            now + to_chrono(interval),
            interval,
        );

        let Some(runtime) = self.runtimes.get_mut(meeting_id) else {
            self.timers.cancel(dwell_timer);
            return events;
        };
        runtime.begin_dwell(now, dwell_timer);

        self.watch.request_sample();
        self.audit(
            AuditEventType::DwellStarted {
                meeting_id: meeting_id.clone(),
            },
            now,
        );

        info!(meeting_id = %meeting_id, at = %format_clock_time(&now), "Dwell started");

        events.push(CoreEvent::DwellStarted {
            meeting_id: meeting_id.clone(),
            entered_at: now,
        });
        events
    }

    fn on_region_exited(&mut self, meeting_id: &MeetingId, now: DateTime<Local>) -> Option<CoreEvent> {
        match self.runtimes.get(meeting_id) {
            Some(rt) if rt.is_confirming() => self.abandon_dwell(meeting_id, now),
            Some(_) => {
                debug!(meeting_id = %meeting_id, "Exit while not confirming ignored");
                None
            }
            None => {
                debug!(meeting_id = %meeting_id, "Exit for unknown meeting ignored");
                None
            }
        }
    }

    /// Samples never change state: a bad fix is noise or transit, a good one
    /// is consistent with the dwell already running.
    fn on_sample(&self, sample: &LocationSample) {
        let mut confirming = self.runtimes.values().filter(|rt| rt.is_confirming()).peekable();
        if confirming.peek().is_none() {
            trace!("Location sample with no meeting confirming");
            return;
        }

        for runtime in confirming {
            if runtime.sample_qualifies(sample, &self.params) {
                trace!(meeting_id = %runtime.meeting.id, "Sample consistent with presence");
            } else {
                trace!(
                    meeting_id = %runtime.meeting.id,
                    accuracy = sample.horizontal_accuracy,
                    speed = sample.speed,
                    distance = runtime.meeting.center.distance_to(&sample.coordinate),
                    "Sample discarded"
                );
            }
        }
    }

    /// Confirming -> Idle
    fn abandon_dwell(&mut self, meeting_id: &MeetingId, now: DateTime<Local>) -> Option<CoreEvent> {
        let timer = self.runtimes.get_mut(meeting_id)?.abandon_dwell()?;
        self.timers.cancel(timer);

        self.audit(
            AuditEventType::DwellAbandoned {
                meeting_id: meeting_id.clone(),
            },
            now,
        );
        info!(meeting_id = %meeting_id, at = %format_clock_time(&now), "Dwell abandoned");

        Some(CoreEvent::DwellAbandoned {
            meeting_id: meeting_id.clone(),
        })
    }

    /// Fire every timer due at `now`, earliest first
    pub fn tick(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        let mut events = Vec::new();

        while let Some((handle, kind)) = self.timers.pop_due(now) {
            match kind {
                TimerKind::DwellCheck(meeting_id) => {
                    events.extend(self.on_dwell_check(&meeting_id, handle, now));
                }
                TimerKind::Finalize(meeting_id) => {
                    events.extend(self.on_finalize(&meeting_id, now));
                }
                TimerKind::HorizonRefresh => {
                    trace!("Refreshing region registrations");
                    self.reconcile(now);
                }
                TimerKind::Rollover => {
                    events.extend(self.on_rollover(now));
                }
            }
        }

        events
    }

    fn on_dwell_check(&mut self, meeting_id: &MeetingId, handle: TimerHandle, now: DateTime<Local>) -> Option<CoreEvent> {
        let Some(runtime) = self.runtimes.get(meeting_id).filter(|rt| rt.is_confirming()) else {
            debug!(meeting_id = %meeting_id, "Stale dwell check cancelled");
            self.timers.cancel(handle);
            return None;
        };

        if !runtime.dwell_satisfied(now, &self.params) || !in_window(&runtime.meeting, now, &self.params) {
            return None;
        }

        self.conclude(meeting_id, Verdict::Present, now)
    }

    fn on_finalize(&mut self, meeting_id: &MeetingId, now: DateTime<Local>) -> Option<CoreEvent> {
        let runtime = self.runtimes.get_mut(meeting_id)?;
        runtime.finalize_timer = None;

        if runtime.is_terminal() {
            debug!(meeting_id = %meeting_id, "Finalization after verdict ignored");
            return None;
        }

        self.conclude(meeting_id, Verdict::Absent, now)
    }

    /// Move a meeting to its verdict: cancel its timers, release its region,
    /// write the ledger.
    fn conclude(&mut self, meeting_id: &MeetingId, verdict: Verdict, now: DateTime<Local>) -> Option<CoreEvent> {
        let runtime = self.runtimes.get_mut(meeting_id)?;

        if let Some(timer) = runtime.abandon_dwell() {
            self.timers.cancel(timer);
        }
        if !runtime.decide(verdict, now) {
            debug!(meeting_id = %meeting_id, "Verdict already reached");
            return None;
        }
        if let Some(timer) = runtime.finalize_timer.take() {
            self.timers.cancel(timer);
        }

        let record = VerdictRecord {
            meeting_id: meeting_id.clone(),
            day: runtime.day,
            label: runtime.meeting.name.clone(),
            verdict,
            decided_at: now,
            cost: runtime.meeting.cost,
        };

        if self.watch.release(meeting_id) {
            self.audit(
                AuditEventType::RegionReleased {
                    meeting_id: meeting_id.clone(),
                },
                now,
            );
        }

        match self.store.record_verdict(&record) {
            Ok(RecordOutcome::Recorded) => {}
            Ok(RecordOutcome::Duplicate) => {
                debug!(meeting_id = %meeting_id, day = %record.day, "Ledger already held a verdict");
            }
            Err(e) => {
                warn!(meeting_id = %meeting_id, error = %e, "Failed to record verdict");
            }
        }

        self.audit(
            AuditEventType::VerdictReached {
                meeting_id: meeting_id.clone(),
                verdict,
            },
            now,
        );

        info!(
            meeting_id = %meeting_id,
            label = %record.label,
            verdict = %verdict,
            at = %format_clock_time(&now),
            "Verdict reached"
        );

        Some(CoreEvent::VerdictReached {
            meeting_id: meeting_id.clone(),
            verdict,
            at: now,
        })
    }

    fn on_rollover(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        let before = self.runtimes.len();
        self.runtimes.retain(|_, rt| !rt.is_terminal());
        debug!(
            dropped = before - self.runtimes.len(),
            carried = self.runtimes.len(),
            "Day rollover"
        );

        self.run_id = Some(RunId::new());
        let event = self.apply_agenda(now);
        self.schedule_rollover(now);
        self.reconcile(now);

        vec![event]
    }

    /// Point-in-time view of the engine, agenda in gate order
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut agenda: Vec<MeetingView> = self
            .runtimes
            .values()
            .map(|rt| rt.view(self.watch.is_registered(&rt.meeting.id)))
            .collect();
        agenda.sort_by(|a, b| {
            a.gate_open
                .cmp(&b.gate_open)
                .then_with(|| a.meeting_id.cmp(&b.meeting_id))
        });

        EngineSnapshot {
            run_id: self.run_id,
            day: self.day,
            authorization: self.watch.authorization(),
            catalog_size: self.catalog.len(),
            agenda,
        }
    }

    fn audit(&self, event: AuditEventType, at: DateTime<Local>) {
        if let Err(e) = self.store.append_audit(AuditEvent::at(event, at)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}
