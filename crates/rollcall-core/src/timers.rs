//! Cancellable timers on an explicit clock
//!
//! The queue never looks at the system clock. The owner passes `now` to
//! [`TimerQueue::pop_due`], which lets the daemon drive it from a tokio
//! interval and lets tests drive it with simulated instants.

use chrono::{DateTime, Local};
use rollcall_util::{MeetingId, to_chrono};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What a timer does when it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// Periodic re-evaluation of a confirming meeting's dwell time
    DwellCheck(MeetingId),
    /// One-shot verdict at gate close
    Finalize(MeetingId),
    /// Periodic region registration refresh
    HorizonRefresh,
    /// One-shot agenda rebuild at local midnight
    Rollover,
}

#[derive(Debug)]
struct TimerEntry {
    kind: TimerKind,
    deadline: DateTime<Local>,
    period: Option<Duration>,
}

/// Timer queue ordered by `(deadline, handle)`.
///
/// Handles are allocated in increasing order, so timers sharing a deadline
/// fire in the order they were scheduled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_handle: u64,
    entries: HashMap<TimerHandle, TimerEntry>,
    order: BTreeSet<(DateTime<Local>, TimerHandle)>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot timer
    pub fn schedule_at(&mut self, kind: TimerKind, deadline: DateTime<Local>) -> TimerHandle {
        self.insert(kind, deadline, None)
    }

    /// Schedule a recurring timer. The first firing is at `first`.
    ///
    /// A zero period degrades to a one-shot timer.
    pub fn schedule_every(
        &mut self,
        kind: TimerKind,
        first: DateTime<Local>,
        period: Duration,
    ) -> TimerHandle {
        let period = (!period.is_zero()).then_some(period);
        self.insert(kind, first, period)
    }

    fn insert(&mut self, kind: TimerKind, deadline: DateTime<Local>, period: Option<Duration>) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        self.order.insert((deadline, handle));
        self.entries.insert(handle, TimerEntry { kind, deadline, period });
        handle
    }

    /// Cancel a timer. Returns false if it already fired (one-shot) or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.entries.remove(&handle) {
            Some(entry) => {
                self.order.remove(&(entry.deadline, handle));
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn deadline(&self, handle: TimerHandle) -> Option<DateTime<Local>> {
        self.entries.get(&handle).map(|e| e.deadline)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<DateTime<Local>> {
        self.order.first().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take the earliest timer due at `now`.
    ///
    /// One-shot timers are removed. Recurring timers keep their handle and
    /// move to the first period boundary strictly after `now`; periods that
    /// were missed entirely are coalesced into this single firing.
    pub fn pop_due(&mut self, now: DateTime<Local>) -> Option<(TimerHandle, TimerKind)> {
        let &(deadline, handle) = self.order.first()?;
        if deadline > now {
            return None;
        }
        self.order.remove(&(deadline, handle));

        match self.entries.get(&handle)?.period {
            None => {
                let entry = self.entries.remove(&handle)?;
                Some((handle, entry.kind))
            }
            Some(period) => {
                let next = next_boundary(deadline, period, now);
                let entry = self.entries.get_mut(&handle)?;
                entry.deadline = next;
                self.order.insert((next, handle));
                Some((handle, entry.kind.clone()))
            }
        }
    }
}

fn next_boundary(deadline: DateTime<Local>, period: Duration, now: DateTime<Local>) -> DateTime<Local> {
    let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX).max(1);
    let behind_ms = (now - deadline).num_milliseconds().max(0);
    let periods = behind_ms / period_ms + 1;

    match periods.checked_mul(period_ms) {
        Some(ms) => deadline + chrono::Duration::milliseconds(ms),
        None => now + to_chrono(period),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 30, hour, minute, second).unwrap()
    }

    #[test]
    fn one_shot_fires_once_at_deadline() {
        let mut timers = TimerQueue::new();
        let id = MeetingId::new("cs-331");
        let handle = timers.schedule_at(TimerKind::Finalize(id.clone()), at(10, 50, 0));

        assert!(timers.pop_due(at(10, 49, 59)).is_none());
        assert_eq!(timers.pop_due(at(10, 50, 0)), Some((handle, TimerKind::Finalize(id))));
        assert!(timers.pop_due(at(11, 0, 0)).is_none());
        assert!(!timers.is_scheduled(handle));
        assert!(!timers.cancel(handle));
    }

    #[test]
    fn due_timers_fire_in_deadline_then_schedule_order() {
        let mut timers = TimerQueue::new();
        let late = timers.schedule_at(TimerKind::Rollover, at(12, 0, 0));
        let first = timers.schedule_at(TimerKind::HorizonRefresh, at(11, 0, 0));
        let second = timers.schedule_at(TimerKind::Finalize(MeetingId::new("a")), at(11, 0, 0));

        let fired: Vec<_> = std::iter::from_fn(|| timers.pop_due(at(13, 0, 0)))
            .map(|(handle, _)| handle)
            .collect();
        assert_eq!(fired, vec![first, second, late]);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = TimerQueue::new();
        let handle = timers.schedule_at(TimerKind::Rollover, at(10, 0, 0));

        assert!(timers.cancel(handle));
        assert!(timers.pop_due(at(23, 0, 0)).is_none());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn recurring_timer_reschedules() {
        let mut timers = TimerQueue::new();
        let id = MeetingId::new("cs-331");
        let handle = timers.schedule_every(
            TimerKind::DwellCheck(id.clone()),
            at(9, 55, 5),
            Duration::from_secs(5),
        );

        assert_eq!(timers.pop_due(at(9, 55, 5)), Some((handle, TimerKind::DwellCheck(id))));
        assert_eq!(timers.deadline(handle), Some(at(9, 55, 10)));
        assert!(timers.pop_due(at(9, 55, 9)).is_none());
    }

    #[test]
    fn recurring_timer_coalesces_missed_periods() {
        let mut timers = TimerQueue::new();
        let handle = timers.schedule_every(TimerKind::HorizonRefresh, at(9, 0, 0), Duration::from_secs(5));

        // 62 seconds late: one firing, next boundary after now
        assert!(timers.pop_due(at(9, 1, 2)).is_some());
        assert!(timers.pop_due(at(9, 1, 2)).is_none());
        assert_eq!(timers.deadline(handle), Some(at(9, 1, 5)));

        // Exactly on a boundary moves to the following one
        assert!(timers.pop_due(at(9, 1, 5)).is_some());
        assert_eq!(timers.deadline(handle), Some(at(9, 1, 10)));
    }

    #[test]
    fn cancel_all_clears_everything() {
        let mut timers = TimerQueue::new();
        timers.schedule_at(TimerKind::Rollover, at(23, 59, 0));
        timers.schedule_every(TimerKind::HorizonRefresh, at(9, 0, 0), Duration::from_secs(900));
        assert_eq!(timers.len(), 2);

        timers.cancel_all();
        assert!(timers.is_empty());
        assert!(timers.pop_due(at(23, 59, 59)).is_none());
    }
}
