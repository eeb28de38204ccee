//! Observer-side cache of the timer record
//!
//! The reconciler never touches the network. The observer loop feeds it
//! fetch results and asks it what to draw and when to fetch next; every
//! method takes the current instant so behaviour is deterministic.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::schedule::{estimated_calls_per_hour, Cadence, SyncSchedule, Visibility};
use crate::{
    error::TimerError,
    state::{RunState, TimerRecord, TimerSnapshot},
    sync::{RemoteState, RetryPolicy},
};

/// Connection indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Retrying { attempt: u32 },
    /// Retries exhausted; showing the last known state.
    Offline,
}

/// A run-state change observed in fetched data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Paused,
    Resumed,
    Stopped,
}

impl Transition {
    fn between(before: RunState, after: RunState) -> Option<Self> {
        match (before, after) {
            (RunState::Stopped, RunState::Running | RunState::Paused) => Some(Transition::Started),
            (RunState::Running, RunState::Paused) => Some(Transition::Paused),
            (RunState::Paused, RunState::Running) => Some(Transition::Resumed),
            (RunState::Running | RunState::Paused, RunState::Stopped) => Some(Transition::Stopped),
            _ => None,
        }
    }
}

/// Figures reported by [`ClientReconciler::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub cadence: Cadence,
    pub current_interval_secs: u64,
    pub estimated_calls_per_hour: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub status: ConnectionStatus,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct ClientReconciler {
    record: TimerRecord,
    is_admin: bool,
    schedule: SyncSchedule,
    retry: RetryPolicy,
    visibility: Visibility,
    needs_sync: bool,
    last_sync: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    retry_count: u32,
    next_retry_at: Option<DateTime<Utc>>,
    /// Server clock minus local clock, from the last response that reported it.
    clock_offset: chrono::Duration,
    /// Version for which a local expiry already requested a sync.
    expiry_flagged_version: Option<u64>,
    status: ConnectionStatus,
}

impl ClientReconciler {
    pub fn new(initial: TimerRecord, is_admin: bool) -> Self {
        Self {
            record: initial,
            is_admin,
            schedule: SyncSchedule::default(),
            retry: RetryPolicy::default(),
            visibility: Visibility::Visible,
            needs_sync: true,
            last_sync: None,
            last_activity: None,
            retry_count: 0,
            next_retry_at: None,
            clock_offset: chrono::Duration::zero(),
            expiry_flagged_version: None,
            status: ConnectionStatus::Connecting,
        }
    }

    pub fn with_schedule(mut self, schedule: SyncSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn record(&self) -> &TimerRecord {
        &self.record
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn admin_active(&self, now: DateTime<Utc>) -> bool {
        self.is_admin
            && self
                .last_activity
                .and_then(|at| (now - at).to_std().ok())
                .is_some_and(|idle| idle < self.schedule.admin_activity_window)
    }

    pub fn cadence(&self, now: DateTime<Utc>) -> Cadence {
        self.schedule
            .cadence(self.record.run_state(), self.visibility, self.admin_active(now))
    }

    pub fn current_interval(&self, now: DateTime<Utc>) -> Duration {
        self.schedule.interval(self.cadence(now))
    }

    /// Note admin input; only affects admin observers.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    /// Request a fetch at the next opportunity.
    pub fn request_sync(&mut self) {
        self.needs_sync = true;
    }

    /// Whether a fetch is due at `now`.
    pub fn should_sync(&self, now: DateTime<Utc>) -> bool {
        if self.visibility == Visibility::Hidden {
            return false;
        }
        if let Some(retry_at) = self.next_retry_at {
            return now >= retry_at;
        }
        if self.needs_sync {
            return true;
        }
        match self.last_sync {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|since| since >= self.current_interval(now))
                .unwrap_or(false),
        }
    }

    /// Record a visibility change. Returns true when the caller should fetch
    /// immediately, which happens whenever the view comes back from hidden or
    /// otherwise changes while drawable.
    pub fn set_visibility(&mut self, visibility: Visibility) -> bool {
        if visibility == self.visibility {
            return false;
        }
        debug!("Visibility {:?} -> {:?}", self.visibility, visibility);
        self.visibility = visibility;
        if visibility == Visibility::Hidden {
            return false;
        }
        self.needs_sync = true;
        true
    }

    /// Merge a fetched record. Resets the sync phase and returns the run-state
    /// transition it reveals, if any.
    pub fn merge(&mut self, remote: RemoteState, now: DateTime<Utc>) -> Option<Transition> {
        let before = self.record.run_state();
        if let Some(server_time) = remote.server_time {
            self.clock_offset = server_time - now;
        }
        self.record = remote.record;
        self.mark_synced(now);

        let transition = Transition::between(before, self.record.run_state());
        if let Some(transition) = transition {
            info!("Timer {:?} (v{})", transition, self.record.version);
        }
        transition
    }

    /// A fetch succeeded but had nothing newer.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.last_sync = Some(now);
        self.needs_sync = false;
        self.retry_count = 0;
        self.next_retry_at = None;
        self.status = ConnectionStatus::Connected;
    }

    /// A fetch failed. Schedules a backoff retry, or goes offline once the
    /// retry cap is hit and falls back to the normal cadence.
    pub fn record_failure(&mut self, error: &TimerError, now: DateTime<Utc>) {
        self.retry_count += 1;
        match self.retry.delay_for(self.retry_count) {
            Some(delay) => {
                warn!(
                    "Sync failed: {}; retry {}/{} in {:?}",
                    error, self.retry_count, self.retry.max_retries, delay
                );
                self.next_retry_at = chrono::Duration::from_std(delay).ok().map(|d| now + d);
                self.status = ConnectionStatus::Retrying {
                    attempt: self.retry_count,
                };
            }
            None => {
                warn!("Sync failed: {}; retries exhausted, continuing offline", error);
                self.retry_count = 0;
                self.next_retry_at = None;
                self.needs_sync = false;
                self.last_sync = Some(now);
                self.status = ConnectionStatus::Offline;
            }
        }
    }

    /// Interpolate the display at `now` from the cached record.
    ///
    /// When the local clocks show that the server must have advanced the
    /// session or stopped the timer, a sync is requested once per version.
    pub fn redraw(&mut self, now: DateTime<Utc>) -> TimerSnapshot {
        let snapshot = self.record.snapshot(now + self.clock_offset);
        let ticking = self.record.run_state() == RunState::Running;
        let rolled_over = snapshot.remaining_session == 0 || snapshot.remaining_total == 0;
        if ticking && rolled_over && self.expiry_flagged_version != Some(self.record.version) {
            debug!("Local clock ran out at v{}, requesting sync", self.record.version);
            self.expiry_flagged_version = Some(self.record.version);
            self.needs_sync = true;
        }
        snapshot
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SyncStats {
        let interval = self.current_interval(now);
        SyncStats {
            cadence: self.cadence(now),
            current_interval_secs: interval.as_secs(),
            estimated_calls_per_hour: estimated_calls_per_hour(interval),
            last_sync: self.last_sync,
            retry_count: self.retry_count,
            status: self.status,
            version: self.record.version,
        }
    }
}
