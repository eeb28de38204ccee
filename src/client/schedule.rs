//! Sync cadence table: observed state → polling interval

use std::time::Duration;

use serde::Serialize;

use crate::state::RunState;

/// How often the local display is recomputed.
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// How often the observer decides whether a sync is due.
pub const SYNC_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Whether the observer's view is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Visible,
    /// Still drawing but not focused; polls slowly.
    Background,
    /// Not drawn at all; redraw and sync are suspended.
    Hidden,
}

/// Row of the cadence table the observer is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cadence {
    Running,
    Paused,
    Stopped,
    AdminActive,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSchedule {
    pub running: Duration,
    pub paused: Duration,
    pub stopped: Duration,
    pub admin_active: Duration,
    pub background: Duration,
    /// An admin counts as active this long after their last input.
    pub admin_activity_window: Duration,
}

impl Default for SyncSchedule {
    fn default() -> Self {
        Self {
            running: Duration::from_secs(30),
            paused: Duration::from_secs(60),
            stopped: Duration::from_secs(300),
            admin_active: Duration::from_secs(10),
            background: Duration::from_secs(120),
            admin_activity_window: Duration::from_secs(60),
        }
    }
}

impl SyncSchedule {
    /// Pick the table row. Background beats admin activity, which beats the
    /// run state.
    pub fn cadence(&self, run_state: RunState, visibility: Visibility, admin_active: bool) -> Cadence {
        if visibility != Visibility::Visible {
            Cadence::Background
        } else if admin_active {
            Cadence::AdminActive
        } else {
            match run_state {
                RunState::Running => Cadence::Running,
                RunState::Paused => Cadence::Paused,
                RunState::Stopped => Cadence::Stopped,
            }
        }
    }

    pub fn interval(&self, cadence: Cadence) -> Duration {
        match cadence {
            Cadence::Running => self.running,
            Cadence::Paused => self.paused,
            Cadence::Stopped => self.stopped,
            Cadence::AdminActive => self.admin_active,
            Cadence::Background => self.background,
        }
    }
}

/// Requests per hour at a fixed interval, rounded up.
pub fn estimated_calls_per_hour(interval: Duration) -> u64 {
    let secs = interval.as_secs().max(1);
    3600u64.div_ceil(secs)
}
