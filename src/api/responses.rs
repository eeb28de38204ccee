//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Action, ApplyOutcome, TimerSnapshot};

/// Response to `POST /api/timer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub state: TimerSnapshot,
    pub message: String,
    /// False when the action was a no-op in the current state.
    pub changed: bool,
}

impl ActionResponse {
    pub fn new(action: Action, outcome: ApplyOutcome) -> Self {
        let message = if outcome.changed {
            format!("Timer {} successful", action)
        } else {
            format!("Timer {} had no effect", action)
        };
        Self {
            success: true,
            state: outcome.snapshot,
            message,
            changed: outcome.changed,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    pub persistence: String,
    #[serde(rename = "timerState")]
    pub timer_state: TimerSnapshot,
}

impl HealthResponse {
    pub fn healthy(uptime: String, persistence: String, timer_state: TimerSnapshot) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: timer_state.server_time,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
            persistence,
            timer_state,
        }
    }
}
