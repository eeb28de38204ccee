//! Push-over-socket delivery
//!
//! The store publishes a [`TimerUpdate`] on a broadcast channel for every
//! committed mutation; each WebSocket connection subscribes and forwards the
//! updates it did not originate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::TimerSnapshot;

/// Frames sent to WebSocket observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushMessage {
    /// Sent once when a socket connects.
    TimerState { state: TimerSnapshot },
    /// Sent for every committed mutation.
    TimerUpdate {
        action: String,
        state: TimerSnapshot,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
}

/// A committed mutation as seen by push subscribers.
#[derive(Debug, Clone)]
pub struct TimerUpdate {
    pub action: String,
    pub state: TimerSnapshot,
    pub timestamp: DateTime<Utc>,
    /// Client that caused the change, if it identified itself.
    pub origin: Option<String>,
}

impl TimerUpdate {
    pub fn new(action: impl Into<String>, state: TimerSnapshot, origin: Option<String>) -> Self {
        Self {
            action: action.into(),
            timestamp: state.server_time,
            state,
            origin,
        }
    }

    /// Whether a subscriber identified as `client_id` should receive this update.
    pub fn is_for(&self, client_id: Option<&str>) -> bool {
        match (self.origin.as_deref(), client_id) {
            (Some(origin), Some(client)) => origin != client,
            _ => true,
        }
    }

    pub fn to_message(&self) -> PushMessage {
        PushMessage::TimerUpdate {
            action: self.action.clone(),
            state: self.state.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerRecord;
    use chrono::TimeZone;

    fn update(origin: Option<&str>) -> TimerUpdate {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let state = TimerRecord::new(60_000, 30_000).snapshot(now);
        TimerUpdate::new("start", state, origin.map(str::to_string))
    }

    #[test]
    fn originator_is_skipped() {
        let update = update(Some("admin"));
        assert!(!update.is_for(Some("admin")));
        assert!(update.is_for(Some("viewer")));
        assert!(update.is_for(None));
    }

    #[test]
    fn anonymous_updates_reach_everyone() {
        assert!(update(None).is_for(Some("admin")));
    }

    #[test]
    fn update_frame_shape() {
        let json = serde_json::to_value(update(None).to_message()).unwrap();
        assert_eq!(json["type"], "timer-update");
        assert_eq!(json["action"], "start");
        assert_eq!(json["state"]["remainingTotal"], 60_000);
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }
}
