//! Admin actions and their request parameters

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::time_basis::minutes_to_ms;
use crate::error::{TimerError, TimerResult};

/// An admin action understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Fresh start when stopped, resume when paused.
    Start,
    Pause,
    Reset,
    NextSession,
    SetTime,
    Stop,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Start,
        Action::Pause,
        Action::Reset,
        Action::NextSession,
        Action::SetTime,
        Action::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Pause => "pause",
            Action::Reset => "reset",
            Action::NextSession => "nextSession",
            Action::SetTime => "setTime",
            Action::Stop => "stop",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = TimerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| TimerError::validation("action", format!("unknown action '{}'", s)))
    }
}

/// A validated POST body.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerCommand {
    pub action: Action,
    pub total_minutes: Option<f64>,
    pub session_minutes: Option<f64>,
    /// Identifies the caller so push observers can skip their own echo.
    pub client_id: Option<String>,
}

impl TimerCommand {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            total_minutes: None,
            session_minutes: None,
            client_id: None,
        }
    }

    pub fn with_minutes(mut self, total: Option<f64>, session: Option<f64>) -> Self {
        self.total_minutes = total;
        self.session_minutes = session;
        self
    }

    /// Parse and validate a JSON request body.
    pub fn from_json(body: &Value) -> TimerResult<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| TimerError::validation("body", "expected a JSON object"))?;

        let action = match object.get("action") {
            None | Some(Value::Null) => {
                return Err(TimerError::validation("action", "missing required field"))
            }
            Some(Value::String(name)) => name.parse::<Action>()?,
            Some(_) => return Err(TimerError::validation("action", "must be a string")),
        };

        let client_id = match object.get("clientId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(_) => return Err(TimerError::validation("clientId", "must be a non-empty string")),
        };

        Ok(Self {
            action,
            total_minutes: minutes_field(object, "totalMinutes")?,
            session_minutes: minutes_field(object, "sessionMinutes")?,
            client_id,
        })
    }

    pub fn total_duration_ms(&self) -> Option<u64> {
        self.total_minutes.map(minutes_to_ms)
    }

    pub fn session_duration_ms(&self) -> Option<u64> {
        self.session_minutes.map(minutes_to_ms)
    }
}

fn minutes_field(object: &serde_json::Map<String, Value>, field: &str) -> TimerResult<Option<f64>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_f64() {
            Some(minutes) if minutes.is_finite() && minutes > 0.0 => Ok(Some(minutes)),
            _ => Err(TimerError::validation(field, "must be a positive number of minutes")),
        },
    }
}
