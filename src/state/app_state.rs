//! Shared application state handed to every request handler

use std::time::Instant;

use super::TimerStore;
use crate::error::{TimerError, TimerResult};

/// Everything a handler needs: the timer store plus server metadata.
#[derive(Debug)]
pub struct AppState {
    pub store: TimerStore,
    /// Bearer token required for mutations; `None` leaves POST open.
    admin_token: Option<String>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    pub fn new(store: TimerStore, port: u16, host: String, admin_token: Option<String>) -> Self {
        Self {
            store,
            admin_token: admin_token.filter(|token| !token.is_empty()),
            start_time: Instant::now(),
            port,
            host,
        }
    }

    pub fn requires_admin_token(&self) -> bool {
        self.admin_token.is_some()
    }

    /// Check an `Authorization` header value against the admin token.
    pub fn authorize(&self, authorization: Option<&str>) -> TimerResult<()> {
        let Some(expected) = self.admin_token.as_deref() else {
            return Ok(());
        };
        match authorization.and_then(|value| value.strip_prefix("Bearer ")) {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(TimerError::Authorization("admin token rejected".to_string())),
            None => Err(TimerError::Authorization("admin token missing".to_string())),
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
