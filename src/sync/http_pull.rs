//! Pull-over-HTTP client for the timer API

use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use super::{RemoteState, StateSource};
use crate::{
    error::{TimerError, TimerResult},
    state::{TimerCommand, TimerSnapshot},
};

/// Talks to `GET/POST /api/timer` on a running server.
#[derive(Clone)]
pub struct HttpTimerClient {
    http_client: reqwest::Client,
    base_url: String,
    /// Admin bearer token; only admins may send actions.
    admin_token: Option<String>,
    is_admin: bool,
}

impl HttpTimerClient {
    /// Create an observer-only client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_token: None,
            is_admin: false,
        }
    }

    /// Allow this client to send actions, optionally with a bearer token.
    pub fn as_admin(mut self, admin_token: Option<String>) -> Self {
        self.is_admin = true;
        self.admin_token = admin_token;
        self
    }

    fn timer_url(&self) -> String {
        format!("{}/api/timer", self.base_url)
    }

    /// POST an action. Non-admin clients are refused before any request is made.
    pub async fn send(&self, command: &TimerCommand) -> TimerResult<TimerSnapshot> {
        if !self.is_admin {
            return Err(TimerError::Authorization(
                "only admin clients may send timer actions".to_string(),
            ));
        }

        let mut body = json!({ "action": command.action.as_str() });
        if let Some(total) = command.total_minutes {
            body["totalMinutes"] = json!(total);
        }
        if let Some(session) = command.session_minutes {
            body["sessionMinutes"] = json!(session);
        }
        if let Some(client_id) = &command.client_id {
            body["clientId"] = json!(client_id);
        }

        let mut request = self.http_client.post(self.timer_url()).json(&body);
        if let Some(token) = &self.admin_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(rejected(status, response).await);
        }

        let payload: Value = response.json().await?;
        debug!("Sent {} to {}", command.action, self.base_url);
        Ok(serde_json::from_value(payload["state"].clone())?)
    }
}

impl StateSource for HttpTimerClient {
    async fn fetch(&self) -> TimerResult<Option<RemoteState>> {
        let response = self.http_client.get(self.timer_url()).send().await?;
        if !response.status().is_success() {
            return Err(TimerError::RemoteSync(format!(
                "GET {} returned {}",
                self.timer_url(),
                response.status()
            )));
        }
        let snapshot: TimerSnapshot = response.json().await?;
        Ok(Some(snapshot.into()))
    }

    fn describe(&self) -> String {
        self.timer_url()
    }
}

/// Map a refused POST back onto the error the server reported. Only server
/// side failures stay retryable.
async fn rejected(status: StatusCode, response: reqwest::Response) -> TimerError {
    let payload: Value = response.json().await.unwrap_or(Value::Null);
    let message = error_text(&payload);
    match status {
        StatusCode::UNAUTHORIZED => TimerError::Authorization(message),
        StatusCode::CONFLICT => TimerError::Conflict(message),
        status if status.is_client_error() => TimerError::validation("request", message),
        status => TimerError::RemoteSync(format!("{}: {}", status, message)),
    }
}

fn error_text(payload: &Value) -> String {
    payload["error"]
        .as_str()
        .unwrap_or("request failed")
        .to_string()
}

impl std::fmt::Debug for HttpTimerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTimerClient")
            .field("base_url", &self.base_url)
            .field("is_admin", &self.is_admin)
            .finish_non_exhaustive()
    }
}
