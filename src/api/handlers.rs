//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{TimerError, TimerResult},
    state::{AppState, TimerCommand, TimerSnapshot},
};
use super::responses::{ActionResponse, HealthResponse};

/// Header a caller may use instead of the `clientId` body field.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Handle GET /api/timer - current state with derived remaining times
pub async fn get_timer_handler(State(state): State<Arc<AppState>>) -> Json<TimerSnapshot> {
    Json(state.store.read(Utc::now()).await)
}

/// Handle POST /api/timer - apply an admin action
pub async fn post_timer_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> TimerResult<Json<ActionResponse>> {
    state.authorize(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))?;

    let Json(body) = body.map_err(|e| TimerError::validation("body", e.body_text()))?;
    let mut command = TimerCommand::from_json(&body)?;
    if command.client_id.is_none() {
        command.client_id = headers
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|id| !id.is_empty())
            .map(str::to_string);
    }
    debug!("POST /api/timer action={}", command.action);

    let outcome = state.store.apply(&command, Utc::now()).await?;
    Ok(Json(ActionResponse::new(command.action, outcome)))
}

/// Handle OPTIONS /api/timer - CORS preflight without request headers
pub async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

/// Any other method on /api/timer
pub async fn method_not_allowed_handler() -> TimerError {
    TimerError::MethodNotAllowed
}

/// Handle GET /api/health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timer_state = state.store.read(Utc::now()).await;
    Json(HealthResponse::healthy(
        state.get_uptime(),
        state.store.persistence().describe(),
        timer_state,
    ))
}
