//! Server-side session clock

use std::{sync::Arc, time::Duration};
use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::{AppState, SettleEvent};

/// Background task that settles session rollover and expiry on a fixed period,
/// so push observers see them even when nobody is polling.
pub async fn session_clock_task(state: Arc<AppState>, period: Duration) {
    info!("Starting session clock task (every {:?})", period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match state.store.settle(Utc::now()).await {
            Some(SettleEvent::SessionAdvanced) => debug!("Session clock advanced the session"),
            Some(SettleEvent::Expired) => debug!("Session clock stopped the expired timer"),
            None => {}
        }
    }
}
