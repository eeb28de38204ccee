//! Session Timer - A shared countdown timer served over HTTP and WebSocket
//!
//! This is the main entry point for the session-timer server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use session_timer::{
    config::Config,
    persistence::Persistence,
    state::{AppState, TimerStore},
    api::create_router,
    sync::{GithubStore, RetryPolicy},
    tasks::{remote_mirror_task, session_clock_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("session_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting session-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, total={}min, session={}min",
          config.host, config.port, config.total_minutes, config.session_minutes);

    let persistence = Persistence::from_path(config.state_file.clone());
    info!("Timer state storage: {}", persistence.describe());
    let store = TimerStore::open(
        config.total_duration_ms(),
        config.session_duration_ms(),
        persistence,
    ).await;

    // Create application state
    let state = Arc::new(AppState::new(
        store,
        config.port,
        config.host.clone(),
        config.admin_token.clone(),
    ));
    if state.requires_admin_token() {
        info!("Admin token required for timer actions");
    }

    // Settle session rollover and expiry even when nobody polls
    if let Some(period) = config.tick_period() {
        let clock_state = Arc::clone(&state);
        tokio::spawn(async move {
            session_clock_task(clock_state, period).await;
        });
    }

    // Mirror committed state into GitHub when configured
    if let Some(github) = config.github() {
        if github.token.is_none() {
            tracing::warn!("GitHub mirror configured without a token; writes will be rejected");
        }
        info!("Mirroring timer state to {}", github.contents_url());
        let mirror_state = Arc::clone(&state);
        tokio::spawn(async move {
            remote_mirror_task(mirror_state, GithubStore::new(github), RetryPolicy::default()).await;
        });
    }

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /api/timer  - Current timer state");
    info!("  POST /api/timer  - Timer action (start, pause, reset, nextSession, setTime, stop)");
    info!("  GET  /api/health - Health check");
    info!("  GET  /ws         - WebSocket push updates");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
