//! Helpers shared by tests that need a live HTTP listener

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use tokio::net::TcpListener;

use crate::{
    api::create_router,
    persistence::Persistence,
    state::{AppState, TimerRecord, TimerStore},
};

/// Serve `app` on an ephemeral localhost port for the rest of the test.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A running timer server with a stopped 20/10 minute in-memory timer.
pub async fn serve_timer(admin_token: Option<&str>) -> (SocketAddr, Arc<AppState>) {
    let store = TimerStore::with_record(TimerRecord::new(1_200_000, 600_000), Persistence::Memory);
    let state = Arc::new(AppState::new(
        store,
        0,
        "127.0.0.1".to_string(),
        admin_token.map(str::to_string),
    ));
    let addr = serve(create_router(Arc::clone(&state))).await;
    (addr, state)
}
