//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;
pub mod ws;

use std::sync::Arc;
use axum::{
    http::{header, HeaderName, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;
use handlers::*;
use ws::ws_handler;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/timer",
            get(get_timer_handler)
                .post(post_timer_handler)
                .options(preflight_handler)
                .fallback(method_not_allowed_handler),
        )
        .route("/api/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Every response carries `Access-Control-Allow-Origin: *`.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(CLIENT_ID_HEADER),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistence::Persistence,
        state::{TimerRecord, TimerStore},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with_token(token: Option<&str>) -> Router {
        let store = TimerStore::with_record(TimerRecord::new(1_200_000, 600_000), Persistence::Memory);
        let state = AppState::new(store, 3000, "127.0.0.1".to_string(), token.map(str::to_string));
        create_router(Arc::new(state))
    }

    fn app() -> Router {
        app_with_token(None)
    }

    fn post(body: Value) -> Request<Body> {
        Request::post("/api/timer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn get_returns_derived_fields() {
        let response = app()
            .oneshot(Request::get("/api/timer").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let body = json_body(response).await;
        assert_eq!(body["isRunning"], false);
        assert_eq!(body["remainingTotal"], 1_200_000);
        assert_eq!(body["remainingSession"], 600_000);
        assert!(body["serverTime"].is_i64());
    }

    #[tokio::test]
    async fn post_start_then_get_is_running() {
        let app = app();
        let response = app.clone().oneshot(post(json!({ "action": "start" }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["changed"], true);
        assert_eq!(body["message"], "Timer start successful");
        assert_eq!(body["state"]["isRunning"], true);
        assert_eq!(body["state"]["version"], 1);

        let response = app
            .oneshot(Request::get("/api/timer").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(response).await["isRunning"], true);
    }

    #[tokio::test]
    async fn reset_with_minutes() {
        let response = app()
            .oneshot(post(json!({ "action": "reset", "totalMinutes": 30, "sessionMinutes": 10 })))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["state"]["remainingTotal"], 1_800_000);
        assert_eq!(body["state"]["remainingSession"], 600_000);
    }

    #[tokio::test]
    async fn unknown_action_is_400() {
        let response = app().oneshot(post(json!({ "action": "launch" }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].as_str().unwrap().contains("launch"));
    }

    #[tokio::test]
    async fn missing_action_is_400() {
        let response = app().oneshot(post(json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].as_str().unwrap().contains("action"));
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let request = Request::post("/api/timer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ nope"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn set_time_while_running_is_409() {
        let app = app();
        app.clone().oneshot(post(json!({ "action": "start" }))).await.unwrap();
        let response = app
            .oneshot(post(json!({ "action": "setTime", "totalMinutes": 5 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn options_is_200() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/timer")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/api/timer")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn admin_token_guards_mutations() {
        let app = app_with_token(Some("s3cret"));

        let response = app.clone().oneshot(post(json!({ "action": "start" }))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = post(json!({ "action": "start" }));
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/api/timer").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_timer() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["persistence"], "memory");
        assert_eq!(body["timerState"]["remainingTotal"], 1_200_000);
    }
}
