mod common;

use axum::http::{Method, StatusCode};

use common::app::{spawn_test_app, spawn_test_app_with_limit};
use common::http::{assert_json_error, request, response_json};

#[tokio::test]
async fn it_health_live_and_ready() {
    let app = spawn_test_app().await;

    let live = request(&app.app, Method::GET, "/health/live").await;
    let (live_status, _) = response_json(live).await;
    assert_eq!(live_status, StatusCode::OK);

    let ready = request(&app.app, Method::GET, "/health/ready").await;
    let (ready_status, _) = response_json(ready).await;
    assert_eq!(ready_status, StatusCode::OK);
}

#[tokio::test]
async fn it_health_reports_sessions_and_landmarker() {
    let app = spawn_test_app_with_limit(3).await;

    let resp = request(&app.app, Method::GET, "/health").await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeSessions"], 0);
    assert_eq!(body["maxSessions"], 3);
    assert_eq!(body["landmarker"], "coarse");
    assert!(body["uptimeSecs"].is_u64());
}

#[tokio::test]
async fn it_health_counts_open_sessions() {
    let app = spawn_test_app_with_limit(3).await;
    let _guard = app.state.sessions().try_open().expect("slot");

    let resp = request(&app.app, Method::GET, "/health").await;
    let (_, body) = response_json(resp).await;
    assert_eq!(body["activeSessions"], 1);
}

#[tokio::test]
async fn it_unknown_route_is_json_404() {
    let app = spawn_test_app().await;

    let resp = request(&app.app, Method::GET, "/nope").await;
    let (status, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn it_ws_route_rejects_plain_get() {
    let app = spawn_test_app().await;

    let resp = request(&app.app, Method::GET, "/ws").await;
    assert!(resp.status().is_client_error());
    assert_ne!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.state.sessions().active(), 0);
}
