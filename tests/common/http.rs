use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

pub async fn request(app: &Router, method: Method, path: &str) -> Response {
    let req = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("empty body");

    app.clone().oneshot(req).await.expect("oneshot response")
}

/// Status plus parsed body; an empty body parses as `{}`.
pub async fn response_json(resp: Response) -> (StatusCode, Value) {
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body bytes");

    let json = if bytes.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice::<Value>(&bytes).expect("parse json body")
    };

    (status, json)
}

pub fn assert_json_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert!(body.get("message").is_some());
}
