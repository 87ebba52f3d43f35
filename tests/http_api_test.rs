// Integration tests for the entity/world/clear HTTP surface
//
// Requests go through the full application router with
// tower::ServiceExt::oneshot; the world is inspected directly afterwards.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use worldcast::{api::create_app, config::WorldcastConfig, state::World};

fn make_app() -> (Router, Arc<World>) {
    make_app_with(WorldcastConfig::default())
}

fn make_app_with(config: WorldcastConfig) -> (Router, Arc<World>) {
    let world = Arc::new(World::new());
    let app = create_app(Arc::clone(&world), &config);
    (app, world)
}

fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ── Landing ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_redirects_to_landing_page() {
    let (app, _) = make_app();
    let response = app
        .oneshot(request("GET", "/", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/static/index.html"
    );
}

// ── Entity reads/writes ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_unknown_entity_returns_empty_object() {
    let (app, _) = make_app();
    let response = app
        .oneshot(request("GET", "/entity/ghost", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn test_post_entity_sets_and_echoes() {
    let (app, world) = make_app();
    let response = app
        .oneshot(request("POST", "/entity/ball", Body::from(r#"{"x": 1}"#)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"x": 1}));
    assert_eq!(Value::Object(world.get("ball")), json!({"x": 1}));
}

#[tokio::test]
async fn test_put_entity_replaces_without_merge() {
    let (app, world) = make_app();

    app.clone()
        .oneshot(request("PUT", "/entity/p", Body::from(r#"{"x": 0, "y": 0}"#)))
        .await
        .unwrap();
    let response = app
        .oneshot(request("PUT", "/entity/p", Body::from(r#"{"x": 5}"#)))
        .await
        .unwrap();

    assert_eq!(body_json(response).await, json!({"x": 5}));
    assert_eq!(Value::Object(world.get("p")), json!({"x": 5}));
}

#[tokio::test]
async fn test_post_entity_broadcasts_to_subscribers() {
    let (app, world) = make_app();
    let mut sub = world.subscribe(8);
    assert_eq!(&*sub.rx.try_recv().unwrap(), "{}");

    app.oneshot(request("POST", "/entity/ball", Body::from(r#"{"x": 1}"#)))
        .await
        .unwrap();

    let msg: Value = serde_json::from_str(&sub.rx.try_recv().unwrap()).unwrap();
    assert_eq!(msg, json!({"ball": {"x": 1}}));
}

#[tokio::test]
async fn test_get_entity_after_write() {
    let (app, world) = make_app();
    world.update("player1", "x", json!(3));

    let response = app
        .oneshot(request("GET", "/entity/player1", Body::empty()))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"x": 3}));
}

// ── Bad bodies ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_body_returns_400() {
    let (app, world) = make_app();
    let response = app
        .oneshot(request("POST", "/entity/ball", Body::from("{not json")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
    assert!(world.is_empty());
}

#[tokio::test]
async fn test_empty_body_returns_400() {
    let (app, _) = make_app();
    let response = app
        .oneshot(request("POST", "/entity/ball", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_object_body_returns_400() {
    let (app, _) = make_app();
    let response = app
        .oneshot(request("POST", "/entity/ball", Body::from("[1, 2, 3]")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_form_encoded_json_body_accepted() {
    let (app, world) = make_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/entity/ball")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("%7B%22x%22%3A2%7D="))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(Value::Object(world.get("ball")), json!({"x": 2}));
}

#[tokio::test]
async fn test_oversized_body_returns_413() {
    let mut config = WorldcastConfig::default();
    config.api.max_body_bytes = 16;
    let (app, world) = make_app_with(config);

    let oversized = format!(r#"{{"pad": "{}"}}"#, "x".repeat(64));
    let response = app
        .oneshot(request("POST", "/entity/big", Body::from(oversized)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "payload too large");
    assert!(world.is_empty());
}

// ── World and clear ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_world_returns_every_entity() {
    let (app, world) = make_app();
    world.update("a", "x", json!(1));
    world.update("b", "y", json!(2));

    for method in ["GET", "POST"] {
        let response = app
            .clone()
            .oneshot(request(method, "/world", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"a": {"x": 1}, "b": {"y": 2}})
        );
    }
}

#[tokio::test]
async fn test_clear_empties_world_and_returns_it() {
    let (app, world) = make_app();
    world.update("a", "x", json!(1));

    let response = app
        .clone()
        .oneshot(request("POST", "/clear", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));

    let response = app
        .oneshot(request("GET", "/entity/a", Body::empty()))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn test_clear_is_not_broadcast() {
    let (app, world) = make_app();
    world.update("a", "x", json!(1));
    let mut sub = world.subscribe(8);
    sub.rx.try_recv().unwrap();

    app.oneshot(request("GET", "/clear", Body::empty()))
        .await
        .unwrap();

    assert!(sub.rx.try_recv().is_err());
}

// ── Metrics ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_metrics_reports_counts() {
    let (app, world) = make_app();
    let _sub = world.subscribe(8);
    world.update("a", "x", json!(1));

    let response = app
        .oneshot(request("GET", "/api/metrics", Body::empty()))
        .await
        .unwrap();
    let metrics = body_json(response).await;

    assert_eq!(metrics["entities"], 1);
    assert_eq!(metrics["listeners"], 1);
    assert_eq!(metrics["broadcasts"], 1);
    assert_eq!(metrics["deliveries"], 1);
    assert_eq!(metrics["slow_listener_policy"], "drop");
}
