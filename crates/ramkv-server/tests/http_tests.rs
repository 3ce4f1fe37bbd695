//! HTTP-level integration tests against the router, using
//! `tower::ServiceExt::oneshot` so no real socket is needed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ramkv_core::{OperationalMetrics, PersistenceController, RamkvConfig};
use ramkv_server::AppState;
use tower::ServiceExt;

fn build_app(dir: &std::path::Path) -> axum::Router {
    let config = RamkvConfig {
        data_dir: dir.to_string_lossy().to_string(),
        ..RamkvConfig::default()
    };
    let persistence = PersistenceController::init(
        config.rdb_path(),
        config.aof_path(),
        config.ring_capacity,
        0,
        0,
        OperationalMetrics::shared(),
    )
    .unwrap();
    let state = Arc::new(AppState {
        persistence: Arc::new(persistence),
        metrics: OperationalMetrics::shared(),
    });
    ramkv_server::build_router(state)
}

#[tokio::test]
async fn health_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn post_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path());

    let post_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":1,"name":"neo"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(post_response.status(), StatusCode::OK);

    let get_response = app
        .oneshot(Request::builder().uri("/users/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_missing_user_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path());
    let response = app
        .oneshot(Request::builder().uri("/users/999").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_users_returns_array() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path());
    let response = app
        .oneshot(Request::builder().uri("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn compact_returns_200_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(dir.path());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/compact")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
