//! HTTP/JSON collaborator for `ramkv-core`: routes, handlers, and the
//! `AppState` each worker builds its router from.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use ramkv_core::{OperationalMetrics, PersistenceController};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{compact, get_user, health_check, list_users, prometheus_metrics, upsert_user};
pub use types::{ErrorResponse, HealthResponse, UserRecord};

/// Shared state every handler sees: the persistence controller (index + AOF
/// + RDB) and the operational counters.
pub struct AppState {
    /// The durability engine this worker owns.
    pub persistence: Arc<PersistenceController>,
    /// Operational counters, rendered at `GET /metrics`.
    pub metrics: Arc<OperationalMetrics>,
}

/// Build the axum router exposing exactly the pinned HTTP contract plus the
/// ambient `/metrics` endpoint.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(list_users).post(upsert_user))
        .route("/users/{id}", get(get_user))
        .route("/admin/compact", post(compact))
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
