//! `GET /health`.

use axum::response::IntoResponse;
use axum::Json;

use crate::types::HealthResponse;

/// Always `200 {"ok":1}` — if the event loop can answer at all, the worker
/// considers itself healthy.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { ok: 1 })
}
