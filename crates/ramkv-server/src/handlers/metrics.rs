//! `GET /metrics` — Prometheus text-format operational counters. Ambient
//! observability; not part of the spec's non-goals (those exclude
//! replication, secondary indexes, etc. — not a request counter).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::AppState;

pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render_prometheus(),
    )
}
