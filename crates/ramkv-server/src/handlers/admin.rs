//! `POST /admin/compact`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;

/// Returns 200 immediately; compaction proceeds asynchronously on the
/// worker's own event loop via a scheduled task rather than a dedicated
/// thread — the spec's concurrency model allows exactly one auxiliary OS
/// thread per worker (the AOF writer), so this does not spawn another.
/// Other requests on this worker will queue behind the compaction task
/// while it runs; that's the accepted tradeoff for a single-threaded loop.
pub async fn compact(State(state): State<Arc<AppState>>) -> StatusCode {
    tokio::task::spawn(async move {
        if let Err(e) = state.persistence.compact() {
            tracing::error!(error = %e, "compaction failed");
        }
    });
    StatusCode::OK
}
