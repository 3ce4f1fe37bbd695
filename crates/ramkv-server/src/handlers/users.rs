//! `POST /users`, `GET /users/:id`, `GET /users`.
//!
//! The engine stores opaque bytes; this handler is where a `UserRecord`
//! becomes the bytes the index/AOF actually see, and back. Storing the
//! record pre-serialized (rather than inventing a second on-disk encoding)
//! keeps `ramkv-core` genuinely opaque to the value's shape.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::handlers::helpers::{append_failed, internal_error};
use crate::types::{ErrorResponse, UserRecord};
use crate::AppState;

/// `POST /users` — durably append, then echo the record back.
///
/// 503 when the AOF append fails (full disk, I/O error); the spec requires
/// the index to remain unmodified in that case, which
/// `PersistenceController::save` already guarantees by writing to the AOF
/// before touching the index.
pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    Json(user): Json<UserRecord>,
) -> Result<Json<UserRecord>, (StatusCode, Json<ErrorResponse>)> {
    let bytes = serde_json::to_vec(&user)
        .map_err(|e| internal_error("serializing user record", &e))?;
    state
        .persistence
        .save(user.id, &bytes)
        .map_err(|e| append_failed(&e))?;
    Ok(Json(user))
}

/// `GET /users/:id` — 200 with the record, 404 if absent.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<UserRecord>, (StatusCode, Json<ErrorResponse>)> {
    let bytes = state.persistence.index().get_owned(id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("user {id} not found"),
            }),
        )
    })?;
    let user: UserRecord =
        serde_json::from_slice(&bytes).map_err(|e| internal_error("decoding stored record", &e))?;
    Ok(Json(user))
}

/// `GET /users` — 200 with a JSON array, possibly empty.
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<UserRecord>> {
    let mut users = Vec::new();
    state.persistence.index().iterate(|_key, bytes| {
        if let Ok(user) = serde_json::from_slice::<UserRecord>(bytes) {
            users.push(user);
        }
    });
    Json(users)
}
