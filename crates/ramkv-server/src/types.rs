//! JSON wire types for the HTTP collaborator. The engine itself only ever
//! sees opaque bytes (see `ramkv_core::index`); these types are where the
//! collaborator's JSON framing turns into that byte blob and back.

use serde::{Deserialize, Serialize};

/// Body of `POST /users` and the echoed/fetched representation of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable 32-bit integer key.
    pub id: i32,
    /// Opaque (to the engine) payload; just a name in the reference use case.
    pub name: String,
}

/// Uniform error body for non-2xx responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable, non-sensitive description of what went wrong.
    pub error: String,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `1` when the process is able to answer at all.
    pub ok: u8,
}
