//! Shared handler helpers, mirroring a pattern of turning an engine-level
//! error into a uniform JSON error body without leaking implementation
//! details to the client.

use axum::{http::StatusCode, Json};

use crate::types::ErrorResponse;

/// Map an engine write-path failure to HTTP 503. Per the spec's error
/// taxonomy, `DiskFull`/`IO` errors on the write path degrade gracefully:
/// the request fails but the process keeps running, and the index was
/// never mutated.
pub fn append_failed(err: &ramkv_core::Error) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %err, "AOF append failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "storage unavailable".to_string(),
        }),
    )
}

/// Build a generic 500 without leaking the underlying error's internals.
pub fn internal_error(context: &str, err: &dyn std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(%context, error = %err, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("{context}: internal error"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_does_not_leak_details() {
        let detail = "panic: sensitive internal state";
        let (status, Json(body)) = internal_error("compact", &detail);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.contains("sensitive"));
        assert!(body.error.contains("internal error"));
    }
}
