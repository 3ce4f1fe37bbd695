//! Operational counters, shared across the HTTP collaborator and the
//! persistence engine via an `Arc`.
//!
//! Grounded on an `AtomicU64`-counters-plus-`shared()` operational metrics
//! module; the retrieval-quality metrics (recall@k, MRR, NDCG) that lived
//! alongside it in the teacher crate have no counterpart here and were not
//! carried forward.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic operational counters for one worker.
#[derive(Default)]
pub struct OperationalMetrics {
    appends_total: AtomicU64,
    append_errors_total: AtomicU64,
    compactions_total: AtomicU64,
    snapshots_total: AtomicU64,
}

impl OperationalMetrics {
    /// Wrap a fresh, zeroed set of counters for sharing across threads.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one successful `append`.
    pub fn record_append(&self) {
        self.appends_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one failed `append` (surfaced upstream as HTTP 503).
    pub fn record_append_error(&self) {
        self.append_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed `compact()`.
    pub fn record_compaction(&self) {
        self.compactions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed RDB dump.
    pub fn record_snapshot(&self) {
        self.snapshots_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Render as Prometheus exposition text.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(out, "# HELP ramkv_appends_total Accepted AOF appends");
        let _ = writeln!(out, "# TYPE ramkv_appends_total counter");
        let _ = writeln!(
            out,
            "ramkv_appends_total {}",
            self.appends_total.load(Ordering::Relaxed)
        );
        let _ = writeln!(out, "# HELP ramkv_append_errors_total Failed AOF appends");
        let _ = writeln!(out, "# TYPE ramkv_append_errors_total counter");
        let _ = writeln!(
            out,
            "ramkv_append_errors_total {}",
            self.append_errors_total.load(Ordering::Relaxed)
        );
        let _ = writeln!(out, "# HELP ramkv_compactions_total Completed AOF rewrites");
        let _ = writeln!(out, "# TYPE ramkv_compactions_total counter");
        let _ = writeln!(
            out,
            "ramkv_compactions_total {}",
            self.compactions_total.load(Ordering::Relaxed)
        );
        let _ = writeln!(out, "# HELP ramkv_snapshots_total Completed RDB dumps");
        let _ = writeln!(out, "# TYPE ramkv_snapshots_total counter");
        let _ = writeln!(
            out,
            "ramkv_snapshots_total {}",
            self.snapshots_total.load(Ordering::Relaxed)
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = OperationalMetrics::shared();
        assert!(metrics.render_prometheus().contains("ramkv_appends_total 0"));
    }

    #[test]
    fn record_append_increments_counter() {
        let metrics = OperationalMetrics::shared();
        metrics.record_append();
        metrics.record_append();
        assert!(metrics.render_prometheus().contains("ramkv_appends_total 2"));
    }
}
