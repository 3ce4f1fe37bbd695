//! Persistence controller: boots the RDB and AOF engines in the correct
//! order, owns the periodic snapshot timer, and exposes `compact()`.
//!
//! Grounded on a constructor that loads a snapshot then replays the WAL
//! from the snapshot's recorded cut, generalized into a standalone
//! controller because this spec also needs a live background timer (the
//! teacher's snapshot is triggered externally, not on a schedule).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::aof::{AofEngine, FlushPolicy};
use crate::error::Result;
use crate::index::Index;
use crate::metrics::OperationalMetrics;
use crate::rdb;

/// Owns the index, the AOF engine, and the RDB path; orchestrates recovery,
/// the periodic snapshot timer, and compaction.
pub struct PersistenceController {
    index: Arc<Index>,
    aof: AofEngine,
    rdb_path: PathBuf,
    metrics: Arc<OperationalMetrics>,
    snapshot_thread: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
    snapshot_running: Arc<AtomicBool>,
}

impl PersistenceController {
    /// Boot the engines in the mandated order: RDB load, then AOF replay,
    /// then arm the periodic snapshot timer. Either load terminating with
    /// [`crate::error::Error::Corrupt`] must cause the caller to exit the
    /// process with status 2 — this function does not call `exit` itself,
    /// so it stays testable; callers at the process boundary do.
    pub fn init(
        rdb_path: impl Into<PathBuf>,
        aof_path: impl Into<PathBuf>,
        ring_capacity: usize,
        aof_flush_ms: u64,
        snapshot_interval_s: u64,
        metrics: Arc<OperationalMetrics>,
    ) -> Result<Self> {
        let rdb_path = rdb_path.into();
        let aof_path = aof_path.into();
        let index = Arc::new(Index::new());

        rdb::load(&rdb_path, &index)?;
        AofEngine::load(&aof_path, &index)?;

        let policy = FlushPolicy::from_millis(aof_flush_ms, ring_capacity);
        let aof = AofEngine::open(&aof_path, policy)?;

        let controller = PersistenceController {
            index,
            aof,
            rdb_path,
            metrics,
            snapshot_thread: parking_lot::Mutex::new(None),
            snapshot_running: Arc::new(AtomicBool::new(false)),
        };
        controller.arm_snapshot_timer(snapshot_interval_s);
        Ok(controller)
    }

    fn arm_snapshot_timer(&self, interval_s: u64) {
        if interval_s == 0 {
            return;
        }
        self.snapshot_running.store(true, Ordering::SeqCst);
        let index = Arc::clone(&self.index);
        let rdb_path = self.rdb_path.clone();
        let metrics = Arc::clone(&self.metrics);
        let running = Arc::clone(&self.snapshot_running);
        let interval = Duration::from_secs(interval_s);

        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                match rdb::dump(&rdb_path, &index) {
                    Ok(()) => metrics.record_snapshot(),
                    Err(e) => tracing::warn!(error = %e, "periodic RDB dump failed to start"),
                }
            }
        });
        *self.snapshot_thread.lock() = Some(handle);
    }

    /// Shared handle to the in-memory index, for the HTTP collaborator.
    #[must_use]
    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Durably append `(key, bytes)`, then update the index on success. The
    /// index is never mutated ahead of its AOF acknowledgement.
    pub fn save(&self, key: i32, bytes: &[u8]) -> Result<()> {
        match self.aof.append(key, bytes) {
            Ok(()) => {
                self.index.save(key, bytes);
                self.metrics.record_append();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_append_error();
                Err(e)
            }
        }
    }

    /// Synchronous RDB rewrite followed by `AOF_rewrite`, per the spec's
    /// `compact()` contract.
    pub fn compact(&self) -> Result<()> {
        rdb::dump(&self.rdb_path, &self.index)?;
        self.aof.rewrite(&self.index)?;
        self.metrics.record_compaction();
        Ok(())
    }

    /// Stop the AOF writer cleanly and stop the snapshot timer.
    pub fn shutdown(&self) -> Result<()> {
        self.snapshot_running.store(false, Ordering::SeqCst);
        // The timer thread wakes on its own `sleep` and checks
        // `snapshot_running`; joining here would block up to
        // `snapshot_interval_s`, so it's left detached instead.
        drop(self.snapshot_thread.lock().take());
        self.aof.shutdown()
    }
}
