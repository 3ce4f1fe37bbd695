//! Append-only log engine: record framing, replay, sync/batched append path,
//! and rewrite (compaction).
//!
//! Grounded on the shape of a locked writer handle plus a replay loop that
//! walks records until it hits a clean EOF or corruption, generalized from a
//! single-process WAL to one that tolerates other workers appending to the
//! same file and is fatal (not best-effort) on a torn tail.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::index::Index;
use crate::record::{decode_record, encode_record, DecodeError};

/// `flush_interval_ms == 0` selects sync mode; any positive value selects
/// batched mode with that group-commit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// `write` + `fsync` on every `append`, no background thread.
    Sync,
    /// Appends enqueue into a bounded ring and are flushed together on this
    /// interval (or sooner, if the ring fills).
    Batched {
        /// Group-commit window.
        interval: Duration,
        /// Bound on the number of queued-but-not-yet-written records.
        ring_capacity: usize,
    },
}

impl FlushPolicy {
    /// Build a policy from the CLI's `flush_interval_ms` and `ring_capacity`.
    #[must_use]
    pub fn from_millis(flush_interval_ms: u64, ring_capacity: usize) -> Self {
        if flush_interval_ms == 0 {
            FlushPolicy::Sync
        } else {
            FlushPolicy::Batched {
                interval: Duration::from_millis(flush_interval_ms),
                ring_capacity,
            }
        }
    }
}

struct QueuedRecord {
    /// Already-framed bytes (header + payload + crc), ready for `write_all`.
    framed: Box<[u8]>,
}

struct Ring {
    queue: std::collections::VecDeque<QueuedRecord>,
    capacity: usize,
    shutdown: bool,
}

/// The append-only log engine for one worker.
pub struct AofEngine {
    path: PathBuf,
    policy: FlushPolicy,
    /// Append handle. Shared with the writer thread (batched mode) so a
    /// rewrite's reopened handle is picked up by the very next drain without
    /// needing to restart the thread.
    writer: Arc<Mutex<File>>,
    ring: Option<Arc<(Mutex<Ring>, Condvar)>>,
    writer_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    writer_running: Arc<AtomicBool>,
}

impl AofEngine {
    /// Open (creating if absent) the AOF at `path` under `policy`, starting
    /// the background writer thread if batched.
    pub fn open(path: impl Into<PathBuf>, policy: FlushPolicy) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        let mut engine = AofEngine {
            path,
            policy,
            writer: Arc::new(Mutex::new(file)),
            ring: None,
            writer_thread: Mutex::new(None),
            writer_running: Arc::new(AtomicBool::new(false)),
        };

        if let FlushPolicy::Batched {
            interval,
            ring_capacity,
        } = policy
        {
            engine.spawn_writer(interval, ring_capacity);
        }

        Ok(engine)
    }

    fn spawn_writer(&mut self, interval: Duration, ring_capacity: usize) {
        let ring = Arc::new((
            Mutex::new(Ring {
                queue: std::collections::VecDeque::new(),
                capacity: ring_capacity,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        self.ring = Some(Arc::clone(&ring));
        self.writer_running.store(true, Ordering::SeqCst);

        let path = self.path.clone();
        let running = Arc::clone(&self.writer_running);
        let writer = Arc::clone(&self.writer);

        let handle = std::thread::spawn(move || {
            writer_loop(&writer, &path, &ring, interval, &running);
        });
        *self.writer_thread.lock() = Some(handle);
    }

    /// Append `(key, bytes)`. In sync mode this blocks on `write` + `fsync`
    /// and only returns once both succeed. In batched mode it blocks only
    /// long enough to enqueue (waiting on the ring's condvar if full); the
    /// record becomes durable on a subsequent drain.
    pub fn append(&self, key: i32, bytes: &[u8]) -> Result<()> {
        let framed = encode_record(key, bytes);
        match self.policy {
            FlushPolicy::Sync => {
                let mut writer = self.writer.lock();
                writer
                    .write_all(&framed)
                    .map_err(|e| Error::io(&self.path, e))?;
                writer.sync_data().map_err(|e| Error::io(&self.path, e))?;
                Ok(())
            }
            FlushPolicy::Batched { .. } => {
                let (lock, cvar) = &**self.ring.as_ref().expect("batched mode has a ring");
                let mut ring = lock.lock();
                while ring.queue.len() >= ring.capacity {
                    cvar.wait(&mut ring);
                }
                ring.queue.push_back(QueuedRecord {
                    framed: framed.into_boxed_slice(),
                });
                cvar.notify_all();
                Ok(())
            }
        }
    }

    /// Replay every record into `index`. `ENOENT` is treated as a valid
    /// empty state. Any short read or CRC mismatch is terminal corruption:
    /// the caller is expected to exit the process with status 2.
    pub fn load(path: impl AsRef<Path>, index: &Index) -> Result<()> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(path, e)),
        };
        let mut reader = BufReader::new(file);
        loop {
            match decode_record(&mut reader) {
                Ok(None) => return Ok(()),
                Ok(Some(record)) => index.save(record.key, &record.bytes),
                Err(DecodeError::ShortRead) => {
                    return Err(Error::corrupt(path, "short read / torn tail in AOF"));
                }
                Err(DecodeError::CrcMismatch) => {
                    return Err(Error::corrupt(path, "CRC mismatch while replaying AOF"));
                }
            }
        }
    }

    /// Replace the AOF with a minimal log reconstructed from the current
    /// live state.
    ///
    /// In sync mode, the worker initiating compaction is not necessarily the
    /// only writer of the shared AOF (other workers share the file, not the
    /// address space — §5), so `index` alone may be missing records that are
    /// durable on disk but were never routed through this worker. Per §4.3
    /// step 2, sync mode rebuilds a scratch index by replaying the current
    /// AOF from disk and rewrites from that instead of from `index`. Batched
    /// mode rewrites from `index` directly, since it is this worker's own
    /// AOF-acknowledged state.
    pub fn rewrite(&self, index: &Index) -> Result<()> {
        let scratch;
        let source = match self.policy {
            FlushPolicy::Sync => {
                scratch = Index::new();
                Self::load(&self.path, &scratch)?;
                &scratch
            }
            FlushPolicy::Batched { .. } => index,
        };

        let tmp_path = tmp_path(&self.path);
        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| Error::io(&tmp_path, e))?;
            let mut io_err = None;
            source.iterate(|key, bytes| {
                if io_err.is_some() {
                    return;
                }
                let framed = encode_record(key, bytes);
                if let Err(e) = tmp.write_all(&framed) {
                    io_err = Some(e);
                }
            });
            if let Some(e) = io_err {
                return Err(Error::io(&tmp_path, e));
            }
            tmp.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
        }

        // Drain any pending batched writes to the *current* file and fsync
        // it before the swap, per the rewrite steps: readers/appenders must
        // never observe a gap between "last old-file record" and "rename".
        self.drain_and_fsync()?;

        self.swap_in(&tmp_path)?;

        Ok(())
    }

    #[cfg(unix)]
    fn swap_in(&self, tmp_path: &Path) -> Result<()> {
        let lock_path = lock_path(&self.path);
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::io(&lock_path, e))?;
        fs4::fs_std::FileExt::lock_exclusive(&lock_file).map_err(|e| Error::io(&lock_path, e))?;

        let result = std::fs::rename(tmp_path, &self.path).map_err(|e| Error::io(&self.path, e));
        let reopened = result.and_then(|()| {
            OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| Error::io(&self.path, e))
        });

        fs4::fs_std::FileExt::unlock(&lock_file).ok();

        *self.writer.lock() = reopened?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn swap_in(&self, tmp_path: &Path) -> Result<()> {
        std::fs::rename(tmp_path, &self.path).map_err(|e| Error::io(&self.path, e))?;
        let reopened = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;
        *self.writer.lock() = reopened;
        Ok(())
    }

    fn drain_and_fsync(&self) -> Result<()> {
        match self.policy {
            FlushPolicy::Sync => {
                // Every `append` already fsync'd before returning.
                Ok(())
            }
            FlushPolicy::Batched { .. } => {
                let (lock, cvar) = &**self.ring.as_ref().expect("batched mode has a ring");
                loop {
                    let ring = lock.lock();
                    if ring.queue.is_empty() {
                        break;
                    }
                    drop(ring);
                    cvar.notify_all();
                    std::thread::sleep(Duration::from_millis(1));
                }
                let writer = self.writer.lock();
                writer.sync_data().map_err(|e| Error::io(&self.path, e))
            }
        }
    }

    /// Stop the AOF writer cleanly: signal, drain, fsync, close.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(ring) = &self.ring {
            let (lock, cvar) = &**ring;
            lock.lock().shutdown = true;
            cvar.notify_all();
        }
        self.drain_and_fsync()?;
        if let Some(handle) = self.writer_thread.lock().take() {
            self.writer_running.store(false, Ordering::SeqCst);
            handle.join().ok();
        }
        Ok(())
    }
}

fn writer_loop(
    writer: &Arc<Mutex<File>>,
    path: &Path,
    ring: &Arc<(Mutex<Ring>, Condvar)>,
    interval: Duration,
    running: &AtomicBool,
) {
    let (lock, cvar) = &**ring;
    while running.load(Ordering::SeqCst) {
        let mut guard = lock.lock();
        if guard.queue.is_empty() && !guard.shutdown {
            cvar.wait_for(&mut guard, interval);
        }
        let shutdown = guard.shutdown;
        let drained: Vec<_> = guard.queue.drain(..).collect();
        drop(guard);
        cvar.notify_all();

        if !drained.is_empty() {
            let mut file = writer.lock();
            for item in &drained {
                if let Err(e) = file.write_all(&item.framed) {
                    tracing::error!(path = %path.display(), error = %e, "AOF writer thread failed to write");
                }
            }
            if let Err(e) = file.sync_data() {
                tracing::error!(path = %path.display(), error = %e, "AOF writer thread failed to fsync");
            }
        }
        if shutdown && lock.lock().queue.is_empty() {
            return;
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn lock_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

#[cfg(test)]
#[path = "aof_tests.rs"]
mod aof_tests;
