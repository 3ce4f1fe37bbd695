//! Per-worker bootstrap: CPU pinning, signal wiring, and the mandated
//! recovery-then-serve sequencing, factored out of the supervisor so a
//! single in-process (`--workers 0`) run uses the exact same path a forked
//! worker does.

use std::sync::Arc;

use nix::sys::signal::{self, SigHandler, Signal};

use crate::config::RamkvConfig;
use crate::error::Result;
use crate::metrics::OperationalMetrics;
use crate::persistence::PersistenceController;

/// Pin the calling thread to the core indexed by `worker_id`, wrapping
/// around the available core count. Best-effort: a platform that can't
/// report core IDs just skips pinning (logged, not fatal).
pub fn pin_to_core(worker_id: usize) {
    match core_affinity::get_core_ids() {
        Some(cores) if !cores.is_empty() => {
            let core = cores[worker_id % cores.len()];
            if !core_affinity::set_for_current(core) {
                tracing::warn!(worker_id, "failed to pin worker to a CPU core");
            }
        }
        _ => tracing::warn!(worker_id, "no CPU core IDs available; skipping pinning"),
    }
}

/// Install the kernel default action for `SIGTERM` so a supervisor-issued
/// term during shutdown tears this worker down immediately, rather than
/// being caught by a handler the process inherited from its parent.
pub fn install_default_sigterm() -> Result<()> {
    // SAFETY: restoring the default disposition touches no process state
    // besides the signal table and is safe at any point during startup.
    unsafe { signal::signal(Signal::SIGTERM, SigHandler::SigDfl) }
        .map_err(crate::error::Error::Sys)?;
    Ok(())
}

/// Load RDB + AOF and arm the snapshot timer for one worker. Per the spec's
/// "refuse to start on corrupt persistence" contract, a
/// [`crate::error::Error::Corrupt`] here must terminate the process with
/// status 2 — this function returns the error rather than calling `exit`
/// itself, so the exit-code mapping happens in exactly one place (the
/// binary's `main`).
pub fn bootstrap(
    worker_id: usize,
    config: &RamkvConfig,
    metrics: Arc<OperationalMetrics>,
) -> Result<Arc<PersistenceController>> {
    pin_to_core(worker_id);
    install_default_sigterm()?;

    let controller = PersistenceController::init(
        config.rdb_path(),
        config.aof_path(),
        config.ring_capacity,
        config.flush_interval_ms(),
        config.snapshot_interval_s,
        metrics,
    )?;
    Ok(Arc::new(controller))
}

/// Exit code the process must use when recovery refuses to start because of
/// corrupt persistence, per the spec's external interface.
pub const CORRUPT_EXIT_CODE: i32 = 2;
