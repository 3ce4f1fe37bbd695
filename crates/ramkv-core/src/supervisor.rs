//! Supervisor: forks N worker processes sharing one bound listener and one
//! AOF file, handles SIGINT/SIGTERM, and enforces the fail-fast default
//! child-exit policy.
//!
//! Grounded on a Redis-style `fork()` child/parent match-arm structure,
//! applied here to process (not file) forking, combined with a `waitpid`
//! reap loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Parent-side supervisor state machine, as named in the spec:
/// `BOOT -> RUNNING -> DRAIN -> DONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Forking children.
    Boot,
    /// All children forked and running; normal operation.
    Running,
    /// A shutdown signal arrived or a child exited; waiting for all
    /// children to be reaped.
    Drain,
    /// All children reaped.
    Done,
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// `worker_target` resolution: `Some(0)` means "run one worker in-process
/// and do not supervise"; `None` means "default to the online CPU count".
#[must_use]
pub fn resolve_worker_target(workers: Option<usize>) -> usize {
    workers.unwrap_or_else(num_cpus::get)
}

/// Fork `worker_target` children, each calling `bootstrap(worker_id)` and
/// exiting with the code it returns; install signal handlers; poll for
/// exits; block until all children are reaped. Returns the final exit code
/// to surface to the process's own `main`.
///
/// `worker_target == 0` is handled by the caller (run `bootstrap(0)`
/// in-process, no supervision) — this function always forks at least one
/// child, matching "fork `worker_target` children" literally for the
/// supervised case.
pub fn run<F>(worker_target: usize, bootstrap: F) -> Result<i32>
where
    F: Fn(usize) -> i32 + Send + Sync + 'static,
{
    let bootstrap = Arc::new(bootstrap);
    let mut state = SupervisorState::Boot;
    let mut children: Vec<Pid> = Vec::with_capacity(worker_target);

    // SAFETY: the handler only stores to an atomic; it performs no
    // allocation, locking, or non-reentrant libc calls, so it is safe to run
    // on any signal-delivery thread.
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_shutdown_signal))
            .map_err(Error::Sys)?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_shutdown_signal))
            .map_err(Error::Sys)?;
    }

    for worker_id in 0..worker_target {
        // SAFETY: the child calls `bootstrap` and then `process::exit`,
        // never returning through this stack frame or touching state the
        // parent's other threads hold locks on.
        match unsafe { fork() }.map_err(Error::Sys)? {
            ForkResult::Child => {
                let code = bootstrap(worker_id);
                std::process::exit(code);
            }
            ForkResult::Parent { child } => children.push(child),
        }
    }
    state = SupervisorState::Running;
    tracing::info!(workers = worker_target, "supervisor: all workers forked");

    let mut fatal = false;
    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) && state == SupervisorState::Running {
            state = SupervisorState::Drain;
            tracing::info!("supervisor: shutdown requested, signalling workers");
            for pid in &children {
                signal::kill(*pid, Signal::SIGTERM).ok();
            }
        }

        let mut still_running = Vec::with_capacity(children.len());
        for pid in children.drain(..) {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => still_running.push(pid),
                Ok(WaitStatus::Exited(_, code)) => {
                    if state == SupervisorState::Running {
                        if code != 0 {
                            fatal = true;
                        }
                        state = SupervisorState::Drain;
                        for sibling in &still_running {
                            signal::kill(*sibling, Signal::SIGTERM).ok();
                        }
                    }
                }
                Ok(WaitStatus::Signaled(pid, _, _)) => {
                    tracing::warn!(?pid, "supervisor: worker died by signal");
                    if state == SupervisorState::Running {
                        fatal = true;
                        state = SupervisorState::Drain;
                        for sibling in &still_running {
                            signal::kill(*sibling, Signal::SIGTERM).ok();
                        }
                    }
                }
                Ok(_) => still_running.push(pid),
                Err(_) => {}
            }
        }
        children = still_running;

        if children.is_empty() {
            state = SupervisorState::Done;
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    debug_assert_eq!(state, SupervisorState::Done);
    Ok(if fatal { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_worker_target_honors_explicit_zero() {
        assert_eq!(resolve_worker_target(Some(0)), 0);
    }

    #[test]
    fn resolve_worker_target_honors_explicit_value() {
        assert_eq!(resolve_worker_target(Some(3)), 3);
    }

    #[test]
    fn resolve_worker_target_defaults_to_cpu_count() {
        assert_eq!(resolve_worker_target(None), num_cpus::get());
    }
}
