//! `ramkv-server` — CLI entry point. Binds the listener once, before any
//! `fork`, so every worker inherits the same listening socket; then either
//! runs a single worker in-process (`--workers 0`) or hands off to the
//! supervisor, which forks `worker_target` children that each run their own
//! single-threaded event loop.

use std::sync::Arc;

use clap::Parser;
use ramkv_core::worker::{self, CORRUPT_EXIT_CODE};
use ramkv_core::{supervisor, OperationalMetrics, RamkvConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `ramkv-server` — an in-memory key/value service with AOF+RDB durability.
#[derive(Parser, Debug)]
#[command(name = "ramkv-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of worker processes. 0 means "run one worker in-process and
    /// do not supervise". Absent falls back to the online CPU count.
    #[arg(long, env = "RAMKV_WORKERS")]
    workers: Option<usize>,

    /// `always` selects AOF sync mode; any other value (or omitted) selects
    /// the batched default.
    #[arg(long, default_value = "batched", env = "RAMKV_AOF")]
    aof: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = ramkv_core::config::DEFAULT_PORT, env = "RAMKV_PORT")]
    port: u16,

    /// Directory `append.aof` / `dump.rdb` are resolved under.
    #[arg(long, default_value = ".", env = "RAMKV_DATA_DIR")]
    data_dir: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = RamkvConfig::load()?;
    config.data_dir = args.data_dir;
    config.port = args.port;
    config.aof_sync = args.aof == "always";
    if args.workers.is_some() {
        config.workers = args.workers;
    }

    tracing::info!(port = config.port, data_dir = %config.data_dir, "starting ramkv-server");

    let listener = std::net::TcpListener::bind(("0.0.0.0", config.port))?;
    listener.set_nonblocking(true)?;

    let worker_target = supervisor::resolve_worker_target(config.workers);
    let exit_code = if worker_target == 0 {
        tracing::info!("running a single in-process worker (no supervision)");
        run_worker(0, &config, &listener)
    } else {
        let config = Arc::new(config);
        let listener = Arc::new(listener);
        supervisor::run(worker_target, move |worker_id| {
            run_worker(worker_id, &config, &listener)
        })?
    };

    std::process::exit(exit_code);
}

/// Runs forever (or until the worker's process is torn down by a signal).
/// Returns an exit code only for the unsupervised (`--workers 0`) path,
/// where the caller still needs a code to pass to `std::process::exit`.
fn run_worker(worker_id: usize, config: &RamkvConfig, listener: &std::net::TcpListener) -> i32 {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build per-worker tokio runtime");

    runtime.block_on(async move {
        let metrics = OperationalMetrics::shared();
        let persistence = match worker::bootstrap(worker_id, config, Arc::clone(&metrics)) {
            Ok(p) => p,
            Err(e) if e.is_corrupt() => {
                eprintln!("ramkv-server: refusing to start, persistence is corrupt: {e}");
                tracing::error!(error = %e, "refusing to start: corrupt persistence");
                return CORRUPT_EXIT_CODE;
            }
            Err(e) => {
                tracing::error!(error = %e, "worker bootstrap failed");
                return 1;
            }
        };

        let state = Arc::new(ramkv_server::AppState {
            persistence: Arc::clone(&persistence),
            metrics,
        });
        let app = ramkv_server::build_router(state);

        let std_listener = listener
            .try_clone()
            .expect("listener fd must be cloneable post-fork");
        let tokio_listener = tokio::net::TcpListener::from_std(std_listener)
            .expect("listener must already be in non-blocking mode");

        tracing::info!(worker_id, "worker ready, serving requests");
        if let Err(e) = axum::serve(tokio_listener, app).await {
            tracing::error!(worker_id, error = %e, "worker's HTTP server exited with an error");
            return 1;
        }

        if let Err(e) = persistence.shutdown() {
            tracing::error!(error = %e, "error while shutting down persistence");
        }
        0
    })
}
