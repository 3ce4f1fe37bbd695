//! Configuration layering: CLI flags (highest priority, parsed by the server
//! crate) over environment variables over an optional `ramkv.toml` over
//! built-in defaults.
//!
//! The spec's CLI surface (`--workers`, `--aof`, port) is pinned in
//! `SPEC_FULL.md` §6; this module owns the settings that surface isn't
//! explicit about but a runnable binary still needs — snapshot interval and
//! AOF ring capacity — following the workspace's existing `figment`
//! dependency (its `toml` feature, already enabled, parses `ramkv.toml`;
//! there is no separate direct dependency on the `toml` crate).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default TCP port, per the spec's external interface.
pub const DEFAULT_PORT: u16 = 1109;
const DEFAULT_SNAPSHOT_INTERVAL_S: u64 = 60;
const DEFAULT_RING_CAPACITY: usize = 4096;
const DEFAULT_BATCHED_FLUSH_MS: u64 = 10;

/// Layered configuration for a `ramkv` deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RamkvConfig {
    /// Directory `append.aof` / `dump.rdb` (and their `.tmp`/`.lock`
    /// siblings) are resolved under.
    pub data_dir: String,
    /// TCP port the HTTP collaborator binds.
    pub port: u16,
    /// `0` disables supervision (run one worker in-process); absent/`None`
    /// at the CLI layer falls back to the online CPU count.
    pub workers: Option<usize>,
    /// `true` selects AOF sync mode (`flush_interval_ms = 0`); `false`
    /// selects batched mode with `batched_flush_ms`.
    pub aof_sync: bool,
    /// Group-commit window for batched mode.
    pub batched_flush_ms: u64,
    /// Bound on the in-flight batched-mode ring.
    pub ring_capacity: usize,
    /// Periodic RDB dump interval.
    pub snapshot_interval_s: u64,
}

impl Default for RamkvConfig {
    fn default() -> Self {
        RamkvConfig {
            data_dir: ".".to_string(),
            port: DEFAULT_PORT,
            workers: None,
            aof_sync: false,
            batched_flush_ms: DEFAULT_BATCHED_FLUSH_MS,
            ring_capacity: DEFAULT_RING_CAPACITY,
            snapshot_interval_s: DEFAULT_SNAPSHOT_INTERVAL_S,
        }
    }
}

impl RamkvConfig {
    /// Load defaults, layered with an optional `ramkv.toml` in the current
    /// directory and `RAMKV_*` environment variables.
    pub fn load() -> Result<Self> {
        Figment::from(Serialized::defaults(RamkvConfig::default()))
            .merge(Toml::file("ramkv.toml"))
            .merge(Env::prefixed("RAMKV_"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Append log path, resolved under `data_dir`.
    #[must_use]
    pub fn aof_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("append.aof")
    }

    /// Snapshot path, resolved under `data_dir`.
    #[must_use]
    pub fn rdb_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("dump.rdb")
    }

    /// `flush_interval_ms` to hand to [`crate::aof::FlushPolicy::from_millis`].
    #[must_use]
    pub fn flush_interval_ms(&self) -> u64 {
        if self.aof_sync {
            0
        } else {
            self.batched_flush_ms
        }
    }
}
