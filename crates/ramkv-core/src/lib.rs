//! `ramkv-core` — the durability and storage engine: a Robin-Hood hash
//! index, a CRC-32C-protected append-only log, a fork-based point-in-time
//! snapshot, and the supervised multi-worker process model that lets
//! several event-loop workers share one on-disk log safely.
//!
//! HTTP framing, JSON (de)serialization, and CLI parsing are external
//! collaborators, built on top of this crate by `ramkv-server`.

pub mod aof;
pub mod config;
pub mod crc;
pub mod error;
pub mod index;
pub mod metrics;
pub mod persistence;
pub mod rdb;
pub mod record;

#[cfg(unix)]
pub mod supervisor;
#[cfg(unix)]
pub mod worker;

pub use config::RamkvConfig;
pub use error::{Error, Result};
pub use index::Index;
pub use metrics::OperationalMetrics;
pub use persistence::PersistenceController;
