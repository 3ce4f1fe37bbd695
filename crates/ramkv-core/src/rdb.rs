//! Point-in-time snapshot (RDB) engine: fork-and-dump writer, loader with
//! footer verification, atomic rename.
//!
//! Grounded on the snapshot half of a combined WAL+snapshot storage module
//! (magic/version/entry-count/trailer framing and the tmp-then-rename
//! discipline) plus a Redis-style `fork()` background-rewrite structure,
//! applied here to dumping the index instead of rewriting a log.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::crc::crc32c;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::record::{decode_record, encode_record, DecodeError};

/// Load an RDB file into `index`. Missing file is a valid empty cold start.
/// A short read or trailer mismatch is terminal corruption (exit code 2 at
/// the caller).
pub fn load(path: impl AsRef<Path>, index: &Index) -> Result<()> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    match File::open(path) {
        Ok(mut f) => {
            f.read_to_end(&mut bytes)
                .map_err(|e| Error::io(path, e))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    }

    if bytes.len() < 4 {
        return Err(Error::corrupt(path, "RDB file shorter than its trailer"));
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - 4);
    let stored_crc = u32::from_le_bytes(trailer.try_into().unwrap());
    let computed_crc = crc32c(0, payload);
    if computed_crc != stored_crc {
        return Err(Error::corrupt(path, "RDB trailer CRC mismatch"));
    }

    let mut reader = BufReader::new(payload);
    loop {
        match decode_record(&mut reader) {
            Ok(None) => return Ok(()),
            Ok(Some(record)) => index.save(record.key, &record.bytes),
            Err(DecodeError::ShortRead) => {
                return Err(Error::corrupt(path, "short read in RDB payload"));
            }
            Err(DecodeError::CrcMismatch) => {
                return Err(Error::corrupt(path, "per-record CRC mismatch in RDB payload"));
            }
        }
    }
}

/// Write a point-in-time dump of `index` to `path`, atomically.
///
/// On Unix this forks so the child's copy-on-write view is a consistent
/// snapshot of `index` at the instant of `fork`, without blocking the
/// request path in the parent. The parent reaps the child non-blockingly;
/// a crashed child leaves the `.tmp` sibling behind but never replaces the
/// canonical file.
#[cfg(unix)]
pub fn dump(path: impl Into<PathBuf>, index: &Index) -> Result<()> {
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
    use nix::unistd::{fork, ForkResult};

    let path = path.into();
    // SAFETY: the child immediately either succeeds and `_exit`s or fails and
    // `_exit`s, without returning through the surrounding Rust call stack or
    // touching the parent's async runtime / mutexes acquired by other threads.
    match unsafe { fork() } {
        Err(e) => Err(Error::Sys(e)),
        Ok(ForkResult::Child) => {
            let status = match dump_to_tmp_and_rename(&path, index) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "RDB dump child failed");
                    1
                }
            };
            std::process::exit(status);
        }
        Ok(ForkResult::Parent { child }) => {
            // Non-blocking reap; a still-running previous dump simply means
            // this tick's dump is skipped by the caller (see persistence.rs).
            match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) | Ok(_) | Err(_) => {}
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
fn dump_to_tmp_and_rename(path: &Path, index: &Index) -> std::io::Result<()> {
    let tmp_path = tmp_path(path);
    {
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut running_crc = 0u32;
        let mut io_err = None;
        index.iterate(|key, bytes| {
            if io_err.is_some() {
                return;
            }
            let framed = encode_record(key, bytes);
            running_crc = crc32c(running_crc, &framed);
            if let Err(e) = tmp.write_all(&framed) {
                io_err = Some(e);
            }
        });
        if let Some(e) = io_err {
            return Err(e);
        }
        tmp.write_all(&running_crc.to_le_bytes())?;
        tmp.flush()?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
}

#[cfg(not(unix))]
pub fn dump(path: impl Into<PathBuf>, index: &Index) -> Result<()> {
    let path = path.into();
    dump_to_tmp_and_rename(&path, index).map_err(|e| Error::io(&path, e))
}

#[cfg(not(unix))]
fn dump_to_tmp_and_rename(path: &Path, index: &Index) -> std::io::Result<()> {
    let tmp_path = tmp_path(path);
    {
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut running_crc = 0u32;
        let mut io_err = None;
        index.iterate(|key, bytes| {
            if io_err.is_some() {
                return;
            }
            let framed = encode_record(key, bytes);
            running_crc = crc32c(running_crc, &framed);
            if let Err(e) = tmp.write_all(&framed) {
                io_err = Some(e);
            }
        });
        if let Some(e) = io_err {
            return Err(e);
        }
        tmp.write_all(&running_crc.to_le_bytes())?;
        tmp.flush()?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

#[cfg(test)]
#[path = "rdb_tests.rs"]
mod rdb_tests;
