//! Blob store for the persisted record set.
//!
//! Every value carries a [`Revision`] (SHA-256 hex of its bytes). Writes are
//! compare-and-swap: the caller passes the revision it read, and the write
//! fails with [`StoreError::Conflict`] if another writer got there first.
//!
//! [`FileBlobStore`] layout:
//!
//! ```text
//! <dir>/
//!   <key>        (current value)
//!   <key>.lock   (held while a write is in progress; holds the writer's pid)
//!   <key>.tmp    (transient; renamed over <key>)
//! ```
//!
//! A lock older than [`STALE_LOCK_AFTER`] was left behind by a writer that
//! died mid-write and is reclaimed. The revision check still guards against
//! lost updates.

use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{store_io, StoreError};

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Revision(String);

impl Revision {
    pub fn of(bytes: &[u8]) -> Self {
        let mut h = Sha256::new();
        h.update(bytes);
        Revision(hex::encode(h.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn describe(revision: Option<&Revision>) -> String {
    revision.map_or_else(|| "<absent>".to_string(), ToString::to_string)
}

/// A stored value and its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub revision: Revision,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Blob {
            revision: Revision::of(&bytes),
            bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Key/value store with conditional writes.
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when the key has never been written.
    fn read(&self, key: &str) -> Result<Option<Blob>, StoreError>;

    /// Replace the value at `key` if its current revision is `expected`
    /// (`None` = key must not exist yet). Returns the new revision.
    fn write(
        &self,
        key: &str,
        expected: Option<&Revision>,
        bytes: &[u8],
    ) -> Result<Revision, StoreError>;
}

fn check_expected(
    key: &str,
    expected: Option<&Revision>,
    actual: Option<&Revision>,
) -> Result<(), StoreError> {
    if expected == actual {
        return Ok(());
    }
    Err(StoreError::Conflict {
        key: key.to_string(),
        expected: describe(expected),
        actual: describe(actual),
    })
}

// ---------------------------------------------------------------------------
// FileBlobStore
// ---------------------------------------------------------------------------

/// A write never legitimately holds the lock this long.
pub const STALE_LOCK_AFTER: Duration = Duration::from_secs(600);

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
    stale_lock_after: Duration,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stale_lock_after: STALE_LOCK_AFTER,
        }
    }

    pub fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_after = age;
        self
    }

    pub fn path_of(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> Result<Option<Blob>, StoreError> {
        let path = self.path_of(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Blob::new(bytes))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(store_io(path, err)),
        }
    }

    fn write(
        &self,
        key: &str,
        expected: Option<&Revision>,
        bytes: &[u8],
    ) -> Result<Revision, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| store_io(&self.dir, e))?;
        let _lock = LockGuard::acquire(self.dir.join(format!("{key}.lock")), self.stale_lock_after)?;

        let current = self.read(key)?.map(|b| b.revision);
        check_expected(key, expected, current.as_ref())?;

        let path = self.path_of(key);
        let tmp = self.dir.join(format!("{key}.tmp"));
        std::fs::write(&tmp, bytes).map_err(|e| store_io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(store_io(path, e));
        }
        Ok(Revision::of(bytes))
    }
}

/// Exclusive `<key>.lock`, removed on drop.
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(path: PathBuf, stale_after: Duration) -> Result<Self, StoreError> {
        match Self::create(&path) {
            Err(StoreError::Locked { .. }) if lock_age(&path) >= stale_after => {
                tracing::warn!(
                    path = %path.display(),
                    holder = %lock_holder(&path),
                    "reclaiming stale store lock",
                );
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(store_io(path, err)),
                }
                Self::create(&path)?;
            }
            result => result?,
        }
        Ok(LockGuard { path })
    }

    fn create(path: &Path) -> Result<(), StoreError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(StoreError::Locked {
                path: path.to_path_buf(),
            }),
            Err(err) => Err(store_io(path, err)),
        }
    }
}

/// Time since the lock was last touched; zero if that cannot be told.
fn lock_age(path: &Path) -> Duration {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| mtime.elapsed().ok())
        .unwrap_or_default()
}

fn lock_holder(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-process store with the same CAS semantics.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.lock().insert(key.into(), bytes);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> Result<Option<Blob>, StoreError> {
        Ok(self.lock().get(key).cloned().map(Blob::new))
    }

    fn write(
        &self,
        key: &str,
        expected: Option<&Revision>,
        bytes: &[u8],
    ) -> Result<Revision, StoreError> {
        let mut blobs = self.lock();
        let current = blobs.get(key).map(|b| Revision::of(b));
        check_expected(key, expected, current.as_ref())?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(Revision::of(bytes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
