//! Error types for hostmap-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use hostmap_renderer::RenderError;

/// Phases of a reconciliation run; cancellation is checked between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Merge,
    Diff,
    Publish,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Merge => write!(f, "merge"),
            Phase::Diff => write!(f, "diff"),
            Phase::Publish => write!(f, "publish"),
        }
    }
}

/// Fatal errors of a reconciliation run. Source failures are not here: they
/// are absorbed into [`hostmap_core::SourceErrors`] before the merger runs.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The persisted record set could not be read or committed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The record set could not be (de)serialized.
    #[error("record codec error: {reason}")]
    Codec { reason: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The run was cancelled before `phase` started.
    #[error("run cancelled before {phase}")]
    Cancelled { phase: Phase },
}

/// Blob store failures. All of them are fatal to the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Compare-and-swap failed: a concurrent writer advanced the key.
    #[error("concurrent update of {key}: expected revision {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: String,
        actual: String,
    },

    /// Another writer holds the key's lock file.
    #[error("store key is locked by another writer: {path}")]
    Locked { path: PathBuf },
}

/// Name-server reload failures. Logged by the publisher, never propagated.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("reload marker I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start reload command {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command {program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
