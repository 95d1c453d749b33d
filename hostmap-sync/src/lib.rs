//! # hostmap-sync
//!
//! Reconciliation core: merge adapter outputs, diff against the persisted
//! set, publish when approved.
//!
//! Call [`Reconciler::reconcile`] with a collected
//! [`SourceSnapshot`](hostmap_sources::SourceSnapshot) for a full run, or
//! [`Reconciler::plan`] to see the decision without writing anything.

pub mod codec;
pub mod diff;
pub mod error;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod reload;
pub mod store;

pub use diff::Decision;
pub use error::{Phase, ReloadError, StoreError, SyncError};
pub use output::{write_rendered, WriteResult};
pub use pipeline::{load_persisted, Persisted, Plan, Reconciler, RunReport};
pub use publish::{Published, Publisher};
pub use reload::Reloader;
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore, Revision};
