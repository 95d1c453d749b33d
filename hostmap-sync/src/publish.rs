//! Publisher: commit an approved record set, then signal a reload.
//!
//! The commit is all-or-nothing (codec first, then one conditional write);
//! on any error the previously persisted set stays authoritative. The reload
//! signal is best effort, and is never sent for an empty set so a name server
//! coming up is not reloaded into serving nothing.

use serde::Serialize;

use hostmap_core::RecordSet;

use crate::codec;
use crate::error::SyncError;
use crate::reload::Reloader;
use crate::store::{BlobStore, Revision};

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub revision: Revision,
    /// `false` when the reload signal failed or was skipped for an empty
    /// set (already logged).
    pub reloaded: bool,
}

pub struct Publisher<'a> {
    store: &'a dyn BlobStore,
    key: &'a str,
    reloader: &'a dyn Reloader,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn BlobStore, key: &'a str, reloader: &'a dyn Reloader) -> Self {
        Self {
            store,
            key,
            reloader,
        }
    }

    /// Commit `records` over `expected` (the revision read at diff time).
    pub fn publish(
        &self,
        records: &RecordSet,
        expected: Option<&Revision>,
    ) -> Result<Published, SyncError> {
        let bytes = codec::encode(records)?;
        let revision = self
            .store
            .write(self.key, expected, &bytes)
            .map_err(|err| {
                tracing::error!(key = self.key, error = %err, "commit failed; persisted set unchanged");
                SyncError::Persistence(err)
            })?;
        tracing::info!(
            key = self.key,
            revision = %revision,
            records = records.len(),
            "committed record set",
        );

        if records.is_empty() {
            tracing::warn!(
                key = self.key,
                revision = %revision,
                "committed record set is empty; not reloading the name server",
            );
            return Ok(Published {
                revision,
                reloaded: false,
            });
        }

        let reloaded = match self.reloader.reload(&revision) {
            Ok(()) => {
                tracing::info!(reloader = self.reloader.name(), "reload signalled");
                true
            }
            Err(err) => {
                tracing::warn!(
                    reloader = self.reloader.name(),
                    error = %err,
                    "reload signal failed; commit kept",
                );
                false
            }
        };
        Ok(Published { revision, reloaded })
    }
}
