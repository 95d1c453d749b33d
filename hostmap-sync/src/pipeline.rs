//! Shared reconciliation pipeline used by the CLI and the runtime.
//!
//! `snapshot → merge → diff → publish`, strictly sequential after the
//! sources have been collected. The cancellation token is checked before
//! each phase; a cancelled run has no side effects beyond completed phases.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use hostmap_core::{Config, RecordSet, RunResult, SourceErrors};
use hostmap_sources::SourceSnapshot;

use crate::codec;
use crate::diff::{self, Decision};
use crate::error::{Phase, SyncError};
use crate::merge;
use crate::publish::{Published, Publisher};
use crate::reload::Reloader;
use crate::store::{BlobStore, Revision};

/// The previously published set and the revision it was read at.
#[derive(Debug, Clone, Default)]
pub struct Persisted {
    pub records: RecordSet,
    /// `None` when nothing has been published yet.
    pub revision: Option<Revision>,
}

/// Read and decode the persisted set. Failure is fatal to the run.
pub fn load_persisted(store: &dyn BlobStore, key: &str) -> Result<Persisted, SyncError> {
    let blob = store.read(key).map_err(|err| {
        tracing::error!(key, error = %err, "could not read persisted record set");
        SyncError::Persistence(err)
    })?;
    let Some(blob) = blob else {
        tracing::info!(key, "no persisted record set yet");
        return Ok(Persisted::default());
    };
    let records = codec::decode(&blob.bytes)?;
    Ok(Persisted {
        records,
        revision: Some(blob.revision),
    })
}

/// Merge and diff results, before anything is written.
#[derive(Debug, Clone)]
pub struct Plan {
    pub result: RunResult,
    pub persisted: Persisted,
    pub decision: Decision,
}

/// What a run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub decision: Decision,
    pub current: usize,
    pub previous: usize,
    pub failed_sources: SourceErrors,
    pub dry_run: bool,
    /// Present only when a commit happened.
    pub published: Option<Published>,
}

pub struct Reconciler<'a> {
    config: &'a Config,
    store: &'a dyn BlobStore,
    reloader: &'a dyn Reloader,
    on_phase: Option<&'a dyn Fn(Phase)>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a Config, store: &'a dyn BlobStore, reloader: &'a dyn Reloader) -> Self {
        Self {
            config,
            store,
            reloader,
            on_phase: None,
        }
    }

    /// Call `hook` as each phase is entered, just before its cancellation
    /// check.
    pub fn on_phase(mut self, hook: &'a dyn Fn(Phase)) -> Self {
        self.on_phase = Some(hook);
        self
    }

    fn enter(&self, token: &CancellationToken, phase: Phase) -> Result<(), SyncError> {
        tracing::debug!(%phase, "entering phase");
        if let Some(hook) = self.on_phase {
            hook(phase);
        }
        checkpoint(token, phase)
    }

    /// Merge `snapshot` and decide against the persisted set. Writes nothing.
    pub fn plan(&self, snapshot: &SourceSnapshot, token: &CancellationToken) -> Result<Plan, SyncError> {
        self.enter(token, Phase::Merge)?;
        let result = merge::merge(snapshot, &self.config.merge);

        self.enter(token, Phase::Diff)?;
        let persisted = load_persisted(self.store, &self.config.store.key)?;
        let decision = diff::decide(&result.master, &persisted.records, &result.source_errors);
        diff::log_decision(
            decision,
            result.master.len(),
            persisted.records.len(),
            &result.source_errors,
        );

        Ok(Plan {
            result,
            persisted,
            decision,
        })
    }

    /// Full run: plan, then publish when the decision allows it.
    pub fn reconcile(
        &self,
        snapshot: &SourceSnapshot,
        token: &CancellationToken,
        dry_run: bool,
    ) -> Result<RunReport, SyncError> {
        let plan = self.plan(snapshot, token)?;
        self.enter(token, Phase::Publish)?;

        let published = if !plan.decision.should_publish() {
            None
        } else if dry_run {
            tracing::info!(decision = %plan.decision, "[dry-run] would publish");
            None
        } else {
            let publisher = Publisher::new(self.store, &self.config.store.key, self.reloader);
            Some(publisher.publish(&plan.result.master, plan.persisted.revision.as_ref())?)
        };

        Ok(RunReport {
            decision: plan.decision,
            current: plan.result.master.len(),
            previous: plan.persisted.records.len(),
            failed_sources: plan.result.source_errors,
            dry_run,
            published,
        })
    }
}

fn checkpoint(token: &CancellationToken, phase: Phase) -> Result<(), SyncError> {
    if token.is_cancelled() {
        tracing::warn!(%phase, "run cancelled");
        return Err(SyncError::Cancelled { phase });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
