//! Async driver for one reconciliation run.
//!
//! Sources are fetched on blocking threads and joined before the merge; the
//! merge, diff and publish phases then run on one blocking thread. A single
//! [`CancellationToken`] ties it together: ctrl-c cancels it, the retrying
//! transport stops between attempts, and the pipeline checks it between
//! phases.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use hostmap_core::{Config, SourceErrors, SourceKind};
use hostmap_sources::{fetch_logged, Source, SourceSnapshot, Sources, Transport};
use hostmap_sync::{reload, FileBlobStore, Phase, Plan, Reconciler, RunReport, SyncError};

use crate::error::{io_err, join_err, RuntimeError};

/// Build a multi-thread runtime, cancel the token on ctrl-c, and drive
/// `run` to completion on the current thread.
pub fn block_on<F, Fut, T>(run: F) -> Result<T, RuntimeError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, RuntimeError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    runtime.block_on(async move {
        let token = CancellationToken::new();
        let signal = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    signal = tokio::signal::ctrl_c() => match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, cancelling run");
                            token.cancel();
                        }
                        Err(err) => tracing::warn!(error = %err, "ctrl-c handler failed"),
                    }
                }
            })
        };

        let result = run(token.clone()).await;
        token.cancel();
        if let Err(err) = signal.await {
            tracing::warn!(error = %err, "ctrl-c task did not shut down cleanly");
        }
        result
    })
}

/// Fetch all three sources on blocking threads and join them before merge.
pub async fn collect_concurrent(sources: Sources) -> Result<SourceSnapshot, RuntimeError> {
    let Sources {
        lease,
        inventory,
        topology,
    } = sources;

    let lease = tokio::task::spawn_blocking(move || fetch_logged(&lease));
    let inventory = tokio::task::spawn_blocking(move || fetch_logged(&inventory));
    let topology = tokio::task::spawn_blocking(move || fetch_logged(&topology));
    let (lease, inventory, topology) = tokio::join!(lease, inventory, topology);

    let (leases, lease_failed) = lease.map_err(|e| join_err("lease", e))?;
    let (interfaces, inventory_failed) = inventory.map_err(|e| join_err("inventory", e))?;
    let (topology, topology_failed) = topology.map_err(|e| join_err("topology", e))?;

    let errors: SourceErrors = [
        (hostmap_sources::LeaseSource::KIND, lease_failed),
        (hostmap_sources::InventorySource::KIND, inventory_failed),
        (hostmap_sources::TopologySource::KIND, topology_failed),
    ]
    .into_iter()
    .filter_map(|(kind, failed)| failed.then_some(kind))
    .collect::<SourceErrors>();
    log_fetch_summary(&errors);

    Ok(SourceSnapshot {
        leases,
        interfaces,
        topology,
        errors,
    })
}

fn log_fetch_summary(errors: &SourceErrors) {
    let ok = SourceKind::all().len() - errors.iter().count();
    tracing::debug!(ok, failed_sources = %errors, "sources collected");
}

/// Collect, or stop early if the token fires while sources are in flight.
async fn collect_cancellable(
    config: &Config,
    transport: Arc<dyn Transport>,
    token: &CancellationToken,
) -> Result<SourceSnapshot, RuntimeError> {
    let sources = Sources::from_config(config, transport);
    tokio::select! {
        _ = token.cancelled() => Err(SyncError::Cancelled { phase: Phase::Merge }.into()),
        snapshot = collect_concurrent(sources) => snapshot,
    }
}

/// One complete reconciliation run against the configured file store.
pub async fn run_once(
    config: Config,
    transport: Arc<dyn Transport>,
    token: CancellationToken,
    dry_run: bool,
) -> Result<RunReport, RuntimeError> {
    let snapshot = collect_cancellable(&config, transport, &token).await?;

    tokio::task::spawn_blocking(move || {
        let store = FileBlobStore::new(&config.store.dir);
        let reloader = reload::from_config(&config.reload);
        Reconciler::new(&config, &store, reloader.as_ref()).reconcile(&snapshot, &token, dry_run)
    })
    .await
    .map_err(|e| join_err("reconcile", e))?
    .map_err(RuntimeError::from)
}

/// Collect and plan without writing anything.
pub async fn plan_once(
    config: Config,
    transport: Arc<dyn Transport>,
    token: CancellationToken,
) -> Result<Plan, RuntimeError> {
    let snapshot = collect_cancellable(&config, transport, &token).await?;

    tokio::task::spawn_blocking(move || {
        let store = FileBlobStore::new(&config.store.dir);
        let reloader = reload::NoopReloader;
        Reconciler::new(&config, &store, &reloader).plan(&snapshot, &token)
    })
    .await
    .map_err(|e| join_err("plan", e))?
    .map_err(RuntimeError::from)
}

#[cfg(test)]
mod tests {
    use hostmap_sources::{Retrying, StaticTransport};
    use hostmap_sync::Decision;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn config(state: &TempDir) -> Config {
        let mut config = Config::default();
        config.sources.lease_url = "http://kea".to_string();
        config.sources.inventory_url = "http://smd".to_string();
        config.sources.topology_url = "http://sls".to_string();
        config.store.dir = state.path().join("state");
        config.reload = hostmap_core::ReloadConfig::None;
        config
    }

    fn transport() -> Arc<dyn Transport> {
        Arc::new(
            StaticTransport::new()
                .with_body(
                    "http://kea",
                    json!([{"result": 0, "arguments": {"Dhcp4": {
                        "reservations": [{"hostname": "uan01", "ip-address": "10.252.1.20"}]
                    }}}]),
                )
                .with_body("http://smd/hsm/v2/Inventory/EthernetInterfaces", json!([])),
        )
    }

    #[tokio::test]
    async fn concurrent_collect_marks_failed_sources() {
        let state = TempDir::new().expect("state");
        let sources = Sources::from_config(&config(&state), transport());
        let snapshot = collect_concurrent(sources).await.expect("collect");

        assert_eq!(snapshot.leases.len(), 1);
        assert!(!snapshot.errors.contains(SourceKind::Lease));
        assert!(!snapshot.errors.contains(SourceKind::Inventory));
        assert!(snapshot.errors.contains(SourceKind::Topology));
    }

    #[tokio::test]
    async fn run_once_publishes_growth_despite_topology_failure() {
        let state = TempDir::new().expect("state");
        let config = config(&state);
        let report = run_once(config.clone(), transport(), CancellationToken::new(), false)
            .await
            .expect("run");

        assert_eq!(report.decision, Decision::DegradedPublish);
        assert!(config.store.dir.join(&config.store.key).exists());
    }

    #[tokio::test]
    async fn plan_once_writes_nothing() {
        let state = TempDir::new().expect("state");
        let config = config(&state);
        let plan = plan_once(config.clone(), transport(), CancellationToken::new())
            .await
            .expect("plan");

        assert_eq!(plan.result.master.len(), 1);
        assert!(!config.store.dir.join(&config.store.key).exists());
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_merge() {
        let state = TempDir::new().expect("state");
        let token = CancellationToken::new();
        token.cancel();
        let err = run_once(config(&state), transport(), token, false)
            .await
            .unwrap_err();
        assert!(
            matches!(err, RuntimeError::Sync(SyncError::Cancelled { .. })),
            "got: {err}"
        );
    }

    #[test]
    fn cancelling_mid_retry_shuts_down_promptly() {
        let state = TempDir::new().expect("state");
        let config = config(&state);
        let policy = hostmap_core::RetryPolicy {
            max_attempts: 10,
            backoff_ms: 60_000,
            ..hostmap_core::RetryPolicy::default()
        };
        let started = std::time::Instant::now();

        let err = block_on(|token| {
            let transport: Arc<dyn Transport> = Arc::new(
                Retrying::new(StaticTransport::new(), policy).with_cancellation(token.clone()),
            );
            let ctrl_c = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                ctrl_c.cancel();
            });
            run_once(config, transport, token, false)
        })
        .unwrap_err();

        assert!(
            matches!(err, RuntimeError::Sync(SyncError::Cancelled { .. })),
            "got: {err}"
        );
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn block_on_drives_the_future() {
        let value = block_on(|token| async move {
            assert!(!token.is_cancelled());
            Ok::<_, RuntimeError>(7)
        })
        .expect("block_on");
        assert_eq!(value, 7);
    }
}
