//! Source adapters for `hostmap`.
//!
//! Each adapter turns one upstream inventory service into domain data:
//!
//! - [`lease::LeaseSource`]: DHCP reservations → [`DnsRecord`]s
//! - [`inventory::InventorySource`]: Ethernet interfaces → [`InventoryInterface`]s
//! - [`topology::TopologySource`]: site hardware and networks → [`TopologySnapshot`]
//!
//! Failures never abort a run. [`fetch_or_empty`] turns an error into empty
//! output plus a mark in [`SourceErrors`], which the diff engine later reads
//! to decide whether a shrinking record set can be trusted.

use std::sync::Arc;

use hostmap_core::{Config, DnsRecord, SourceErrors, SourceKind};
use tokio_util::sync::CancellationToken;

pub mod error;
pub mod inventory;
pub mod lease;
pub mod topology;
pub mod transport;

pub use error::SourceError;
pub use inventory::{InventoryInterface, InventorySource};
pub use lease::LeaseSource;
pub use topology::{NetworkReservation, TopologyNode, TopologySnapshot, TopologySource};
pub use transport::{Retrying, StaticTransport, Transport, UreqTransport};

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// One upstream service, fetched synchronously.
///
/// Implementations retry through their [`Transport`]; whatever error escapes
/// `fetch` is final for this run.
pub trait Source {
    type Output: Default;

    const KIND: SourceKind;

    fn fetch(&self) -> Result<Self::Output, SourceError>;
}

/// Run `source`, substituting empty output and marking `errors` on failure.
pub fn fetch_or_empty<S: Source>(source: &S, errors: &mut SourceErrors) -> S::Output {
    let (output, failed) = fetch_logged(source);
    if failed {
        errors.mark(S::KIND);
    }
    output
}

/// Like [`fetch_or_empty`] but reports failure as a flag, for callers that
/// run sources on separate threads and merge the flags afterwards.
pub fn fetch_logged<S: Source>(source: &S) -> (S::Output, bool) {
    match source.fetch() {
        Ok(output) => {
            tracing::info!(source = %S::KIND, "source fetched");
            (output, false)
        }
        Err(err) => {
            tracing::error!(
                source = %S::KIND,
                category = err.category(),
                error = %err,
                "source failed; continuing with empty output",
            );
            (S::Output::default(), true)
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the merger needs from one run, plus which sources failed.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    /// Normalized lease records, subnet entries first.
    pub leases: Vec<DnsRecord>,
    pub interfaces: Vec<InventoryInterface>,
    pub topology: TopologySnapshot,
    pub errors: SourceErrors,
}

/// The three adapters built from one [`Config`], sharing a transport.
#[derive(Clone)]
pub struct Sources {
    pub lease: LeaseSource,
    pub inventory: InventorySource,
    pub topology: TopologySource,
}

impl Sources {
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            lease: LeaseSource::new(Arc::clone(&transport), config.sources.lease_url.clone()),
            inventory: InventorySource::new(
                Arc::clone(&transport),
                &config.sources.inventory_url,
                config.sources.inventory_schema,
            ),
            topology: TopologySource::new(
                transport,
                config.sources.topology_url.clone(),
                config.merge.subdomain_prefixes.clone(),
            ),
        }
    }

    /// Fetch all three sources one after another.
    pub fn collect(&self) -> SourceSnapshot {
        let mut errors = SourceErrors::new();
        let leases = fetch_or_empty(&self.lease, &mut errors);
        let interfaces = fetch_or_empty(&self.inventory, &mut errors);
        let topology = fetch_or_empty(&self.topology, &mut errors);
        SourceSnapshot {
            leases,
            interfaces,
            topology,
            errors,
        }
    }
}

/// The production transport: ureq with the configured timeout, wrapped in
/// the configured retry policy. Retries stop once `cancel` fires.
pub fn build_transport(config: &Config, cancel: CancellationToken) -> Arc<dyn Transport> {
    Arc::new(
        Retrying::new(
            UreqTransport::new(config.sources.timeout()),
            config.retry.clone(),
        )
        .with_cancellation(cancel),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        config.sources.lease_url = "http://kea".to_string();
        config.sources.inventory_url = "http://smd".to_string();
        config.sources.topology_url = "http://sls".to_string();
        config
    }

    #[test]
    fn failing_sources_yield_empty_output_and_error_marks() {
        let transport = StaticTransport::new().with_body(
            "http://kea",
            json!([{"result": 0, "arguments": {"Dhcp4": {
                "reservations": [{"hostname": "uan01", "ip-address": "10.252.1.20"}]
            }}}]),
        );
        let snapshot = Sources::from_config(&config(), Arc::new(transport)).collect();

        assert_eq!(snapshot.leases.len(), 1);
        assert!(snapshot.interfaces.is_empty());
        assert_eq!(snapshot.topology, TopologySnapshot::default());
        assert!(!snapshot.errors.contains(SourceKind::Lease));
        assert!(snapshot.errors.contains(SourceKind::Inventory));
        assert!(snapshot.errors.contains(SourceKind::Topology));
    }

    #[test]
    fn empty_but_successful_sources_are_not_errors() {
        let transport = StaticTransport::new()
            .with_body("http://kea", json!([{"result": 3, "text": "0 found"}]))
            .with_body("http://smd/hsm/v2/Inventory/EthernetInterfaces", json!([]))
            .with_body("http://sls/v1/hardware", json!([]))
            .with_body("http://sls/v1/networks", json!([]));
        let snapshot = Sources::from_config(&config(), Arc::new(transport)).collect();
        assert!(!snapshot.errors.any());
    }
}
