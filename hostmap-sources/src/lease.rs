//! Lease adapter: DHCP reservations from the Kea control API.
//!
//! The service is asked for its running config (`config-get`) and answers
//! with a one-element array:
//!
//! ```json
//! [{"result": 0, "arguments": {"Dhcp4": {
//!     "reservations": [{"hostname": "...", "ip-address": "..."}],
//!     "subnet4": [{"reservations": [...]}]
//! }}}]
//! ```
//!
//! Per-subnet entries come first so they win the merger's first-seen dedup
//! over global entries for the same hostname.

use std::sync::Arc;

use hostmap_core::{DnsRecord, SourceKind};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SourceError;
use crate::transport::Transport;
use crate::Source;

/// Kea result codes we act on.
const KEA_SUCCESS: i64 = 0;
const KEA_EMPTY: i64 = 3;

/// Suffix that moves compute-node names into the node-management namespace.
pub const NMN_SUFFIX: &str = "-nmn";

// ---------------------------------------------------------------------------
// Wire schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KeaResponse {
    result: Option<i64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    arguments: Option<KeaArguments>,
}

#[derive(Debug, Deserialize)]
struct KeaArguments {
    #[serde(rename = "Dhcp4")]
    dhcp4: Option<KeaDhcp4>,
}

#[derive(Debug, Deserialize)]
struct KeaDhcp4 {
    #[serde(default)]
    reservations: Option<Vec<KeaReservation>>,
    #[serde(default)]
    subnet4: Option<Vec<KeaSubnet>>,
}

#[derive(Debug, Deserialize)]
struct KeaSubnet {
    #[serde(default)]
    reservations: Option<Vec<KeaReservation>>,
}

#[derive(Debug, Clone, Deserialize)]
struct KeaReservation {
    hostname: Option<String>,
    #[serde(rename = "ip-address")]
    ip_address: Option<String>,
}

// ---------------------------------------------------------------------------
// Adapter-internal records
// ---------------------------------------------------------------------------

/// Where a lease came from; decides merge order only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseOrigin {
    Subnet,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    pub hostname: String,
    pub ip_address: String,
    pub origin: LeaseOrigin,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct LeaseSource {
    transport: Arc<dyn Transport>,
    url: String,
}

impl LeaseSource {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

impl Source for LeaseSource {
    type Output = Vec<DnsRecord>;

    const KIND: SourceKind = SourceKind::Lease;

    fn fetch(&self) -> Result<Vec<DnsRecord>, SourceError> {
        let request = json!({"command": "config-get", "service": ["dhcp4"]});
        let body = self.transport.post_json(&self.url, &request)?;
        let leases = parse_response(body)?;
        Ok(normalize(leases))
    }
}

/// Decode the Kea envelope into subnet-then-global lease records.
///
/// Entries missing either field are kept here and dropped by [`normalize`].
pub fn parse_response(body: Value) -> Result<Vec<LeaseRecord>, SourceError> {
    let responses: Vec<KeaResponse> = serde_json::from_value(body)
        .map_err(|e| SourceError::malformed(SourceKind::Lease, e.to_string()))?;
    let Some(first) = responses.into_iter().next() else {
        return Err(SourceError::malformed(
            SourceKind::Lease,
            "empty response envelope",
        ));
    };

    match first.result {
        Some(KEA_SUCCESS) => {}
        Some(KEA_EMPTY) => {
            tracing::info!("lease service reports no leases");
            return Ok(Vec::new());
        }
        Some(code) => {
            return Err(SourceError::Api {
                code,
                text: first.text.unwrap_or_default(),
            })
        }
        None => {
            return Err(SourceError::malformed(
                SourceKind::Lease,
                "response has no result code",
            ))
        }
    }

    let dhcp4 = first
        .arguments
        .and_then(|a| a.dhcp4)
        .ok_or_else(|| SourceError::malformed(SourceKind::Lease, "result 0 without arguments.Dhcp4"))?;

    let subnets = dhcp4.subnet4.unwrap_or_default();
    if subnets.is_empty() {
        tracing::warn!("lease service returned no subnet4 data");
    }
    let global = dhcp4.reservations.unwrap_or_default();
    if global.is_empty() {
        tracing::warn!("lease service returned no global reservations");
    }

    let subnet_leases = subnets
        .into_iter()
        .flat_map(|s| s.reservations.unwrap_or_default())
        .map(|r| lease_record(r, LeaseOrigin::Subnet));
    let global_leases = global
        .into_iter()
        .map(|r| lease_record(r, LeaseOrigin::Global));

    let leases: Vec<LeaseRecord> = subnet_leases.chain(global_leases).collect();
    tracing::debug!(
        subnet = leases.iter().filter(|l| l.origin == LeaseOrigin::Subnet).count(),
        global = leases.iter().filter(|l| l.origin == LeaseOrigin::Global).count(),
        "parsed lease reservations",
    );
    Ok(leases)
}

fn lease_record(r: KeaReservation, origin: LeaseOrigin) -> LeaseRecord {
    LeaseRecord {
        hostname: r.hostname.unwrap_or_default(),
        ip_address: r.ip_address.unwrap_or_default(),
        origin,
    }
}

/// Drop incomplete leases, apply the nid rename, keep subnet-first order.
pub fn normalize(mut leases: Vec<LeaseRecord>) -> Vec<DnsRecord> {
    // Stable: subnet entries stay ahead of global ones whatever the input order.
    leases.sort_by_key(|l| match l.origin {
        LeaseOrigin::Subnet => 0,
        LeaseOrigin::Global => 1,
    });

    leases
        .into_iter()
        .filter_map(|lease| {
            let name = nmn_name(&lease.hostname);
            let record = DnsRecord::new(name, lease.ip_address.clone());
            if record.is_none() {
                tracing::warn!(
                    hostname = %lease.hostname,
                    ip_address = %lease.ip_address,
                    "dropping lease with incomplete data",
                );
            }
            record
        })
        .collect()
}

/// Bare compute-node identifiers collide with the HSN namespace.
pub fn nmn_name(hostname: &str) -> String {
    if hostname.contains("nid") {
        format!("{hostname}{NMN_SUFFIX}")
    } else {
        hostname.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StaticTransport;

    const KEA: &str = "http://kea:8000";

    fn envelope(global: Value, subnets: Value) -> Value {
        json!([{
            "result": 0,
            "arguments": {"Dhcp4": {"reservations": global, "subnet4": subnets}}
        }])
    }

    fn names(records: &[DnsRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn nid_hostnames_get_nmn_suffix() {
        let body = envelope(
            json!([{"hostname": "nid001234", "ip-address": "10.1.1.5"}]),
            json!([]),
        );
        let records = normalize(parse_response(body).expect("parse"));
        assert_eq!(records, vec![DnsRecord::new("nid001234-nmn", "10.1.1.5").expect("valid")]);
    }

    #[test]
    fn subnet_reservations_precede_global() {
        let body = envelope(
            json!([{"hostname": "ncn-w001", "ip-address": "10.252.1.10"}]),
            json!([
                {"reservations": [{"hostname": "ncn-w001", "ip-address": "10.252.1.11"}]},
                {"id": 2},
                {"reservations": [{"hostname": "uan01", "ip-address": "10.252.1.20"}]}
            ]),
        );
        let records = normalize(parse_response(body).expect("parse"));
        assert_eq!(names(&records), ["ncn-w001", "uan01", "ncn-w001"]);
        assert_eq!(records[0].address, "10.252.1.11");
    }

    #[test]
    fn incomplete_entries_are_dropped() {
        let body = envelope(
            json!([
                {"hostname": "", "ip-address": "10.1.1.9"},
                {"hostname": "x3000c0s1b0n0"},
                {"ip-address": "10.1.1.10"},
                {"hostname": "  ", "ip-address": "10.1.1.11"},
                {"hostname": "ok", "ip-address": "10.1.1.12"}
            ]),
            json!([]),
        );
        let records = normalize(parse_response(body).expect("parse"));
        assert_eq!(names(&records), ["ok"]);
    }

    #[test]
    fn empty_result_code_is_not_an_error() {
        let body = json!([{"result": 3, "text": "0 IPv4 lease(s) found."}]);
        assert!(parse_response(body).expect("parse").is_empty());
    }

    #[test]
    fn error_result_code_is_api_error() {
        let body = json!([{"result": 1, "text": "unable to forward command"}]);
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, SourceError::Api { code: 1, .. }), "got: {err}");
    }

    #[test]
    fn schema_mismatches_are_malformed() {
        for body in [
            json!([]),
            json!({"result": 0}),
            json!([{"result": 0}]),
            json!([{"result": 0, "arguments": {}}]),
            json!([{"arguments": {"Dhcp4": {}}}]),
        ] {
            let err = parse_response(body.clone()).unwrap_err();
            assert!(
                matches!(err, SourceError::Malformed { source_kind: SourceKind::Lease, .. }),
                "{body} gave {err}"
            );
        }
    }

    #[test]
    fn missing_lists_are_treated_as_empty() {
        let body = json!([{"result": 0, "arguments": {"Dhcp4": {}}}]);
        assert!(parse_response(body).expect("parse").is_empty());
    }

    #[test]
    fn fetch_posts_config_get_through_transport() {
        let transport = StaticTransport::new().with_body(
            KEA,
            envelope(json!([{"hostname": "uan01", "ip-address": "10.252.1.20"}]), json!([])),
        );
        let source = LeaseSource::new(Arc::new(transport), KEA);
        let records = source.fetch().expect("fetch");
        assert_eq!(names(&records), ["uan01"]);
    }
}
