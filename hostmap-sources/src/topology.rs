//! Topology adapter: site layout hardware and network reservations.
//!
//! Two endpoints feed one logical source: `/v1/hardware` yields
//! [`TopologyNode`]s and `/v1/networks` yields [`NetworkReservation`]s. If
//! either call fails the whole source reports failure with empty output.

use std::sync::Arc;

use hostmap_core::SourceKind;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::transport::{join_url, Transport};
use crate::Source;

pub const HARDWARE_ROUTE: &str = "/v1/hardware";
pub const NETWORKS_ROUTE: &str = "/v1/networks";

// ---------------------------------------------------------------------------
// Wire schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HardwareEntry {
    parent: Option<String>,
    xname: Option<String>,
    extra_properties: Option<HardwareProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HardwareProperties {
    role: Option<String>,
    sub_role: Option<String>,
    aliases: Option<Vec<String>>,
    #[serde(rename = "NID")]
    nid: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkEntry {
    name: Option<String>,
    extra_properties: Option<NetworkProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkProperties {
    subnets: Option<Vec<SubnetEntry>>,
}

#[derive(Debug, Deserialize)]
struct SubnetEntry {
    #[serde(rename = "IPReservations")]
    ip_reservations: Option<Vec<ReservationEntry>>,
}

#[derive(Debug, Deserialize)]
struct ReservationEntry {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "IPAddress")]
    ip_address: Option<String>,
    #[serde(rename = "Aliases")]
    aliases: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Adapter-internal records
// ---------------------------------------------------------------------------

/// One hardware unit's place in the site topology.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopologyNode {
    /// Management controller (BMC) identity; reached on the HMN.
    pub parent_id: String,
    /// The node itself; reached on the NMN.
    pub self_id: String,
    pub role: Option<String>,
    pub sub_role: Option<String>,
    pub aliases: Vec<String>,
    pub nid: Option<u64>,
}

/// A static address assignment scoped to a named network.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkReservation {
    /// May be blank; such reservations only contribute their aliases.
    pub name: String,
    pub ip_address: String,
    pub aliases: Vec<String>,
    pub subdomain: String,
}

/// Both outputs of the topology source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    pub nodes: Vec<TopologyNode>,
    pub reservations: Vec<NetworkReservation>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TopologySource {
    transport: Arc<dyn Transport>,
    base_url: String,
    subdomain_prefixes: Vec<String>,
}

impl TopologySource {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        subdomain_prefixes: Vec<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            subdomain_prefixes,
        }
    }
}

impl Source for TopologySource {
    type Output = TopologySnapshot;

    const KIND: SourceKind = SourceKind::Topology;

    fn fetch(&self) -> Result<TopologySnapshot, SourceError> {
        let hardware = self
            .transport
            .get_json(&join_url(&self.base_url, HARDWARE_ROUTE))?;
        let networks = self
            .transport
            .get_json(&join_url(&self.base_url, NETWORKS_ROUTE))?;
        Ok(TopologySnapshot {
            nodes: parse_hardware(hardware)?,
            reservations: parse_networks(networks, &self.subdomain_prefixes)?,
        })
    }
}

/// Hardware entries that carry `ExtraProperties` and an `Xname`.
pub fn parse_hardware(body: Value) -> Result<Vec<TopologyNode>, SourceError> {
    let entries: Vec<HardwareEntry> = serde_json::from_value(body)
        .map_err(|e| SourceError::malformed(SourceKind::Topology, format!("hardware: {e}")))?;

    let nodes = entries
        .into_iter()
        .filter_map(|entry| {
            let props = entry.extra_properties?;
            let self_id = entry.xname.filter(|x| !x.trim().is_empty())?;
            Some(TopologyNode {
                parent_id: entry.parent.unwrap_or_default(),
                self_id,
                role: props.role,
                sub_role: props.sub_role,
                aliases: props
                    .aliases
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|a| !a.trim().is_empty())
                    .collect(),
                nid: props.nid,
            })
        })
        .collect();
    Ok(nodes)
}

/// Flatten every subnet's IP reservations, tagging each with its subdomain.
pub fn parse_networks(
    body: Value,
    subdomain_prefixes: &[String],
) -> Result<Vec<NetworkReservation>, SourceError> {
    let networks: Vec<NetworkEntry> = serde_json::from_value(body)
        .map_err(|e| SourceError::malformed(SourceKind::Topology, format!("networks: {e}")))?;

    let mut reservations = Vec::new();
    for network in networks {
        let Some(name) = network.name.filter(|n| !n.trim().is_empty()) else {
            tracing::warn!("skipping network without a name");
            continue;
        };
        let Some(subnets) = network.extra_properties.and_then(|p| p.subnets) else {
            continue;
        };
        let subdomain = subdomain_for(&name, subdomain_prefixes);

        for reservation in subnets.into_iter().flat_map(|s| s.ip_reservations.unwrap_or_default()) {
            let ip_address = reservation.ip_address.unwrap_or_default();
            if ip_address.trim().is_empty() {
                tracing::warn!(
                    network = %name,
                    reservation = reservation.name.as_deref().unwrap_or(""),
                    "dropping reservation without IPAddress",
                );
                continue;
            }
            reservations.push(NetworkReservation {
                name: reservation.name.unwrap_or_default(),
                ip_address,
                aliases: reservation
                    .aliases
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|a| !a.trim().is_empty())
                    .collect(),
                subdomain: subdomain.clone(),
            });
        }
    }
    Ok(reservations)
}

/// `NMN_RVR` → `nmn` when `NMN` is a known prefix; otherwise the whole
/// network name, lowercased.
pub fn subdomain_for(network_name: &str, prefixes: &[String]) -> String {
    match network_name.split_once('_') {
        Some((prefix, _)) if prefixes.iter().any(|p| p == prefix) => prefix.to_lowercase(),
        _ => network_name.to_lowercase(),
    }
}
