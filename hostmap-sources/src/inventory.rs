//! Inventory adapter: Ethernet interface records from hardware state manager.
//!
//! ```json
//! [{"ComponentID": "x3000c0s19b1n0",
//!   "IPAddresses": [{"IPAddress": "10.252.0.28"}],
//!   "MACAddress": "b4:2e:99:be:1a:2b", ...}]
//! ```
//!
//! Two schema generations exist (nested `IPAddresses` and legacy flat
//! `IPAddress`). The variant is chosen by configuration; an entry written in
//! the other variant fails the whole source rather than being guessed at.

use std::sync::Arc;

use hostmap_core::{InventorySchema, SourceKind};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::transport::{join_url, Transport};
use crate::Source;

pub const ETHERNET_INTERFACES_ROUTE: &str = "/hsm/v2/Inventory/EthernetInterfaces";

#[derive(Debug, Deserialize)]
struct EthernetInterface {
    #[serde(rename = "ComponentID")]
    component_id: Option<String>,
    #[serde(rename = "IPAddresses")]
    ip_addresses: Option<Vec<IpAddressEntry>>,
    #[serde(rename = "IPAddress")]
    ip_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpAddressEntry {
    #[serde(rename = "IPAddress")]
    ip_address: Option<String>,
}

/// One interface identity and one of its addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryInterface {
    pub component_id: String,
    pub ip_address: String,
}

impl InventoryInterface {
    pub fn new(component_id: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            ip_address: ip_address.into(),
        }
    }
}

#[derive(Clone)]
pub struct InventorySource {
    transport: Arc<dyn Transport>,
    url: String,
    schema: InventorySchema,
}

impl InventorySource {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str, schema: InventorySchema) -> Self {
        Self {
            transport,
            url: join_url(base_url, ETHERNET_INTERFACES_ROUTE),
            schema,
        }
    }
}

impl Source for InventorySource {
    type Output = Vec<InventoryInterface>;

    const KIND: SourceKind = SourceKind::Inventory;

    fn fetch(&self) -> Result<Vec<InventoryInterface>, SourceError> {
        let body = self.transport.get_json(&self.url)?;
        parse_response(body, self.schema)
    }
}

/// Decode the interface list; blank identities or addresses are dropped.
pub fn parse_response(
    body: Value,
    schema: InventorySchema,
) -> Result<Vec<InventoryInterface>, SourceError> {
    let entries: Vec<EthernetInterface> = serde_json::from_value(body)
        .map_err(|e| SourceError::malformed(SourceKind::Inventory, e.to_string()))?;

    let mut interfaces = Vec::new();
    let mut dropped = 0usize;
    for entry in entries {
        let addresses: Vec<String> = match (schema, entry.ip_addresses, entry.ip_address) {
            (InventorySchema::Nested, Some(list), _) => {
                list.into_iter().filter_map(|a| a.ip_address).collect()
            }
            (InventorySchema::Nested, None, Some(_)) => {
                return Err(SourceError::malformed(
                    SourceKind::Inventory,
                    "entry uses flat IPAddress but nested IPAddresses is configured",
                ))
            }
            (InventorySchema::Flat, _, Some(address)) => vec![address],
            (InventorySchema::Flat, Some(_), None) => {
                return Err(SourceError::malformed(
                    SourceKind::Inventory,
                    "entry uses nested IPAddresses but flat IPAddress is configured",
                ))
            }
            (_, None, None) => Vec::new(),
        };

        let component_id = entry.component_id.unwrap_or_default();
        if component_id.trim().is_empty() {
            dropped += 1;
            continue;
        }
        for address in addresses {
            if address.trim().is_empty() {
                continue;
            }
            interfaces.push(InventoryInterface::new(component_id.clone(), address));
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "dropping inventory interfaces without ComponentID");
    }
    Ok(interfaces)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::StaticTransport;

    #[test]
    fn nested_schema_yields_one_interface_per_address() {
        let body = json!([
            {"ComponentID": "x3000c0s19b1n0", "IPAddresses": [
                {"IPAddress": "10.252.0.28"}, {"IPAddress": "10.254.0.28"}
            ]},
            {"ComponentID": "x3000c0s19b1", "IPAddresses": []}
        ]);
        let interfaces = parse_response(body, InventorySchema::Nested).expect("parse");
        assert_eq!(
            interfaces,
            vec![
                InventoryInterface::new("x3000c0s19b1n0", "10.252.0.28"),
                InventoryInterface::new("x3000c0s19b1n0", "10.254.0.28"),
            ]
        );
    }

    #[test]
    fn flat_schema_reads_single_address() {
        let body = json!([{"ComponentID": "x3000c0s19b1n0", "IPAddress": "10.252.0.28"}]);
        let interfaces = parse_response(body, InventorySchema::Flat).expect("parse");
        assert_eq!(interfaces, vec![InventoryInterface::new("x3000c0s19b1n0", "10.252.0.28")]);
    }

    #[test]
    fn blank_fields_are_dropped() {
        let body = json!([
            {"ComponentID": "", "IPAddresses": [{"IPAddress": "10.0.0.1"}]},
            {"ComponentID": "x1", "IPAddresses": [{"IPAddress": " "}, {}]},
            {"IPAddresses": [{"IPAddress": "10.0.0.2"}]},
            {"ComponentID": "x2"}
        ]);
        assert!(parse_response(body, InventorySchema::Nested).expect("parse").is_empty());
    }

    #[test]
    fn variant_mismatch_is_malformed() {
        let flat = json!([{"ComponentID": "x1", "IPAddress": "10.0.0.1"}]);
        assert!(matches!(
            parse_response(flat, InventorySchema::Nested),
            Err(SourceError::Malformed { .. })
        ));
        let nested = json!([{"ComponentID": "x1", "IPAddresses": [{"IPAddress": "10.0.0.1"}]}]);
        assert!(matches!(
            parse_response(nested, InventorySchema::Flat),
            Err(SourceError::Malformed { .. })
        ));
    }

    #[test]
    fn non_list_body_is_malformed() {
        let err = parse_response(json!({"message": "nope"}), InventorySchema::Nested).unwrap_err();
        assert_eq!(err.category(), "malformed");
    }

    #[test]
    fn fetch_hits_ethernet_interfaces_route() {
        let transport = StaticTransport::new().with_body(
            "http://smd/hsm/v2/Inventory/EthernetInterfaces",
            json!([{"ComponentID": "x1", "IPAddresses": [{"IPAddress": "10.0.0.1"}]}]),
        );
        let source = InventorySource::new(Arc::new(transport), "http://smd/", InventorySchema::Nested);
        assert_eq!(source.fetch().expect("fetch").len(), 1);
    }
}
