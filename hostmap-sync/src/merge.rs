//! Precedence merger: adapter outputs → one deduplicated master record set.
//!
//! Steps run in fixed order and accumulate into a single [`RecordSet`], so
//! first-seen wins on exact `{name, address}` duplicates:
//!
//! 1. Lease records (source of record; subnet entries already lead).
//! 2. Inventory CNAME-equivalents: other component IDs sharing a lease's address.
//! 3. Topology role aliases: `<alias>-mgmt` on the parent (HMN) address and
//!    `<alias><nmn suffix>` on the node's own (NMN) address.
//! 4. Network reservations: `<name>.<subdomain>`, the bare name on the NMN,
//!    declared aliases, and HSN nid aliases for xname reservations.
//!
//! A name may map to several addresses; resolving that is left to the
//! name-server.

use std::sync::OnceLock;

use regex::Regex;

use hostmap_core::{DnsRecord, MergeConfig, RecordSet, RunResult};
use hostmap_sources::lease::NMN_SUFFIX;
use hostmap_sources::{InventoryInterface, NetworkReservation, SourceSnapshot, TopologyNode};

/// Reservations whose name starts with this are hardware identifiers.
const XNAME_PREFIX: char = 'x';

/// Merge one run's adapter outputs. Never fails: whatever the sources
/// produced is merged and their error marks are carried forward.
pub fn merge(snapshot: &SourceSnapshot, config: &MergeConfig) -> RunResult {
    let mut master = RecordSet::new();

    let leases = add_leases(&mut master, &snapshot.leases);
    let cnames = add_inventory_aliases(&mut master, &snapshot.leases, &snapshot.interfaces);

    let nids = correlate_nids(&master, &snapshot.topology.nodes);
    let roles = add_role_aliases(
        &mut master,
        &snapshot.topology.nodes,
        &snapshot.interfaces,
        config,
    );
    let statics = add_reservations(
        &mut master,
        &snapshot.topology.reservations,
        &nids,
        config.hsn_port,
    );

    tracing::debug!(leases, cnames, roles, statics, nids = nids.len(), "merge steps");
    tracing::info!(
        records = master.len(),
        failed_sources = %snapshot.errors,
        "merged master record set",
    );

    RunResult {
        master,
        source_errors: snapshot.errors.clone(),
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn add_leases(master: &mut RecordSet, leases: &[DnsRecord]) -> usize {
    leases
        .iter()
        .filter(|r| master.insert((*r).clone()))
        .count()
}

fn add_inventory_aliases(
    master: &mut RecordSet,
    leases: &[DnsRecord],
    interfaces: &[InventoryInterface],
) -> usize {
    let mut added = 0;
    for lease in leases {
        for iface in interfaces {
            if iface.ip_address == lease.address
                && iface.component_id != lease.name
                && master.push(iface.component_id.clone(), iface.ip_address.clone())
            {
                added += 1;
            }
        }
    }
    added
}

fn add_role_aliases(
    master: &mut RecordSet,
    nodes: &[TopologyNode],
    interfaces: &[InventoryInterface],
    config: &MergeConfig,
) -> usize {
    let nmn_suffix = config.nmn_alias_suffix.as_deref().unwrap_or("");
    let mut added = 0;

    for node in nodes {
        let Some(role) = node.role.as_deref() else {
            continue;
        };
        if !config.alias_roles.iter().any(|r| r == role) {
            continue;
        }
        for iface in interfaces {
            let suffix = if iface.component_id == node.parent_id {
                "-mgmt"
            } else if iface.component_id == node.self_id {
                nmn_suffix
            } else {
                continue;
            };
            for alias in &node.aliases {
                if master.push(format!("{alias}{suffix}"), iface.ip_address.clone()) {
                    added += 1;
                }
            }
        }
    }
    added
}

fn add_reservations(
    master: &mut RecordSet,
    reservations: &[NetworkReservation],
    nids: &[NidLink],
    hsn_port: Option<u32>,
) -> usize {
    let mut added = 0;
    let mut hsn_matches = 0;
    let mut push = |master: &mut RecordSet, name: String, address: &str| {
        if master.push(name, address) {
            added += 1;
        }
    };

    for reservation in reservations {
        let name = reservation.name.as_str();
        let address = reservation.ip_address.as_str();

        if !name.is_empty() {
            push(master, format!("{name}.{}", reservation.subdomain), address);
            if reservation.subdomain == "nmn" {
                push(master, name.to_string(), address);
            }
        }
        for alias in &reservation.aliases {
            push(master, alias.clone(), address);
        }

        if !name.starts_with(XNAME_PREFIX) {
            continue;
        }
        let port = hsn_port_of(name);
        let xname = normalize_xname(name);
        for link in nids.iter().filter(|l| l.xname == xname) {
            hsn_matches += 1;
            if hsn_port.map_or(true, |wanted| port == Some(wanted)) {
                push(master, link.nid_name.clone(), address);
            }
            if let Some(port) = port {
                push(master, format!("{}-hsn{port}", link.nid_name), address);
            }
            push(master, name.to_string(), address);
        }
    }

    tracing::debug!(hsn_matches, "correlated nid names with HSN reservations");
    added
}

// ---------------------------------------------------------------------------
// nid ↔ xname correlation
// ---------------------------------------------------------------------------

/// A compute node's bare nid name and its normalized xname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NidLink {
    pub nid_name: String,
    pub xname: String,
}

/// Pair each topology node with the leased nid names it declares as aliases.
/// A node with no such alias but a declared `NID` falls back to
/// `nid` + six zero-padded digits.
pub fn correlate_nids(master: &RecordSet, nodes: &[TopologyNode]) -> Vec<NidLink> {
    let mut links: Vec<NidLink> = Vec::new();
    let mut add = |links: &mut Vec<NidLink>, link: NidLink| {
        if !links.contains(&link) {
            links.push(link);
        }
    };

    for node in nodes {
        let xname = normalize_xname(&node.self_id);
        let mut matched = false;
        for record in master.iter().filter(|r| r.name.contains("nid")) {
            let nid_name = record.name.replace(NMN_SUFFIX, "");
            if node.aliases.iter().any(|a| *a == nid_name) {
                matched = true;
                add(&mut links, NidLink { nid_name, xname: xname.clone() });
            }
        }
        if let (false, Some(nid)) = (matched, node.nid) {
            add(
                &mut links,
                NidLink {
                    nid_name: format!("nid{nid:06}"),
                    xname: xname.clone(),
                },
            );
        }
    }
    links
}

static HSN_PORT_REGEX: OnceLock<Regex> = OnceLock::new();
fn hsn_port_regex() -> &'static Regex {
    HSN_PORT_REGEX.get_or_init(|| Regex::new(r"h(\d+)$").expect("Invalid regex"))
}

static ZERO_PAD_REGEX: OnceLock<Regex> = OnceLock::new();
fn zero_pad_regex() -> &'static Regex {
    ZERO_PAD_REGEX.get_or_init(|| Regex::new(r"([a-z])0+([0-9]+[a-z])").expect("Invalid regex"))
}

/// `x1003c7s7b1n1h0` → `Some(0)`; `None` when there is no port suffix.
pub fn hsn_port_of(name: &str) -> Option<u32> {
    hsn_port_regex()
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Strip an HSN port suffix and zero padding: `x1003c07s7b1n1h0` → `x1003c7s7b1n1`.
///
/// Padding is only removed ahead of a digit run that ends in a letter, so a
/// trailing `n00` stays as is.
pub fn normalize_xname(name: &str) -> String {
    let without_port = hsn_port_regex().replace(name, "");
    zero_pad_regex()
        .replace_all(&without_port, "${1}${2}")
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
