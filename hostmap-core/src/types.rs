//! Domain types shared by every hostmap crate.
//!
//! A [`DnsRecord`] is the only value that crosses crate boundaries; adapter
//! internals (leases, interfaces, topology nodes) stay in `hostmap-sources`.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DnsRecord
// ---------------------------------------------------------------------------

/// One hostname → address mapping.
///
/// Serialized with the field names the persisted `records.json.gz` blob has
/// always used (`hostname`, `ip-address`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "hostname")]
    pub name: String,
    #[serde(rename = "ip-address")]
    pub address: String,
}

impl DnsRecord {
    /// Build a record, returning `None` when either field is blank after
    /// trimming. Blank records are dropped, never propagated.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Option<Self> {
        let record = Self {
            name: name.into(),
            address: address.into(),
        };
        record.is_valid().then_some(record)
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.address.trim().is_empty()
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.address)
    }
}

// ---------------------------------------------------------------------------
// RecordSet
// ---------------------------------------------------------------------------

/// Insertion-ordered set of [`DnsRecord`]s keyed by the `{name, address}` value.
///
/// Order reflects merge precedence; comparison ([`RecordSet::same_members`])
/// ignores it.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<DnsRecord>,
    seen: HashSet<DnsRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` unless an equal record is already present or the
    /// record is invalid. Returns `true` when the set grew.
    pub fn insert(&mut self, record: DnsRecord) -> bool {
        if !record.is_valid() || self.seen.contains(&record) {
            return false;
        }
        self.seen.insert(record.clone());
        self.records.push(record);
        true
    }

    /// Convenience for `insert(DnsRecord::new(..))`; blank input is ignored.
    pub fn push(&mut self, name: impl Into<String>, address: impl Into<String>) -> bool {
        match DnsRecord::new(name, address) {
            Some(record) => self.insert(record),
            None => false,
        }
    }

    pub fn contains(&self, record: &DnsRecord) -> bool {
        self.seen.contains(record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DnsRecord> {
        self.records.iter()
    }

    /// Records in merge order.
    pub fn as_slice(&self) -> &[DnsRecord] {
        &self.records
    }

    /// Records sorted by name, then address. This is the persisted and
    /// rendered order.
    pub fn canonical(&self) -> Vec<DnsRecord> {
        let sorted: BTreeSet<&DnsRecord> = self.records.iter().collect();
        sorted.into_iter().cloned().collect()
    }

    /// Value-based set equality: same cardinality and identical membership.
    pub fn same_members(&self, other: &RecordSet) -> bool {
        self.len() == other.len() && self.records.iter().all(|r| other.contains(r))
    }

    /// Records present here but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a RecordSet) -> impl Iterator<Item = &'a DnsRecord> {
        self.records.iter().filter(move |r| !other.contains(r))
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.same_members(other)
    }
}

impl Eq for RecordSet {}

impl FromIterator<DnsRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = DnsRecord>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<DnsRecord> for RecordSet {
    fn extend<I: IntoIterator<Item = DnsRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a DnsRecord;
    type IntoIter = std::slice::Iter<'a, DnsRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for RecordSet {
    type Item = DnsRecord;
    type IntoIter = std::vec::IntoIter<DnsRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Sources and run results
// ---------------------------------------------------------------------------

/// The three upstream inventory sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lease,
    Inventory,
    Topology,
}

impl SourceKind {
    pub fn all() -> &'static [SourceKind] {
        &[SourceKind::Lease, SourceKind::Inventory, SourceKind::Topology]
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Lease => write!(f, "lease"),
            SourceKind::Inventory => write!(f, "inventory"),
            SourceKind::Topology => write!(f, "topology"),
        }
    }
}

/// Sources that failed during a run (transport or malformed response).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceErrors(BTreeSet<SourceKind>);

impl SourceErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, kind: SourceKind) {
        self.0.insert(kind);
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        self.0.contains(&kind)
    }

    /// The aggregate error flag consumed by the diff engine.
    pub fn any(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for SourceErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", names.join(","))
    }
}

impl FromIterator<SourceKind> for SourceErrors {
    fn from_iter<I: IntoIterator<Item = SourceKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Output of the merge phase: the freshly computed master set plus the
/// sources that failed while producing it.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub master: RecordSet,
    pub source_errors: SourceErrors,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, address: &str) -> DnsRecord {
        DnsRecord {
            name: name.to_string(),
            address: address.to_string(),
        }
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(DnsRecord::new("", "10.1.1.9").is_none());
        assert!(DnsRecord::new("   ", "10.1.1.9").is_none());
        assert!(DnsRecord::new("ncn-w001", " ").is_none());
        assert!(DnsRecord::new("ncn-w001", "10.252.1.7").is_some());
    }

    #[test]
    fn insert_keeps_first_seen_order_and_drops_duplicates() {
        let mut set = RecordSet::new();
        assert!(set.insert(rec("b", "10.0.0.2")));
        assert!(set.insert(rec("a", "10.0.0.1")));
        assert!(!set.insert(rec("b", "10.0.0.2")));
        let names: Vec<&str> = set.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn difference_lists_members_missing_from_the_other_set() {
        let mut old = RecordSet::new();
        old.insert(rec("uan01", "10.252.1.20"));
        old.insert(rec("ncn-w001", "10.252.1.7"));
        let mut new = RecordSet::new();
        new.insert(rec("ncn-w001", "10.252.1.7"));
        new.insert(rec("uan02", "10.252.1.21"));

        let removed: Vec<&str> = old.difference(&new).map(|r| r.name.as_str()).collect();
        let added: Vec<&str> = new.difference(&old).map(|r| r.name.as_str()).collect();
        assert_eq!(removed, ["uan01"]);
        assert_eq!(added, ["uan02"]);
    }

    #[test]
    fn same_name_different_address_coexist() {
        let mut set = RecordSet::new();
        set.push("x3000c0s19b1n0", "10.252.0.28");
        set.push("x3000c0s19b1n0", "10.252.0.29");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn name_comparison_is_case_sensitive() {
        let mut set = RecordSet::new();
        set.push("UAN01", "10.0.0.1");
        set.push("uan01", "10.0.0.1");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn invalid_record_is_not_inserted() {
        let mut set = RecordSet::new();
        assert!(!set.insert(rec("", "10.1.1.9")));
        assert!(set.is_empty());
    }

    #[test]
    fn equality_ignores_order() {
        let a: RecordSet = vec![rec("a", "1"), rec("b", "2")].into_iter().collect();
        let b: RecordSet = vec![rec("b", "2"), rec("a", "1")].into_iter().collect();
        assert_eq!(a, b);
        let c: RecordSet = vec![rec("a", "1"), rec("c", "3")].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn canonical_sorts_by_name_then_address() {
        let set: RecordSet = vec![rec("b", "2"), rec("a", "9"), rec("a", "1")]
            .into_iter()
            .collect();
        let canonical = set.canonical();
        assert_eq!(canonical, vec![rec("a", "1"), rec("a", "9"), rec("b", "2")]);
    }

    #[test]
    fn record_serializes_with_historical_field_names() {
        let json = serde_yaml::to_string(&rec("uan01", "10.0.0.1")).expect("serialize");
        assert!(json.contains("hostname: uan01"));
        assert!(json.contains("ip-address: 10.0.0.1"));
    }

    #[test]
    fn source_errors_display() {
        let mut errors = SourceErrors::new();
        assert_eq!(errors.to_string(), "none");
        assert!(!errors.any());
        errors.mark(SourceKind::Topology);
        errors.mark(SourceKind::Lease);
        assert!(errors.any());
        assert_eq!(errors.to_string(), "lease,topology");
    }
}
