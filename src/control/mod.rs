// src/control/mod.rs

//! Sources control lists
//!
//! A control list enumerates every known variant of each source package of a
//! bundle, one `PackageRecord` per (source, suite), with at most one variant
//! per source marked active. This module holds the data model; `status`
//! classifies variants, `reconcile` rebuilds a list from suite scans and
//! `format` reads and writes the editable file.

pub mod format;
pub mod reconcile;
pub mod status;

use crate::version::DebianVersion;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub use reconcile::{Reconciler, UpdateParams};
pub use status::classify;

/// Relationship of a package variant to the bundle's reference version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// Same version as the reference
    IsCurrent,
    /// The reference itself, found in the bundle's own suite
    ShouldBeKept,
    /// Newer than the reference
    IsUpgrade,
    /// Older than the reference
    IsDowngrade,
    /// The source is not part of the bundle or any reference suite
    IsMissing,
    /// Informational only, never activated automatically
    Info,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::IsCurrent => "is-current",
            Status::ShouldBeKept => "should-be-kept",
            Status::IsUpgrade => "is-upgrade",
            Status::IsDowngrade => "is-downgrade",
            Status::IsMissing => "is-missing",
            Status::Info => "info",
        }
    }

    pub fn is_info(&self) -> bool {
        *self == Status::Info
    }

    /// Variants that mirror what the bundle currently ships
    pub fn is_current(&self) -> bool {
        matches!(self, Status::IsCurrent | Status::ShouldBeKept)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "is-current" => Ok(Status::IsCurrent),
            "should-be-kept" => Ok(Status::ShouldBeKept),
            "is-upgrade" => Ok(Status::IsUpgrade),
            "is-downgrade" => Ok(Status::IsDowngrade),
            "is-missing" => Ok(Status::IsMissing),
            "info" => Ok(Status::Info),
            _ => Err(format!("Invalid package status: {}", s)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One variant of a source package as found in one suite
///
/// Equality and ordering only consider `(source_name, suite_name, version)`;
/// `active` and `status` are annotations computed per run.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub source_name: String,
    pub suite_name: String,
    pub version: DebianVersion,
    pub active: bool,
    pub status: Status,
}

impl PackageRecord {
    /// Create an inactive record; the status is assigned by classification
    pub fn new(source_name: String, suite_name: String, version: DebianVersion) -> Self {
        Self {
            source_name,
            suite_name,
            version,
            active: false,
            status: Status::Info,
        }
    }

    fn key(&self) -> (&str, &str, &DebianVersion) {
        (&self.source_name, &self.suite_name, &self.version)
    }
}

impl PartialEq for PackageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PackageRecord {}

impl Ord for PackageRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for PackageRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered mapping of source name to its package variants
#[derive(Debug, Clone, Default)]
pub struct ControlList {
    sources: BTreeMap<String, BTreeSet<PackageRecord>>,
    highlighted: BTreeSet<String>,
}

impl ControlList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing an equal one
    pub fn insert(&mut self, record: PackageRecord) {
        let records = self.sources.entry(record.source_name.clone()).or_default();
        records.replace(record);
    }

    /// Replace all records of `source_name`
    pub fn set_records(&mut self, source_name: &str, records: impl IntoIterator<Item = PackageRecord>) {
        self.sources
            .insert(source_name.to_string(), records.into_iter().collect());
    }

    pub fn records(&self, source_name: &str) -> Option<&BTreeSet<PackageRecord>> {
        self.sources.get(source_name)
    }

    /// All sources with their records, alphabetically
    pub fn sources(&self) -> impl Iterator<Item = (&str, &BTreeSet<PackageRecord>)> {
        self.sources.iter().map(|(name, records)| (name.as_str(), records))
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// The active record of `source_name`, if any
    pub fn active(&self, source_name: &str) -> Option<&PackageRecord> {
        self.sources.get(source_name)?.iter().find(|r| r.active)
    }

    /// Every active record, ordered by source name
    pub fn active_records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.sources.values().flat_map(|records| records.iter().filter(|r| r.active))
    }

    /// Whether an active record equal to `record` exists for its source
    pub fn is_active(&self, record: &PackageRecord) -> bool {
        self.sources
            .get(&record.source_name)
            .and_then(|records| records.get(record))
            .is_some_and(|r| r.active)
    }

    /// Source names sorted to the top of the serialized file
    pub fn highlighted(&self) -> &BTreeSet<String> {
        &self.highlighted
    }

    pub fn set_highlighted(&mut self, highlighted: BTreeSet<String>) {
        self.highlighted = highlighted;
    }

    pub fn is_highlighted(&self, source_name: &str) -> bool {
        self.highlighted.contains(source_name)
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
