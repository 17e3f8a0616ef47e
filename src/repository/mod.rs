// src/repository/mod.rs

//! Repository suites as seen by the reconciliation engine
//!
//! This module provides:
//! - The `SuiteQuery` trait every scannable suite implements
//! - `QueryRecord`, one package entry returned by a suite query
//! - `MemorySuite`, an in-memory suite for callers that already hold package lists
//! - `DebianSuite` (see `debian`), a cache-backed suite over a Debian-style archive

pub mod client;
pub mod debian;

use crate::error::{Error, Result};
use crate::version::DebianVersion;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use client::RepositoryClient;
pub use debian::DebianSuite;

/// One package entry visible in a suite
///
/// For source index entries `package` and `source_name` are the same. For
/// binary entries `version` is the version of the source the binary was built
/// from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryRecord {
    pub package: String,
    pub version: DebianVersion,
    pub source_name: String,
    pub suite: String,
}

impl QueryRecord {
    pub fn new(package: String, source_name: String, version: DebianVersion, suite: String) -> Self {
        Self {
            package,
            version,
            source_name,
            suite,
        }
    }

    /// Build a record from plain strings, parsing the version
    pub fn parse(package: &str, source_name: &str, version: &str, suite: &str) -> Result<Self> {
        Ok(Self::new(
            package.to_string(),
            source_name.to_string(),
            DebianVersion::parse(version)?,
            suite.to_string(),
        ))
    }
}

/// A package repository snapshot that can be scanned and queried
///
/// Implementations must be shareable across threads: the reconciler scans
/// independent suites in parallel.
pub trait SuiteQuery: Send + Sync {
    /// Suite identifier, e.g. `ubuntu:noble` or `bundle:noble/0042`
    fn name(&self) -> &str;

    /// Make the suite's package lists available, refreshing caches if `refresh` is set
    fn scan(&self, refresh: bool) -> Result<()>;

    /// Source package entries ordered by (name, version)
    fn query_sources(&self) -> Result<Vec<QueryRecord>>;

    /// Binary package entries ordered by (name, version)
    fn query_binaries(&self) -> Result<Vec<QueryRecord>>;
}

/// Deduplicate suites by name and order them by name
pub fn sorted_unique<'a>(
    suites: impl IntoIterator<Item = &'a dyn SuiteQuery>,
) -> Vec<&'a dyn SuiteQuery> {
    let mut by_name: BTreeMap<&str, &'a dyn SuiteQuery> = BTreeMap::new();
    for suite in suites {
        by_name.entry(suite.name()).or_insert(suite);
    }
    by_name.into_values().collect()
}

/// Suite backed by package lists held in memory
#[derive(Debug, Default)]
pub struct MemorySuite {
    name: String,
    sources: Vec<QueryRecord>,
    binaries: Vec<QueryRecord>,
    unavailable: bool,
    scans: AtomicUsize,
}

impl MemorySuite {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// A suite whose scan always fails
    pub fn unavailable(name: &str) -> Self {
        Self {
            unavailable: true,
            ..Self::new(name)
        }
    }

    /// Add a source index entry
    pub fn with_source(mut self, source_name: &str, version: &str) -> Result<Self> {
        let record = QueryRecord::parse(source_name, source_name, version, &self.name)?;
        self.sources.push(record);
        self.sources.sort();
        Ok(self)
    }

    /// Add a binary entry built from `source_name` at `version`
    pub fn with_binary(mut self, package: &str, source_name: &str, version: &str) -> Result<Self> {
        let record = QueryRecord::parse(package, source_name, version, &self.name)?;
        self.binaries.push(record);
        self.binaries.sort();
        Ok(self)
    }

    /// Number of scans performed so far
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl SuiteQuery for MemorySuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan(&self, _refresh: bool) -> Result<()> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::unavailable(&self.name, "suite is not reachable"));
        }
        Ok(())
    }

    fn query_sources(&self) -> Result<Vec<QueryRecord>> {
        Ok(self.sources.clone())
    }

    fn query_binaries(&self) -> Result<Vec<QueryRecord>> {
        Ok(self.binaries.clone())
    }
}
