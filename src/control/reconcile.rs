// src/control/reconcile.rs

//! Rebuilding a bundle's sources control list from suite scans
//!
//! Every scanned suite contributes at most one variant per source name. For
//! each source the reconciler picks a reference variant, classifies all
//! variants against it and activates at most one of them by precedence:
//!
//! 1. variants matching the reference (`IsCurrent`, `ShouldBeKept`)
//! 2. variants that were active in the previous control list
//! 3. `IsMissing` variants from an `add_from` suite
//! 4. `IsUpgrade` variants from an `upgrade_from` suite
//!
//! Variants are visited in suite order; the highest tier wins and a later
//! variant of the same tier replaces an earlier one.

use super::{ControlList, PackageRecord, Status, classify};
use crate::error::{Error, Result};
use crate::repository::{QueryRecord, SuiteQuery, sorted_unique};
use rayon::prelude::*;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Suites and activation policy of one update
#[derive(Default)]
pub struct UpdateParams<'a> {
    /// Suites packages may be taken from
    pub suppliers: Vec<&'a dyn SuiteQuery>,
    /// Suites defining the current versions (typically including the own suite)
    pub references: Vec<&'a dyn SuiteQuery>,
    /// Names of suites whose sources are sorted to the top of the file
    pub highlighted_suites: BTreeSet<String>,
    /// Names of suites whose missing sources are activated
    pub add_from: BTreeSet<String>,
    /// Names of suites whose upgrades are activated
    pub upgrade_from: BTreeSet<String>,
    /// Refresh suite caches before querying
    pub refresh: bool,
}

/// Query results of one suite, reduced to the latest entry per source name
struct SuiteScan {
    suite: String,
    sources: BTreeMap<String, QueryRecord>,
    binaries: BTreeMap<String, QueryRecord>,
}

impl SuiteScan {
    fn source_names(&self) -> impl Iterator<Item = &String> {
        self.sources.keys().chain(self.binaries.keys())
    }

    /// The suite's variant of `source_name`
    ///
    /// The source index version wins over the binaries' source version. A
    /// source without any binaries in this suite is informational only.
    fn record(&self, source_name: &str) -> Option<PackageRecord> {
        let source = self.sources.get(source_name);
        let binary = self.binaries.get(source_name);
        let version = source.or(binary)?.version.clone();
        let mut record = PackageRecord::new(source_name.to_string(), self.suite.clone(), version);
        record.status = if binary.is_some() {
            Status::IsMissing
        } else {
            Status::Info
        };
        Some(record)
    }
}

/// Keep the highest version per source name
fn latest_by_source(records: Vec<QueryRecord>) -> BTreeMap<String, QueryRecord> {
    let mut latest: BTreeMap<String, QueryRecord> = BTreeMap::new();
    for record in records {
        match latest.entry(record.source_name.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
            Entry::Occupied(mut entry) => {
                if record.version > entry.get().version {
                    entry.insert(record);
                }
            }
        }
    }
    latest
}

fn scan_suite(suite: &dyn SuiteQuery, refresh: bool) -> Result<SuiteScan> {
    let name = suite.name();
    let unavailable = |e: Error| match e {
        Error::RepositoryUnavailable { .. } => e,
        other => Error::unavailable(name, other),
    };

    info!(
        "{} suite {}",
        if refresh { "Updating and querying" } else { "Querying" },
        name
    );
    suite.scan(refresh).map_err(unavailable)?;
    let sources = suite.query_sources().map_err(unavailable)?;
    let binaries = suite.query_binaries().map_err(unavailable)?;

    Ok(SuiteScan {
        suite: name.to_string(),
        sources: latest_by_source(sources),
        binaries: latest_by_source(binaries),
    })
}

/// Activation tier of a single record; 0 means it can't be activated
fn tier(
    record: &PackageRecord,
    was_active: bool,
    add_from: &BTreeSet<String>,
    upgrade_from: &BTreeSet<String>,
) -> u8 {
    if record.status.is_info() {
        0
    } else if record.status == Status::IsUpgrade && upgrade_from.contains(&record.suite_name) {
        4
    } else if record.status == Status::IsMissing && add_from.contains(&record.suite_name) {
        3
    } else if was_active {
        2
    } else if record.status.is_current() {
        1
    } else {
        0
    }
}

/// Mark at most one of the (equally named, sorted) `records` active
///
/// Returns the index of the activated record.
pub(crate) fn mark_active(
    records: &mut [PackageRecord],
    was_active: impl Fn(&PackageRecord) -> bool,
    add_from: &BTreeSet<String>,
    upgrade_from: &BTreeSet<String>,
) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (idx, record) in records.iter().enumerate() {
        let t = tier(record, was_active(record), add_from, upgrade_from);
        if t > 0 && best.is_none_or(|(_, best_tier)| t >= best_tier) {
            best = Some((idx, t));
        }
    }

    for record in records.iter_mut() {
        record.active = false;
    }
    let (idx, t) = best?;
    records[idx].active = true;
    debug!(
        "Activating {} {} from {} (tier {})",
        records[idx].source_name, records[idx].version, records[idx].suite_name, t
    );
    Some(idx)
}

/// Builds sources control lists for a bundle
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    own_suite: Option<String>,
}

impl Reconciler {
    /// `own_suite` is the name of the suite holding the bundle's current content
    pub fn new(own_suite: Option<String>) -> Self {
        Self { own_suite }
    }

    pub fn own_suite(&self) -> Option<&str> {
        self.own_suite.as_deref()
    }

    /// Scan all supplier and reference suites and rebuild the control list
    ///
    /// Active records of `previous` stay candidates for activation. A failure
    /// to scan any suite aborts the whole update.
    pub fn update(&self, params: &UpdateParams<'_>, previous: &ControlList) -> Result<ControlList> {
        let suites = sorted_unique(
            params
                .suppliers
                .iter()
                .chain(params.references.iter())
                .copied(),
        );
        if suites.is_empty() {
            return Err(Error::NoSuites);
        }
        info!("Creating sources control list for {} suites", suites.len());

        let scans = suites
            .par_iter()
            .map(|suite| scan_suite(*suite, params.refresh))
            .collect::<Result<Vec<_>>>()?;

        let mut highlighted: BTreeSet<String> = previous
            .active_records()
            .map(|r| r.source_name.clone())
            .collect();
        let mut names: BTreeSet<String> = BTreeSet::new();
        for scan in &scans {
            names.extend(scan.source_names().cloned());
            if params.highlighted_suites.contains(&scan.suite) {
                highlighted.extend(scan.source_names().cloned());
            }
        }

        let reference_suites: BTreeSet<&str> = params.references.iter().map(|s| s.name()).collect();

        let mut list = ControlList::new();
        for name in &names {
            let mut records: Vec<PackageRecord> =
                scans.iter().filter_map(|scan| scan.record(name)).collect();
            records.sort();

            let reference = self.reference(&records, &reference_suites).cloned();
            for record in records.iter_mut().filter(|r| !r.status.is_info()) {
                record.status = classify(record, reference.as_ref());
                if record.status == Status::IsCurrent && self.is_own(record) {
                    record.status = Status::ShouldBeKept;
                }
            }

            if mark_active(
                &mut records,
                |r| previous.is_active(r),
                &params.add_from,
                &params.upgrade_from,
            )
            .is_some()
            {
                // Sources shipped by the bundle are listed on top
                highlighted.insert(name.clone());
            }
            list.set_records(name, records);
        }

        list.set_highlighted(highlighted);
        info!(
            "Sources control list has {} sources, {} active",
            list.len(),
            list.active_records().count()
        );
        Ok(list)
    }

    fn is_own(&self, record: &PackageRecord) -> bool {
        self.own_suite.as_deref() == Some(record.suite_name.as_str())
    }

    /// The own suite's variant, else the highest variant of any reference suite
    fn reference<'r>(
        &self,
        records: &'r [PackageRecord],
        reference_suites: &BTreeSet<&str>,
    ) -> Option<&'r PackageRecord> {
        let candidates = || records.iter().filter(|r| !r.status.is_info());
        candidates().find(|r| self.is_own(r)).or_else(|| {
            candidates()
                .filter(|r| reference_suites.contains(r.suite_name.as_str()))
                .max_by(|a, b| a.version.cmp(&b.version))
        })
    }
}
