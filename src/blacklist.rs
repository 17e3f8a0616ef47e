// src/blacklist.rs

//! Binary package blacklist of a bundle
//!
//! The blacklist file lists binary packages reprepro must purge from the
//! bundle. Active entries are `<package> purge` lines; packages of the own
//! suite that aren't blacklisted yet are proposed as commented lines below a
//! separator so they can be enabled by uncommenting.

use crate::error::{Error, Result};
use crate::repository::SuiteQuery;
use std::collections::BTreeSet;
use tracing::{info, warn};

const ACTION: &str = "purge";

/// Line introducing the proposed entries
pub fn separator() -> String {
    format!("#{} uncomment to blacklist: {}", "=".repeat(20), "=".repeat(20))
}

/// Blacklisted and proposed binary package names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    active: BTreeSet<String>,
    proposed: BTreeSet<String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blacklist only the given packages
    pub fn from_active(active: BTreeSet<String>) -> Self {
        Self {
            active,
            proposed: BTreeSet::new(),
        }
    }

    /// Blacklist `package`, withdrawing a proposal for it
    pub fn activate(&mut self, package: &str) {
        self.proposed.remove(package);
        self.active.insert(package.to_string());
    }

    /// Propose `package` unless it is blacklisted already
    pub fn propose(&mut self, package: &str) {
        if !self.active.contains(package) {
            self.proposed.insert(package.to_string());
        }
    }

    pub fn active(&self) -> &BTreeSet<String> {
        &self.active
    }

    pub fn proposed(&self) -> &BTreeSet<String> {
        &self.proposed
    }

    pub fn is_active(&self, package: &str) -> bool {
        self.active.contains(package)
    }

    /// Render the blacklist file
    pub fn serialize(&self, leading_remark: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(remark) = leading_remark {
            out.push_str(remark);
            out.push('\n');
        }
        for package in &self.active {
            out.push_str(&format!("{} {}\n", package, ACTION));
        }
        if !self.proposed.is_empty() {
            out.push('\n');
            out.push_str(&separator());
            out.push('\n');
            for package in &self.proposed {
                out.push_str(&format!("# {} {}\n", package, ACTION));
            }
        }
        out
    }

    /// Parse a blacklist file; only active entries are kept
    pub fn parse(text: &str) -> Self {
        let mut blacklist = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_whitespace().collect::<Vec<_>>().as_slice() {
                [package, action] if *action == ACTION => blacklist.activate(package),
                _ => warn!("Ignoring invalid line {} in blacklist: {}", lineno + 1, line),
            }
        }
        blacklist
    }
}

/// Rebuild the blacklist from the binaries of the bundle's own suite
///
/// Packages in `already_blacklisted` stay active, all other binaries of the
/// own suite are proposed. Blacklisted packages no longer in the suite are
/// dropped.
pub fn update(
    own_suite: Option<&dyn SuiteQuery>,
    bundle_name: &str,
    already_blacklisted: &BTreeSet<String>,
    refresh: bool,
) -> Result<Blacklist> {
    let suite = own_suite.ok_or_else(|| Error::OwnSuiteUnavailable(bundle_name.to_string()))?;
    info!(
        "Creating blacklist containing binary packages from the bundle's own suite {}",
        suite.name()
    );

    let unavailable = |e: Error| match e {
        Error::RepositoryUnavailable { .. } => e,
        other => Error::unavailable(suite.name(), other),
    };
    suite.scan(refresh).map_err(unavailable)?;

    let mut blacklist = Blacklist::new();
    for record in suite.query_binaries().map_err(unavailable)? {
        if already_blacklisted.contains(&record.package) {
            blacklist.activate(&record.package);
        } else {
            blacklist.propose(&record.package);
        }
    }
    Ok(blacklist)
}
