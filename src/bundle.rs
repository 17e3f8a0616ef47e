// src/bundle.rs

//! Bundles and their configuration files
//!
//! A bundle lives in `repo/bundle/<distribution>/<number>` below the project
//! base directory. Its `conf/` folder holds the files maintained here:
//!
//! - `sources_control.list`: the editable list of source package variants
//! - `FilterList-blacklisted-binary-packages`: binaries to purge
//! - `info`: bundle metadata (`Bundlename:`, `BasedOn:`, ...)
//! - `distributions`: reprepro distribution config, read for `ReadOnly:`

use crate::blacklist::{self, Blacklist};
use crate::config::{CatalogConfig, SuiteDefinition};
use crate::control::{ControlList, Reconciler, UpdateParams, format};
use crate::error::{Error, Result};
use crate::fsutil;
use crate::repository::SuiteQuery;
use crate::repository::debian::clean_stanzas;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Bundle folders relative to the project base directory
pub const BUNDLE_DIR: &str = "repo/bundle";

const SOURCES_CONTROL_LIST: &str = "sources_control.list";
const BLACKLIST: &str = "FilterList-blacklisted-binary-packages";
const INFO_FILE: &str = "info";
const DISTRIBUTIONS: &str = "distributions";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DistributionStanza {
    #[serde(default)]
    read_only: Option<String>,
}

/// A bundle of a distribution, identified by `<distribution>/<number>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bundle {
    distribution: String,
    number: u32,
    basedir: PathBuf,
    own_suite: Option<String>,
}

/// Split `[repo/bundle/]<distribution>[/<number>]`
fn parse_name(name: &str) -> Result<(String, Option<u32>)> {
    let invalid = || Error::InvalidBundleName(name.to_string());
    let rest = name
        .strip_prefix(BUNDLE_DIR)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap_or(name);

    let (distribution, number) = match rest.split_once('/') {
        Some((distribution, number)) => (distribution, Some(number)),
        None => (rest, None),
    };

    let valid_distribution = !distribution.is_empty()
        && distribution
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if !valid_distribution {
        return Err(invalid());
    }

    let number = match number {
        Some(n) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => {
            Some(n.parse::<u32>().map_err(|_| invalid())?)
        }
        Some(_) => return Err(invalid()),
        None => None,
    };
    Ok((distribution.to_string(), number))
}

/// One above the highest existing bundle number of `distribution`
fn next_number(basedir: &Path, distribution: &str) -> Result<u32> {
    let dir = basedir.join(BUNDLE_DIR).join(distribution);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(e.into()),
    };

    let mut highest = 0;
    for entry in entries {
        let entry = entry?;
        if let Some(number) = entry
            .file_name()
            .to_str()
            .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .and_then(|n| n.parse::<u32>().ok())
        {
            highest = highest.max(number);
        }
    }
    highest.checked_add(1).ok_or_else(|| {
        Error::InvalidBundleName(format!("{}/{}: no bundle number left", distribution, highest))
    })
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

impl Bundle {
    /// Open the bundle `name` below `basedir`
    ///
    /// Without a number the next free number of the distribution is used.
    pub fn open(name: &str, basedir: &Path) -> Result<Self> {
        let (distribution, number) = parse_name(name)?;
        let number = match number {
            Some(number) => number,
            None => next_number(basedir, &distribution)?,
        };
        Ok(Self {
            distribution,
            number,
            basedir: basedir.to_path_buf(),
            own_suite: None,
        })
    }

    /// `<distribution>/<number>` with the number padded to four digits
    pub fn name(&self) -> String {
        format!("{}/{:04}", self.distribution, self.number)
    }

    pub fn distribution(&self) -> &str {
        &self.distribution
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.basedir.join(BUNDLE_DIR).join(self.name()).join("conf")
    }

    pub fn sources_control_file(&self) -> PathBuf {
        self.conf_dir().join(SOURCES_CONTROL_LIST)
    }

    pub fn blacklist_file(&self) -> PathBuf {
        self.conf_dir().join(BLACKLIST)
    }

    pub fn info_file(&self) -> PathBuf {
        self.conf_dir().join(INFO_FILE)
    }

    pub fn distributions_file(&self) -> PathBuf {
        self.conf_dir().join(DISTRIBUTIONS)
    }

    /// Fill `{distribution}`, `{bundle}` and `{user}` into a suite selector
    pub fn substitute(&self, template: &str) -> String {
        template
            .replace("{distribution}", &self.distribution)
            .replace("{bundle}", &self.name())
            .replace("{user}", &current_user())
    }

    /// Resolve a selector against the catalog, after substitution
    pub fn select_suites<'c>(&self, selector: &str, catalog: &'c CatalogConfig) -> Vec<&'c SuiteDefinition> {
        catalog.select(&self.substitute(selector))
    }

    /// Set the own suite to the first suite matched by `selector`
    pub fn set_own_suite<'c>(
        &mut self,
        selector: &str,
        catalog: &'c CatalogConfig,
    ) -> Result<&'c SuiteDefinition> {
        let suite = self
            .select_suites(selector, catalog)
            .into_iter()
            .next()
            .ok_or_else(|| Error::OwnSuiteUnavailable(self.name()))?;
        debug!("Own suite of bundle {} is {}", self.name(), suite.name);
        self.own_suite = Some(suite.name.clone());
        Ok(suite)
    }

    pub fn own_suite_name(&self) -> Option<&str> {
        self.own_suite.as_deref()
    }

    /// A bundle is editable unless its distributions file sets `ReadOnly: yes`
    pub fn is_editable(&self) -> Result<bool> {
        let path = self.distributions_file();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        let stanzas: Vec<DistributionStanza> = rfc822_like::from_str(&clean_stanzas(&content))
            .map_err(|e| Error::ParseError(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(!stanzas
            .iter()
            .filter_map(|s| s.read_only.as_deref())
            .any(|ro| ro.trim().eq_ignore_ascii_case("yes")))
    }

    /// Value of the first non-empty `tag:` field of the info file
    ///
    /// Continuation lines belong to the value and are joined with `\n`.
    pub fn info_tag(&self, tag: &str) -> Result<Option<String>> {
        let path = self.info_file();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stanzas: Vec<BTreeMap<String, String>> = rfc822_like::from_str(&clean_stanzas(&content))
            .map_err(|e| Error::ParseError(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(stanzas
            .into_iter()
            .find_map(|mut stanza| stanza.remove(tag).filter(|value| !value.is_empty())))
    }

    /// Rewrite `Bundlename:` (and `BasedOn:` if given) in the info file
    pub fn update_info_file(&self, based_on: Option<&str>) -> Result<PathBuf> {
        let path = self.info_file();
        info!("Setting Bundlename in infofile to '{}'", self.name());
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut out = String::with_capacity(content.len());
        for line in content.split_inclusive('\n') {
            let ending = if line.ends_with('\n') { "\n" } else { "" };
            if line.starts_with("Bundlename:") {
                out.push_str(&format!("Bundlename: {}{}", self.name(), ending));
            } else if let Some(based_on) = based_on.filter(|_| line.starts_with("BasedOn:")) {
                info!("Setting BasedOn in infofile to '{}'", based_on);
                out.push_str(&format!("BasedOn: {}{}", based_on, ending));
            } else {
                out.push_str(line);
            }
        }
        fsutil::write_atomic(&path, out.as_bytes())?;
        Ok(path)
    }

    /// Read the active entries of the sources control list (empty if missing)
    pub fn parse_sources_control_list(&self) -> Result<ControlList> {
        match fs::read_to_string(self.sources_control_file()) {
            Ok(content) => Ok(format::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ControlList::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild and rewrite the sources control list
    ///
    /// Nothing is written if any suite can't be scanned.
    pub fn update_sources_control_list(
        &self,
        params: &UpdateParams<'_>,
        previous: &ControlList,
        leading_remark: Option<&str>,
    ) -> Result<ControlList> {
        let list = Reconciler::new(self.own_suite.clone()).update(params, previous)?;
        let text = format::serialize(&list, leading_remark);
        fsutil::write_atomic(&self.sources_control_file(), text.as_bytes())?;
        info!("Updated {}", self.sources_control_file().display());
        Ok(list)
    }

    /// Rewrite the sources control list keeping only its active lines
    pub fn normalize_sources_control_list(&self) -> Result<()> {
        let path = self.sources_control_file();
        if path.is_file() {
            let list = self.parse_sources_control_list()?;
            fsutil::write_atomic(&path, format::serialize(&list, None).as_bytes())?;
        }
        Ok(())
    }

    /// Blacklisted binary packages (empty if the file is missing)
    pub fn parse_blacklist(&self) -> Result<BTreeSet<String>> {
        match fs::read_to_string(self.blacklist_file()) {
            Ok(content) => Ok(Blacklist::parse(&content).active().clone()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild and rewrite the blacklist from the own suite's binaries
    pub fn update_blacklist(
        &self,
        own_suite: Option<&dyn SuiteQuery>,
        already_blacklisted: &BTreeSet<String>,
        refresh: bool,
        leading_remark: Option<&str>,
    ) -> Result<Blacklist> {
        let blacklist = blacklist::update(own_suite, &self.name(), already_blacklisted, refresh)
            .inspect_err(|e| {
                if matches!(e, Error::OwnSuiteUnavailable(_)) {
                    error!("Can't update blacklist as own suite is not (yet) available");
                }
            })?;
        let text = blacklist.serialize(leading_remark);
        fsutil::write_atomic(&self.blacklist_file(), text.as_bytes())?;
        Ok(blacklist)
    }

    /// Rewrite the blacklist keeping only its active entries
    pub fn normalize_blacklist(&self) -> Result<()> {
        let path = self.blacklist_file();
        if path.is_file() {
            let blacklist = Blacklist::from_active(self.parse_blacklist()?);
            fsutil::write_atomic(&path, blacklist.serialize(None).as_bytes())?;
        }
        Ok(())
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
