// src/repository/debian.rs

//! Debian/Ubuntu archive suites
//!
//! A `DebianSuite` mirrors the `Packages.gz` and `Sources.gz` indices of one
//! distribution into a local cache on `scan` and answers queries from that
//! cache. Index files use the RFC 822-like stanza format.

use super::{QueryRecord, RepositoryClient, SuiteQuery};
use crate::config::SuiteDefinition;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::version::DebianVersion;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const STAMP_FILE: &str = "last_scan.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexKind {
    Sources,
    Packages,
}

/// One index file of the suite and where it is cached
#[derive(Debug, Clone)]
struct IndexFile {
    kind: IndexKind,
    url: String,
    cache_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScanStamp {
    last_sync: String,
}

/// Binary package stanza from a Packages file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BinaryEntry {
    package: String,
    version: String,
    #[serde(default)]
    source: Option<String>,
}

/// Source package stanza from a Sources file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceEntry {
    package: String,
    version: String,
}

/// Cache-backed suite of a Debian-style archive
pub struct DebianSuite {
    definition: SuiteDefinition,
    cache_dir: PathBuf,
}

impl DebianSuite {
    /// Create a suite caching its indices below `cache_root`
    pub fn new(definition: SuiteDefinition, cache_root: &Path) -> Self {
        Self {
            cache_dir: cache_root.join(cache_dir_name(&definition.name)),
            definition,
        }
    }

    pub fn definition(&self) -> &SuiteDefinition {
        &self.definition
    }

    fn indices(&self) -> Vec<IndexFile> {
        let base = format!(
            "{}/dists/{}",
            self.definition.url.trim_end_matches('/'),
            self.definition.distribution
        );
        let mut indices = Vec::new();
        for component in &self.definition.components {
            indices.push(IndexFile {
                kind: IndexKind::Sources,
                url: format!("{}/{}/source/Sources.gz", base, component),
                cache_path: self.cache_dir.join(format!("{}_Sources.gz", component)),
            });
            for arch in &self.definition.architectures {
                indices.push(IndexFile {
                    kind: IndexKind::Packages,
                    url: format!("{}/{}/binary-{}/Packages.gz", base, component, arch),
                    cache_path: self
                        .cache_dir
                        .join(format!("{}_binary-{}_Packages.gz", component, arch)),
                });
            }
        }
        indices
    }

    /// Time of the last successful refresh, if any
    fn last_sync(&self) -> Option<DateTime<Utc>> {
        let content = fs::read_to_string(self.cache_dir.join(STAMP_FILE)).ok()?;
        let stamp: ScanStamp = serde_json::from_str(&content).ok()?;
        DateTime::parse_from_rfc3339(&stamp.last_sync)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Check whether a refresh is due given the suite's `metadata_expire`
    fn needs_sync(&self, refresh: bool) -> bool {
        match self.last_sync() {
            None => true,
            Some(_) if !refresh => false,
            Some(last_sync) => {
                let age = Utc::now().signed_duration_since(last_sync).num_seconds();
                age < 0 || age as u64 >= self.definition.metadata_expire
            }
        }
    }

    fn refresh(&self) -> Result<()> {
        let name = &self.definition.name;
        let client = RepositoryClient::new().map_err(|e| Error::unavailable(name, e))?;

        // Fetch everything before touching the cache so a failed refresh keeps the old copy
        let mut fetched = Vec::new();
        for index in self.indices() {
            let bytes = client
                .fetch(&index.url)
                .map_err(|e| Error::unavailable(name, e))?;
            fetched.push((index, bytes));
        }

        let package_indices = fetched
            .iter()
            .filter(|(index, bytes)| index.kind == IndexKind::Packages && bytes.is_some())
            .count();
        if package_indices == 0 {
            return Err(Error::unavailable(name, "no Packages index found"));
        }

        for (index, bytes) in fetched {
            match bytes {
                Some(bytes) => fsutil::write_atomic(&index.cache_path, &bytes)?,
                None if index.cache_path.exists() => {
                    // Index vanished upstream; drop the stale copy
                    fs::remove_file(&index.cache_path)?;
                }
                None => debug!("No index at {}", index.url),
            }
        }

        let stamp = ScanStamp {
            last_sync: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_vec(&stamp)
            .map_err(|e| Error::ParseError(format!("Failed to encode scan stamp: {}", e)))?;
        fsutil::write_atomic(&self.cache_dir.join(STAMP_FILE), &json)?;

        info!("Refreshed {} package indices of suite {}", package_indices, name);
        Ok(())
    }

    /// Read and decompress the cached copies of all indices of `kind`
    fn read_cached(&self, kind: IndexKind) -> Result<Vec<String>> {
        let name = &self.definition.name;
        if self.last_sync().is_none() {
            return Err(Error::unavailable(name, "suite has not been scanned"));
        }

        let mut contents = Vec::new();
        for index in self.indices().into_iter().filter(|i| i.kind == kind) {
            if !index.cache_path.exists() {
                continue;
            }
            let compressed = fs::read(&index.cache_path)?;
            let mut gz = GzDecoder::new(compressed.as_slice());
            let mut text = String::new();
            gz.read_to_string(&mut text).map_err(|e| {
                Error::unavailable(
                    name,
                    format!("failed to decompress {}: {}", index.cache_path.display(), e),
                )
            })?;
            contents.push(text);
        }
        Ok(contents)
    }
}

/// Cache directory name of a suite
///
/// Bytes other than ASCII alphanumerics, `.` and `-` are written as `_xx`
/// (hex), so distinct suite names never share a directory.
fn cache_dir_name(suite: &str) -> String {
    let mut name = String::with_capacity(suite.len());
    for byte in suite.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("_{:02x}", byte));
        }
    }
    name
}

/// Prepare stanza text for `rfc822_like`
///
/// Drops `#` comment lines and collapses runs of blank lines into one
/// separator; the deserializer ends silently at an empty stanza otherwise.
pub fn clean_stanzas(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut separate = false;
    for line in content.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let line = line.trim_end();
        if line.is_empty() {
            separate = !out.is_empty();
            continue;
        }
        if separate {
            out.push('\n');
            separate = false;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Parse a binary's `Source` field: `name` or `name (version)`
fn parse_source_field(field: &str) -> (String, Option<String>) {
    match field.split_once('(') {
        Some((name, version)) => (
            name.trim().to_string(),
            Some(version.trim_end_matches(')').trim().to_string()),
        ),
        None => (field.trim().to_string(), None),
    }
}

/// Parse Packages file content into query records
pub fn parse_packages(content: &str, suite: &str) -> Result<Vec<QueryRecord>> {
    let entries: Vec<BinaryEntry> = rfc822_like::from_str(&clean_stanzas(content))
        .map_err(|e| Error::unavailable(suite, format!("failed to parse Packages file: {}", e)))?;
    debug!("Parsed {} Packages stanzas of {}", entries.len(), suite);

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let (source_name, source_version) = match &entry.source {
            Some(field) => parse_source_field(field),
            None => (entry.package.clone(), None),
        };
        let version = source_version.as_deref().unwrap_or(&entry.version);
        match DebianVersion::parse(version) {
            Ok(version) => records.push(QueryRecord::new(
                entry.package,
                source_name,
                version,
                suite.to_string(),
            )),
            Err(e) => warn!("Skipping binary {} in {}: {}", entry.package, suite, e),
        }
    }
    Ok(records)
}

/// Parse Sources file content into query records
pub fn parse_sources(content: &str, suite: &str) -> Result<Vec<QueryRecord>> {
    let entries: Vec<SourceEntry> = rfc822_like::from_str(&clean_stanzas(content))
        .map_err(|e| Error::unavailable(suite, format!("failed to parse Sources file: {}", e)))?;
    debug!("Parsed {} Sources stanzas of {}", entries.len(), suite);

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match DebianVersion::parse(&entry.version) {
            Ok(version) => records.push(QueryRecord::new(
                entry.package.clone(),
                entry.package,
                version,
                suite.to_string(),
            )),
            Err(e) => warn!("Skipping source {} in {}: {}", entry.package, suite, e),
        }
    }
    Ok(records)
}

impl SuiteQuery for DebianSuite {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn scan(&self, refresh: bool) -> Result<()> {
        if self.needs_sync(refresh) {
            self.refresh()
        } else {
            debug!("Using cached indices of suite {}", self.definition.name);
            Ok(())
        }
    }

    fn query_sources(&self) -> Result<Vec<QueryRecord>> {
        let mut records = Vec::new();
        for content in self.read_cached(IndexKind::Sources)? {
            records.extend(parse_sources(&content, &self.definition.name)?);
        }
        records.sort();
        records.dedup();
        Ok(records)
    }

    fn query_binaries(&self) -> Result<Vec<QueryRecord>> {
        let mut records = Vec::new();
        for content in self.read_cached(IndexKind::Packages)? {
            records.extend(parse_packages(&content, &self.definition.name)?);
        }
        records.sort();
        records.dedup();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const PACKAGES: &str = "Package: libfoo1
Source: foo (1.2-1)
Version: 1.2-1+b1
Architecture: amd64

Package: bar
Version: 0.9
Architecture: all

Package: broken
Version: not a version
Architecture: all
";

    const SOURCES: &str = "Package: foo
Version: 1.2-1

Package: bar
Version: 0.9
";

    fn gzip(content: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn write_archive(root: &Path, with_sources: bool) {
        let dists = root.join("dists/noble/main");
        fs::create_dir_all(dists.join("binary-amd64")).unwrap();
        fs::write(dists.join("binary-amd64/Packages.gz"), gzip(PACKAGES)).unwrap();
        if with_sources {
            fs::create_dir_all(dists.join("source")).unwrap();
            fs::write(dists.join("source/Sources.gz"), gzip(SOURCES)).unwrap();
        }
    }

    fn definition(root: &Path) -> SuiteDefinition {
        SuiteDefinition {
            name: "local:noble".to_string(),
            url: format!("file://{}", root.display()),
            distribution: "noble".to_string(),
            components: vec!["main".to_string()],
            architectures: vec!["amd64".to_string()],
            metadata_expire: 0,
        }
    }

    #[test]
    fn test_parse_source_field() {
        assert_eq!(
            parse_source_field("foo (1.2-1)"),
            ("foo".to_string(), Some("1.2-1".to_string()))
        );
        assert_eq!(parse_source_field("foo"), ("foo".to_string(), None));
    }

    #[test]
    fn test_parse_packages_uses_source_version() {
        let records = parse_packages(PACKAGES, "s").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].package, "libfoo1");
        assert_eq!(records[0].source_name, "foo");
        assert_eq!(records[0].version.to_string(), "1.2-1");
        assert_eq!(records[1].source_name, "bar");
        assert_eq!(records[1].version.to_string(), "0.9");
    }

    #[test]
    fn test_stanzas_after_blank_runs_and_comments_are_kept() {
        let content = "\n# generated\nPackage: a\nVersion: 1.0\n\n\n  \nPackage: b\nVersion: 2.0\r\n\n\n";
        assert_eq!(
            clean_stanzas(content),
            "Package: a\nVersion: 1.0\n\nPackage: b\nVersion: 2.0\n"
        );

        let records = parse_packages(content, "s").unwrap();
        let names: Vec<_> = records.iter().map(|r| r.package.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(parse_sources(content, "s").unwrap().len(), 2);
    }

    #[test]
    fn test_cache_dir_names_are_distinct() {
        assert_eq!(cache_dir_name("ubuntu:noble-updates"), "ubuntu_3anoble-updates");
        assert_eq!(cache_dir_name("bundle:noble/0001"), "bundle_3anoble_2f0001");
        assert_ne!(cache_dir_name("a:b"), cache_dir_name("a_b"));
        assert_ne!(cache_dir_name("a_3ab"), cache_dir_name("a:b"));

        let cache = tempfile::tempdir().unwrap();
        let mut colon = definition(cache.path());
        colon.name = "a:b".to_string();
        let mut underscore = definition(cache.path());
        underscore.name = "a_b".to_string();
        assert_ne!(
            DebianSuite::new(colon, cache.path()).cache_dir,
            DebianSuite::new(underscore, cache.path()).cache_dir
        );
    }

    #[test]
    fn test_scan_and_query_local_archive() {
        let archive = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        write_archive(archive.path(), true);

        let suite = DebianSuite::new(definition(archive.path()), cache.path());
        suite.scan(true).unwrap();

        let sources = suite.query_sources().unwrap();
        let names: Vec<_> = sources.iter().map(|r| r.package.as_str()).collect();
        assert_eq!(names, vec!["bar", "foo"]);

        let binaries = suite.query_binaries().unwrap();
        let names: Vec<_> = binaries.iter().map(|r| r.package.as_str()).collect();
        assert_eq!(names, vec!["bar", "libfoo1"]);
    }

    #[test]
    fn test_sources_index_is_optional() {
        let archive = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        write_archive(archive.path(), false);

        let suite = DebianSuite::new(definition(archive.path()), cache.path());
        suite.scan(false).unwrap();
        assert!(suite.query_sources().unwrap().is_empty());
        assert_eq!(suite.query_binaries().unwrap().len(), 2);
    }

    #[test]
    fn test_cached_scan_without_refresh_skips_download() {
        let archive = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        write_archive(archive.path(), true);

        let suite = DebianSuite::new(definition(archive.path()), cache.path());
        suite.scan(true).unwrap();

        // Archive disappears; the cached copy still answers queries
        fs::remove_dir_all(archive.path().join("dists")).unwrap();
        suite.scan(false).unwrap();
        assert_eq!(suite.query_binaries().unwrap().len(), 2);

        let err = suite.scan(true).unwrap_err();
        assert!(matches!(err, Error::RepositoryUnavailable { .. }));

        // A failed refresh leaves the cache intact
        assert_eq!(suite.query_binaries().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_archive_is_unavailable() {
        let archive = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();

        let suite = DebianSuite::new(definition(archive.path()), cache.path());
        assert!(matches!(suite.scan(true), Err(Error::RepositoryUnavailable { .. })));
        assert!(matches!(suite.query_binaries(), Err(Error::RepositoryUnavailable { .. })));
    }
}
