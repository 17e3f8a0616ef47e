// src/control/format.rs

//! The `sources_control.list` text format
//!
//! Every record is one line `<source> <version> <suite> [<status>]`. The active
//! record of a source is written as is, all other records are commented out
//! with `# `. Records of one source form a block; blocks are separated by a
//! blank line. Highlighted sources come first, followed by a separator line
//! and the remaining sources, both groups sorted by name.
//!
//! ```text
//! foo 1.2-1 bundle:noble/0001 [should-be-kept]
//! # foo 1.3-1 ubuntu:noble-updates [is-upgrade]
//!
//! #================================================================================
//!
//! # bar 0.5 ubuntu:noble-updates [is-missing]
//! ```

use super::reconcile::mark_active;
use super::{ControlList, PackageRecord, Status};
use crate::error::{Error, Result};
use crate::version::DebianVersion;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Prefix of inactive record lines
const COMMENT: &str = "# ";

/// Line between highlighted and remaining sources
pub fn separator() -> String {
    format!("#{}", "=".repeat(80))
}

/// Render a single record as one line
pub fn format_record(record: &PackageRecord) -> String {
    let line = format!(
        "{} {} {} [{}]",
        record.source_name, record.version, record.suite_name, record.status
    );
    if record.active {
        line
    } else {
        format!("{}{}", COMMENT, line)
    }
}

/// Parse a single record line, commented or not
pub fn parse_record(line: &str) -> Result<PackageRecord> {
    let trimmed = line.trim();
    let (active, body) = match trimmed.strip_prefix('#') {
        Some(rest) => (false, rest.trim_start()),
        None => (true, trimmed),
    };

    let fields: Vec<&str> = body.split_whitespace().collect();
    let [source, version, suite, status] = fields.as_slice() else {
        return Err(Error::ParseError(format!(
            "expected '<source> <version> <suite> [<status>]', got '{}'",
            trimmed
        )));
    };
    let status = status
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::ParseError(format!("missing status in '{}'", trimmed)))?
        .parse::<Status>()
        .map_err(Error::ParseError)?;

    let mut record = PackageRecord::new(
        source.to_string(),
        suite.to_string(),
        DebianVersion::parse(version)?,
    );
    record.status = status;
    record.active = active;
    Ok(record)
}

/// Render the whole control list
///
/// `leading_remark` (e.g. a cancellation notice) is written verbatim as the
/// first line.
pub fn serialize(list: &ControlList, leading_remark: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(remark) = leading_remark {
        out.push_str(remark);
        out.push('\n');
    }

    let (highlighted, rest): (Vec<_>, Vec<_>) = list
        .sources()
        .filter(|(_, records)| !records.is_empty())
        .partition(|(name, _)| list.is_highlighted(name));

    let mut first = true;
    let mut write_group = |out: &mut String, records: &BTreeSet<PackageRecord>| {
        if !first {
            out.push('\n');
        }
        first = false;
        for record in records {
            out.push_str(&format_record(record));
            out.push('\n');
        }
    };

    for &(_, records) in &highlighted {
        write_group(&mut out, records);
    }
    if !highlighted.is_empty() && !rest.is_empty() {
        out.push('\n');
        out.push_str(&separator());
        out.push('\n');
    }
    for &(_, records) in &rest {
        write_group(&mut out, records);
    }
    out
}

/// Parse a control list, keeping only its active, non-informational records
///
/// Comment lines and blank lines are ignored; malformed lines are logged and
/// skipped. If several lines of one source are active, the last one wins and
/// the others are kept as inactive candidates.
pub fn parse(text: &str) -> ControlList {
    let mut by_source: BTreeMap<String, Vec<PackageRecord>> = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_record(line) {
            Ok(record) if record.status.is_info() => {}
            Ok(record) => by_source
                .entry(record.source_name.clone())
                .or_default()
                .push(record),
            Err(e) => warn!("Ignoring invalid line {} in sources control list: {}", lineno + 1, e),
        }
    }

    let none = BTreeSet::new();
    let mut list = ControlList::new();
    for (name, mut records) in by_source {
        records.sort();
        records.dedup();
        mark_active(&mut records, |_| true, &none, &none);
        list.set_records(&name, records);
    }
    list
}

/// Parse and rewrite a control list, dropping everything but active lines
pub fn normalize(text: &str) -> String {
    serialize(&parse(text), None)
}
