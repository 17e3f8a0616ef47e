// src/control/status.rs

//! Status classification of package variants

use super::{PackageRecord, Status};
use std::cmp::Ordering;

/// Classify `record` relative to the bundle's `reference` variant
///
/// Without a reference the source isn't shipped by the bundle or any reference
/// suite yet, so every variant is `IsMissing`.
pub fn classify(record: &PackageRecord, reference: Option<&PackageRecord>) -> Status {
    match reference {
        None => Status::IsMissing,
        Some(reference) => match record.version.cmp(&reference.version) {
            Ordering::Equal => Status::IsCurrent,
            Ordering::Greater => Status::IsUpgrade,
            Ordering::Less => Status::IsDowngrade,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::DebianVersion;

    fn record(suite: &str, version: &str) -> PackageRecord {
        PackageRecord::new(
            "foo".to_string(),
            suite.to_string(),
            DebianVersion::parse(version).unwrap(),
        )
    }

    #[test]
    fn test_classify_against_reference() {
        let reference = record("ref", "1.2-1");
        assert_eq!(classify(&record("sup", "1.2-1"), Some(&reference)), Status::IsCurrent);
        assert_eq!(classify(&record("sup", "1.3-1"), Some(&reference)), Status::IsUpgrade);
        assert_eq!(classify(&record("sup", "1.2~rc1-1"), Some(&reference)), Status::IsDowngrade);
        assert_eq!(classify(&reference, Some(&reference)), Status::IsCurrent);
    }

    #[test]
    fn test_classify_uses_debian_ordering() {
        let reference = record("ref", "1.9");
        assert_eq!(classify(&record("sup", "1.10"), Some(&reference)), Status::IsUpgrade);
        assert_eq!(classify(&record("sup", "1.09"), Some(&reference)), Status::IsCurrent);
    }

    #[test]
    fn test_classify_without_reference() {
        assert_eq!(classify(&record("sup", "1.0"), None), Status::IsMissing);
    }
}
