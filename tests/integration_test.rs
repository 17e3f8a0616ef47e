// tests/integration_test.rs

//! Integration tests for reprepro-bundle
//!
//! These tests drive the bundle workflows end-to-end: suites are scanned,
//! control files are written to a temporary project directory and read back.

use flate2::Compression;
use flate2::write::GzEncoder;
use proptest::prelude::*;
use reprepro_bundle::Error;
use reprepro_bundle::blacklist;
use reprepro_bundle::bundle::Bundle;
use reprepro_bundle::config::CatalogConfig;
use reprepro_bundle::control::{ControlList, Reconciler, UpdateParams, format};
use reprepro_bundle::repository::{DebianSuite, MemorySuite, SuiteQuery};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const OWN: &str = "bundle:noble/0001";
const SUPPLIER: &str = "ubuntu:noble-updates";

fn catalog() -> CatalogConfig {
    CatalogConfig::from_json(
        r#"{ "suites": [
            { "name": "bundle:noble/0001", "url": "file:///srv/repo/bundle", "distribution": "noble/0001" },
            { "name": "ubuntu:noble-updates", "url": "file:///srv/ubuntu", "distribution": "noble-updates" }
        ] }"#,
    )
    .unwrap()
}

fn setup_bundle() -> (TempDir, Bundle) {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = Bundle::open("noble/1", dir.path()).unwrap();
    fs::create_dir_all(bundle.conf_dir()).unwrap();
    bundle.set_own_suite("bundle:{bundle}", &catalog()).unwrap();
    (dir, bundle)
}

fn names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn read_scl(bundle: &Bundle) -> String {
    fs::read_to_string(bundle.sources_control_file()).unwrap()
}

#[test]
fn test_own_version_kept_and_upgrade_offered() {
    let (_dir, bundle) = setup_bundle();
    let own = MemorySuite::new(OWN).with_binary("foo", "foo", "1.2").unwrap();
    let sup = MemorySuite::new(SUPPLIER).with_binary("foo", "foo", "1.3").unwrap();
    let params = UpdateParams {
        suppliers: vec![&sup as &dyn SuiteQuery],
        references: vec![&own as &dyn SuiteQuery],
        ..Default::default()
    };

    let previous = bundle.parse_sources_control_list().unwrap();
    bundle.update_sources_control_list(&params, &previous, None).unwrap();

    assert_eq!(
        read_scl(&bundle),
        "foo 1.2 bundle:noble/0001 [should-be-kept]\n\
         # foo 1.3 ubuntu:noble-updates [is-upgrade]\n"
    );
}

#[test]
fn test_user_selection_survives_update() {
    let (_dir, bundle) = setup_bundle();
    let own = MemorySuite::new(OWN).with_binary("foo", "foo", "1.2").unwrap();
    let sup = MemorySuite::new(SUPPLIER).with_binary("foo", "foo", "1.3").unwrap();
    let params = UpdateParams {
        suppliers: vec![&sup as &dyn SuiteQuery],
        references: vec![&own as &dyn SuiteQuery],
        ..Default::default()
    };

    // The user switched to the upgrade by editing the file
    fs::write(
        bundle.sources_control_file(),
        "# foo 1.2 bundle:noble/0001 [should-be-kept]\n\
         foo 1.3 ubuntu:noble-updates [is-upgrade]\n",
    )
    .unwrap();

    let previous = bundle.parse_sources_control_list().unwrap();
    let list = bundle.update_sources_control_list(&params, &previous, None).unwrap();
    assert_eq!(list.active("foo").unwrap().suite_name, SUPPLIER);
    assert_eq!(
        read_scl(&bundle),
        "# foo 1.2 bundle:noble/0001 [should-be-kept]\n\
         foo 1.3 ubuntu:noble-updates [is-upgrade]\n"
    );
}

#[test]
fn test_missing_source_added_from_supplier() {
    let (_dir, bundle) = setup_bundle();
    let own = MemorySuite::new(OWN).with_binary("foo", "foo", "1.2").unwrap();
    let sup = MemorySuite::new(SUPPLIER)
        .with_binary("bar", "bar", "0.5")
        .unwrap()
        .with_binary("qux", "qux", "2.0")
        .unwrap();
    let params = UpdateParams {
        suppliers: vec![&sup as &dyn SuiteQuery],
        references: vec![&own as &dyn SuiteQuery],
        add_from: names(&[SUPPLIER]),
        ..Default::default()
    };

    let list = bundle
        .update_sources_control_list(&params, &ControlList::new(), None)
        .unwrap();
    assert_eq!(list.active("bar").unwrap().suite_name, SUPPLIER);
    assert_eq!(list.active("qux").unwrap().suite_name, SUPPLIER);
    assert_eq!(
        read_scl(&bundle),
        "bar 0.5 ubuntu:noble-updates [is-missing]\n\
         \n\
         foo 1.2 bundle:noble/0001 [should-be-kept]\n\
         \n\
         qux 2.0 ubuntu:noble-updates [is-missing]\n"
    );
}

#[test]
fn test_blacklist_update() {
    let (_dir, bundle) = setup_bundle();
    fs::write(bundle.blacklist_file(), "pkgX purge\n").unwrap();
    let own = MemorySuite::new(OWN)
        .with_binary("pkgX", "x", "1.0")
        .unwrap()
        .with_binary("pkgY", "y", "1.0")
        .unwrap();

    let already = bundle.parse_blacklist().unwrap();
    let result = bundle
        .update_blacklist(Some(&own as &dyn SuiteQuery), &already, false, None)
        .unwrap();
    assert_eq!(result.active(), &names(&["pkgX"]));
    assert_eq!(result.proposed(), &names(&["pkgY"]));
    assert_eq!(
        fs::read_to_string(bundle.blacklist_file()).unwrap(),
        format!("pkgX purge\n\n{}\n# pkgY purge\n", blacklist::separator())
    );
}

#[test]
fn test_highlighted_sources_come_first() {
    let (_dir, bundle) = setup_bundle();
    let own = MemorySuite::new(OWN).with_binary("zed", "zed", "1.0").unwrap();
    let sup = MemorySuite::new(SUPPLIER)
        .with_binary("alpha", "alpha", "1.0")
        .unwrap()
        .with_binary("zed", "zed", "1.1")
        .unwrap();
    let params = UpdateParams {
        suppliers: vec![&sup as &dyn SuiteQuery],
        references: vec![&own as &dyn SuiteQuery],
        ..Default::default()
    };

    bundle
        .update_sources_control_list(&params, &ControlList::new(), Some("# CANCELED"))
        .unwrap();
    assert_eq!(
        read_scl(&bundle),
        format!(
            "# CANCELED\n\
             zed 1.0 bundle:noble/0001 [should-be-kept]\n\
             # zed 1.1 ubuntu:noble-updates [is-upgrade]\n\
             \n\
             {}\n\
             \n\
             # alpha 1.0 ubuntu:noble-updates [is-missing]\n",
            format::separator()
        )
    );
}

#[test]
fn test_update_is_idempotent_through_files() {
    let (_dir, bundle) = setup_bundle();
    let own = MemorySuite::new(OWN)
        .with_binary("foo", "foo", "1.2")
        .unwrap()
        .with_binary("libfoo1", "foo", "1.2")
        .unwrap();
    let sup = MemorySuite::new(SUPPLIER)
        .with_binary("foo", "foo", "1.3")
        .unwrap()
        .with_binary("bar", "bar", "0.5")
        .unwrap()
        .with_source("baz", "3.0")
        .unwrap();
    let params = UpdateParams {
        suppliers: vec![&sup as &dyn SuiteQuery],
        references: vec![&own as &dyn SuiteQuery],
        upgrade_from: names(&[SUPPLIER]),
        ..Default::default()
    };

    let previous = bundle.parse_sources_control_list().unwrap();
    bundle.update_sources_control_list(&params, &previous, None).unwrap();
    let first = read_scl(&bundle);

    let previous = bundle.parse_sources_control_list().unwrap();
    bundle.update_sources_control_list(&params, &previous, None).unwrap();
    assert_eq!(read_scl(&bundle), first);
    assert!(first.contains("# baz 3.0 ubuntu:noble-updates [info]\n"));
}

#[test]
fn test_unavailable_suite_leaves_files_untouched() {
    let (_dir, bundle) = setup_bundle();
    fs::write(bundle.sources_control_file(), "foo 1.2 bundle:noble/0001 [should-be-kept]\n").unwrap();
    let own = MemorySuite::unavailable(OWN);
    let params = UpdateParams {
        references: vec![&own as &dyn SuiteQuery],
        ..Default::default()
    };

    let previous = bundle.parse_sources_control_list().unwrap();
    let err = bundle
        .update_sources_control_list(&params, &previous, None)
        .unwrap_err();
    assert!(matches!(err, Error::RepositoryUnavailable { .. }));
    assert_eq!(read_scl(&bundle), "foo 1.2 bundle:noble/0001 [should-be-kept]\n");
}

fn write_gz(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    fs::write(path, encoder.finish().unwrap()).unwrap();
}

#[test]
fn test_debian_archive_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("archive");
    write_gz(
        &archive.join("dists/noble/main/binary-amd64/Packages.gz"),
        "Package: foo\nVersion: 1.3-1\nArchitecture: amd64\n\n\
         Package: libfoo1\nSource: foo (1.3-1)\nVersion: 1.3-1build1\nArchitecture: amd64\n",
    );
    write_gz(
        &archive.join("dists/noble/main/source/Sources.gz"),
        "Package: foo\nVersion: 1.3-1\n\nPackage: docs\nVersion: 0.1\n",
    );

    let catalog = CatalogConfig::from_json(&format!(
        r#"{{ "cache_dir": "cache", "suites": [
            {{ "name": "ubuntu:noble", "url": "{}", "distribution": "noble" }}
        ] }}"#,
        archive.display()
    ))
    .unwrap();
    let definition = catalog.select("ubuntu:").into_iter().next().unwrap().clone();
    let suite = DebianSuite::new(definition, &catalog.cache_dir(dir.path()));
    let own = MemorySuite::new(OWN).with_binary("foo", "foo", "1.2-1").unwrap();
    let params = UpdateParams {
        suppliers: vec![&suite as &dyn SuiteQuery],
        references: vec![&own as &dyn SuiteQuery],
        upgrade_from: names(&["ubuntu:noble"]),
        refresh: true,
        ..Default::default()
    };

    let list = Reconciler::new(Some(OWN.to_string()))
        .update(&params, &ControlList::new())
        .unwrap();
    let text = format::serialize(&list, None);
    assert_eq!(
        text,
        format!(
            "# foo 1.2-1 bundle:noble/0001 [should-be-kept]\n\
             foo 1.3-1 ubuntu:noble [is-upgrade]\n\
             \n\
             {}\n\
             \n\
             # docs 0.1 ubuntu:noble [info]\n",
            format::separator()
        )
    );
    assert!(dir.path().join("cache").is_dir());
}

const SUITES: [&str; 3] = [OWN, "ubuntu:noble", SUPPLIER];
const SOURCES: [&str; 3] = ["bar", "baz", "foo"];
const VERSIONS: [&str; 4] = ["1.0", "1.1", "2.0~rc1", "1:0.9"];

fn memory_suites(entries: &[(usize, usize, usize)]) -> Vec<MemorySuite> {
    SUITES
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            entries
                .iter()
                .filter(|(suite, _, _)| *suite == idx)
                .fold(MemorySuite::new(name), |suite, &(_, source, version)| {
                    suite
                        .with_binary(
                            &format!("{}-bin", SOURCES[source]),
                            SOURCES[source],
                            VERSIONS[version],
                        )
                        .unwrap()
                })
        })
        .collect()
}

fn selected(flags: &[bool]) -> BTreeSet<String> {
    SUITES
        .iter()
        .zip(flags)
        .filter(|&(_, flag)| *flag)
        .map(|(name, _)| name.to_string())
        .collect()
}

fn active_set(list: &ControlList) -> Vec<(String, String, String)> {
    list.active_records()
        .map(|r| (r.source_name.clone(), r.suite_name.clone(), r.version.to_string()))
        .collect()
}

proptest! {
    #[test]
    fn prop_update_is_idempotent_and_round_trips(
        entries in prop::collection::vec((0..3usize, 0..3usize, 0..4usize), 0..12),
        add_from in prop::collection::vec(any::<bool>(), 3),
        upgrade_from in prop::collection::vec(any::<bool>(), 3),
        highlighted in prop::collection::vec(any::<bool>(), 3),
    ) {
        let suites = memory_suites(&entries);
        let params = UpdateParams {
            suppliers: suites[1..].iter().map(|s| s as &dyn SuiteQuery).collect(),
            references: vec![&suites[0] as &dyn SuiteQuery],
            highlighted_suites: selected(&highlighted),
            add_from: selected(&add_from),
            upgrade_from: selected(&upgrade_from),
            refresh: false,
        };
        let reconciler = Reconciler::new(Some(OWN.to_string()));

        let first = reconciler.update(&params, &ControlList::new()).unwrap();
        for (name, records) in first.sources() {
            prop_assert!(records.iter().filter(|r| r.active).count() <= 1, "{} has several active records", name);
        }

        let text = format::serialize(&first, None);
        let parsed = format::parse(&text);
        prop_assert_eq!(active_set(&parsed), active_set(&first));

        let second = reconciler.update(&params, &parsed).unwrap();
        prop_assert_eq!(format::serialize(&second, None), text);
    }
}
