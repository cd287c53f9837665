//! Behaviour shared by every [`Catalog`] backend, run by each backend's tests.

use std::collections::BTreeSet;

use depot_types::{
    parse_timestamp, ContentHash, FileMap, PageWindow, ProjectMetadata, ReferenceString, ReleaseId,
    ReleaseKey, ReleaseManifest,
};

use crate::error::IndexError;
use crate::traits::{Catalog, ReferenceIndex, ReferenceMap, ReleaseIndex};

fn h(s: &str) -> ContentHash {
    ContentHash::new(s).unwrap()
}

fn r(s: &str) -> ReferenceString {
    ReferenceString::from(s.to_string())
}

fn hashes(names: &[&str]) -> BTreeSet<ContentHash> {
    names.iter().map(|n| h(n)).collect()
}

pub(crate) fn manifest(
    owner: &str,
    project: &str,
    revision: &str,
    time: &str,
    files: &[(&str, &str)],
) -> ReleaseManifest {
    let files: FileMap = files
        .iter()
        .map(|(path, hash)| (path.to_string(), h(hash)))
        .collect();
    ReleaseManifest {
        key: ReleaseKey::new(owner, project, revision).unwrap(),
        author: owner.to_string(),
        files,
        metadata: ProjectMetadata::default(),
        time: parse_timestamp(time).unwrap(),
    }
}

pub(crate) fn insert<C: Catalog>(
    catalog: &C,
    owner: &str,
    project: &str,
    revision: &str,
    time: &str,
) -> ReleaseId {
    let manifest = manifest(owner, project, revision, time, &[]);
    catalog.write(|tx| tx.insert(&manifest)).unwrap()
}

pub(crate) fn references_roundtrip<C: Catalog>(catalog: &C) {
    let entries: ReferenceMap = [
        (h("h1"), vec![r("bob/app/rev1/a.txt")]),
        (h("h2"), Vec::new()),
    ]
    .into_iter()
    .collect();
    catalog.write(|tx| tx.upsert(&entries)).unwrap();

    let asked = hashes(&["h1", "h2", "h3"]);
    let found = catalog.read(|tx| tx.query(&asked)).unwrap();
    assert_eq!(found, entries);

    let existing = catalog.read(|tx| tx.find_existing(&asked)).unwrap();
    assert_eq!(existing, hashes(&["h1", "h2"]));
}

pub(crate) fn upsert_replaces_whole_list<C: Catalog>(catalog: &C) {
    let first: ReferenceMap = [(h("h1"), vec![r("a"), r("b")])].into_iter().collect();
    let second: ReferenceMap = [(h("h1"), vec![r("c")])].into_iter().collect();
    catalog.write(|tx| tx.upsert(&first)).unwrap();
    catalog.write(|tx| tx.upsert(&second)).unwrap();

    let found = catalog.read(|tx| tx.query(&hashes(&["h1"]))).unwrap();
    assert_eq!(found[&h("h1")], vec![r("c")]);
}

pub(crate) fn find_exact_orders_by_insertion<C: Catalog>(catalog: &C) {
    let first = insert(catalog, "bob", "app", "rev1", "2024-01-02T00:00:00");
    insert(catalog, "bob", "app", "rev2", "2024-01-03T00:00:00");
    let second = insert(catalog, "bob", "app", "rev1", "2024-01-01T00:00:00");

    let key = ReleaseKey::new("bob", "app", "rev1").unwrap();
    let rows = catalog.read(|tx| tx.find_exact(&key)).unwrap();
    let ids: Vec<ReleaseId> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert!(first < second);
    assert!(rows.iter().all(|row| row.manifest.key == key));
}

pub(crate) fn delete_by_ids_counts_existing<C: Catalog>(catalog: &C) {
    let doomed = insert(catalog, "bob", "app", "rev1", "2024-01-01T00:00:00");
    insert(catalog, "bob", "app", "rev2", "2024-01-02T00:00:00");

    let deleted = catalog
        .write(|tx| tx.delete_by_ids(&[doomed, ReleaseId(9_999)]))
        .unwrap();
    assert_eq!(deleted, 1);

    let count = catalog.read(|tx| tx.count_commits("bob", "app")).unwrap();
    assert_eq!(count, 1);
    let again = catalog.write(|tx| tx.delete_by_ids(&[doomed])).unwrap();
    assert_eq!(again, 0);
}

pub(crate) fn owners_are_sorted_and_distinct<C: Catalog>(catalog: &C) {
    insert(catalog, "carol", "x", "r1", "2024-01-01T00:00:00");
    insert(catalog, "alice", "y", "r1", "2024-01-02T00:00:00");
    insert(catalog, "bob", "z", "r1", "2024-01-03T00:00:00");
    insert(catalog, "alice", "w", "r1", "2024-01-04T00:00:00");

    let owners = catalog.read(|tx| tx.list_owners()).unwrap();
    assert_eq!(owners, vec!["alice", "bob", "carol"]);
}

pub(crate) fn projects_show_latest_revision<C: Catalog>(catalog: &C) {
    insert(catalog, "alice", "tool", "v1", "2023-12-31T00:00:00");
    insert(catalog, "bob", "app", "rev1", "2024-01-01T00:00:00");
    insert(catalog, "bob", "lib", "rev1", "2024-01-02T00:00:00");
    insert(catalog, "bob", "app", "rev2", "2024-01-03T00:00:00");

    let all = catalog
        .read(|tx| tx.list_projects(None, PageWindow::new(0, 20)))
        .unwrap();
    let seen: Vec<(&str, &str, &str)> = all
        .iter()
        .map(|s| (s.owner.as_str(), s.project.as_str(), s.revision.as_str()))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("bob", "app", "rev2"),
            ("bob", "lib", "rev1"),
            ("alice", "tool", "v1"),
        ]
    );

    assert_eq!(catalog.read(|tx| tx.count_projects(None)).unwrap(), 3);
    assert_eq!(catalog.read(|tx| tx.count_projects(Some("bob"))).unwrap(), 2);
    assert_eq!(catalog.read(|tx| tx.count_projects(Some("dave"))).unwrap(), 0);

    let second = catalog
        .read(|tx| tx.list_projects(Some("bob"), PageWindow::new(1, 1)))
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].project, "lib");
}

pub(crate) fn commits_paginate_newest_first<C: Catalog>(catalog: &C) {
    for i in 0..25 {
        insert(
            catalog,
            "bob",
            "app",
            &format!("rev{i}"),
            &format!("2024-01-01T00:00:{i:02}"),
        );
    }
    insert(catalog, "bob", "other", "rev0", "2024-02-01T00:00:00");

    assert_eq!(catalog.read(|tx| tx.count_commits("bob", "app")).unwrap(), 25);

    let first = catalog
        .read(|tx| tx.list_commits("bob", "app", PageWindow::new(0, 20)))
        .unwrap();
    assert_eq!(first.len(), 20);
    assert_eq!(first[0].manifest.key.revision, "rev24");
    assert!(first
        .windows(2)
        .all(|pair| pair[0].manifest.time >= pair[1].manifest.time));

    let rest = catalog
        .read(|tx| tx.list_commits("bob", "app", PageWindow::new(20, 20)))
        .unwrap();
    assert_eq!(rest.len(), 5);
    assert_eq!(rest[4].manifest.key.revision, "rev0");
}

pub(crate) fn failed_write_rolls_back<C: Catalog>(catalog: &C) {
    let manifest = manifest(
        "bob",
        "app",
        "rev1",
        "2024-01-01T00:00:00",
        &[("a.txt", "h1")],
    );
    let result: Result<(), IndexError> = catalog.write(|tx| {
        tx.insert(&manifest)?;
        tx.upsert(&manifest.references_by_hash())?;
        Err(IndexError::Corrupt("abort".into()))
    });
    assert!(result.is_err());

    let rows = catalog.read(|tx| tx.find_exact(&manifest.key)).unwrap();
    assert!(rows.is_empty());
    let refs = catalog.read(|tx| tx.query(&hashes(&["h1"]))).unwrap();
    assert!(refs.is_empty());
}
