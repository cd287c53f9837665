//! The index traits and the [`Catalog`] transaction boundary.
//!
//! The reference index and the release index are logically separate tables,
//! but every mutation that touches both must commit or roll back as one. A
//! [`Catalog`] owns both tables and hands out a transaction handle that
//! implements both traits; nothing outside a transaction can mutate them.

use std::collections::{BTreeMap, BTreeSet};

use depot_types::{
    ContentHash, PageWindow, ProjectSummary, ReferenceString, ReleaseId, ReleaseKey,
    ReleaseManifest, StoredRelease,
};

use crate::error::{IndexError, IndexResult};

/// Hash → list of reference strings currently using it.
pub type ReferenceMap = BTreeMap<ContentHash, Vec<ReferenceString>>;

/// Maps each content hash to the locations that depend on it.
///
/// A reference string must appear under at most one hash. That invariant is
/// maintained by callers; this table only stores what it is given.
pub trait ReferenceIndex {
    /// Current reference lists for `hashes`. Hashes without an entry are
    /// absent from the result (not present with an empty list).
    fn query(&self, hashes: &BTreeSet<ContentHash>) -> IndexResult<ReferenceMap>;

    /// The subset of `hashes` that have an entry, even an empty one.
    fn find_existing(&self, hashes: &BTreeSet<ContentHash>) -> IndexResult<BTreeSet<ContentHash>>;

    /// Replace each given hash's full reference list. Last writer wins per
    /// hash; callers merge explicitly.
    fn upsert(&mut self, entries: &ReferenceMap) -> IndexResult<()>;
}

/// Durable table of release manifests.
///
/// Uniqueness of `(owner, project, revision)` is not enforced here; callers
/// delete prior rows before inserting.
pub trait ReleaseIndex {
    /// All rows for `key`, ordered by insertion id ascending.
    fn find_exact(&self, key: &ReleaseKey) -> IndexResult<Vec<StoredRelease>>;

    /// Append a new row and return its id.
    fn insert(&mut self, manifest: &ReleaseManifest) -> IndexResult<ReleaseId>;

    /// Delete rows by id, returning how many existed.
    fn delete_by_ids(&mut self, ids: &[ReleaseId]) -> IndexResult<usize>;

    /// Distinct owners, sorted.
    fn list_owners(&self) -> IndexResult<Vec<String>>;

    /// Number of distinct `(owner, project)` pairs, optionally for one owner.
    fn count_projects(&self, owner: Option<&str>) -> IndexResult<u64>;

    /// One summary per `(owner, project)` pair (its newest row), newest first.
    fn list_projects(
        &self,
        owner: Option<&str>,
        window: PageWindow,
    ) -> IndexResult<Vec<ProjectSummary>>;

    /// Number of rows for `(owner, project)` across all revisions.
    fn count_commits(&self, owner: &str, project: &str) -> IndexResult<u64>;

    /// Rows for `(owner, project)`, newest first.
    fn list_commits(
        &self,
        owner: &str,
        project: &str,
        window: PageWindow,
    ) -> IndexResult<Vec<StoredRelease>>;
}

/// Owner of the reference and release tables.
///
/// `read` runs `f` against a consistent snapshot. `write` runs `f` inside a
/// serialized transaction that commits only if `f` returns `Ok`; on `Err`
/// (or a panic) nothing `f` did is visible to anyone.
pub trait Catalog: Send + Sync {
    type Tx: ReferenceIndex + ReleaseIndex;

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self::Tx) -> Result<T, E>,
        E: From<IndexError>;

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T, E>,
        E: From<IndexError>;
}
