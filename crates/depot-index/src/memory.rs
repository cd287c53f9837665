//! In-memory catalog for tests and ephemeral use.
//!
//! [`InMemoryCatalog`] publishes its tables as an immutable `Arc` snapshot.
//! Readers clone the `Arc` and never block writers. Writers are serialized
//! by a gate mutex, mutate a copy-on-write clone, and publish it only when
//! the transaction succeeds, so an aborted write leaves no trace.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use depot_types::{
    ContentHash, PageWindow, ProjectSummary, ReleaseId, ReleaseKey, ReleaseManifest, StoredRelease,
};

use crate::error::{IndexError, IndexResult};
use crate::traits::{Catalog, ReferenceIndex, ReferenceMap, ReleaseIndex};

#[derive(Clone, Debug, Default)]
struct CatalogState {
    references: ReferenceMap,
    releases: BTreeMap<ReleaseId, ReleaseManifest>,
    last_id: i64,
}

/// An in-memory implementation of [`Catalog`]. Data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    published: RwLock<Arc<CatalogState>>,
    writer: Mutex<()>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<CatalogState> {
        Arc::clone(&self.published.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Transaction handle over one snapshot of the catalog.
#[derive(Debug)]
pub struct MemoryTx {
    state: Arc<CatalogState>,
    dirty: bool,
}

impl MemoryTx {
    fn state_mut(&mut self) -> &mut CatalogState {
        self.dirty = true;
        Arc::make_mut(&mut self.state)
    }

    /// Rows for `(owner, project)`, newest first; ties broken by later
    /// insertion first.
    fn commits_newest_first(&self, owner: &str, project: &str) -> Vec<StoredRelease> {
        let mut rows: Vec<StoredRelease> = self
            .state
            .releases
            .iter()
            .filter(|(_, m)| m.key.owner == owner && m.key.project == project)
            .map(|(id, m)| StoredRelease {
                id: *id,
                manifest: m.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.manifest
                .time
                .cmp(&a.manifest.time)
                .then(b.id.cmp(&a.id))
        });
        rows
    }

    /// Newest row of every `(owner, project)` pair, newest first.
    fn latest_per_project(&self, owner: Option<&str>) -> Vec<(ReleaseId, &ReleaseManifest)> {
        let mut latest: BTreeMap<(&str, &str), (ReleaseId, &ReleaseManifest)> = BTreeMap::new();
        for (id, manifest) in &self.state.releases {
            if owner.is_some_and(|o| o != manifest.key.owner) {
                continue;
            }
            let slot = (manifest.key.owner.as_str(), manifest.key.project.as_str());
            let newer = match latest.get(&slot) {
                Some((best_id, best)) => (manifest.time, *id) > (best.time, *best_id),
                None => true,
            };
            if newer {
                latest.insert(slot, (*id, manifest));
            }
        }
        let mut rows: Vec<_> = latest.into_values().collect();
        rows.sort_by(|(a_id, a), (b_id, b)| b.time.cmp(&a.time).then(b_id.cmp(a_id)));
        rows
    }
}

impl ReferenceIndex for MemoryTx {
    fn query(&self, hashes: &BTreeSet<ContentHash>) -> IndexResult<ReferenceMap> {
        Ok(hashes
            .iter()
            .filter_map(|h| {
                self.state
                    .references
                    .get(h)
                    .map(|refs| (h.clone(), refs.clone()))
            })
            .collect())
    }

    fn find_existing(&self, hashes: &BTreeSet<ContentHash>) -> IndexResult<BTreeSet<ContentHash>> {
        Ok(hashes
            .iter()
            .filter(|h| self.state.references.contains_key(*h))
            .cloned()
            .collect())
    }

    fn upsert(&mut self, entries: &ReferenceMap) -> IndexResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let state = self.state_mut();
        for (hash, refs) in entries {
            state.references.insert(hash.clone(), refs.clone());
        }
        Ok(())
    }
}

impl ReleaseIndex for MemoryTx {
    fn find_exact(&self, key: &ReleaseKey) -> IndexResult<Vec<StoredRelease>> {
        Ok(self
            .state
            .releases
            .iter()
            .filter(|(_, m)| &m.key == key)
            .map(|(id, m)| StoredRelease {
                id: *id,
                manifest: m.clone(),
            })
            .collect())
    }

    fn insert(&mut self, manifest: &ReleaseManifest) -> IndexResult<ReleaseId> {
        let state = self.state_mut();
        state.last_id += 1;
        let id = ReleaseId(state.last_id);
        state.releases.insert(id, manifest.clone());
        Ok(id)
    }

    fn delete_by_ids(&mut self, ids: &[ReleaseId]) -> IndexResult<usize> {
        if !ids.iter().any(|id| self.state.releases.contains_key(id)) {
            return Ok(0);
        }
        let state = self.state_mut();
        Ok(ids
            .iter()
            .filter(|id| state.releases.remove(*id).is_some())
            .count())
    }

    fn list_owners(&self) -> IndexResult<Vec<String>> {
        let owners: BTreeSet<&str> = self
            .state
            .releases
            .values()
            .map(|m| m.key.owner.as_str())
            .collect();
        Ok(owners.into_iter().map(str::to_string).collect())
    }

    fn count_projects(&self, owner: Option<&str>) -> IndexResult<u64> {
        let pairs: BTreeSet<(&str, &str)> = self
            .state
            .releases
            .values()
            .filter(|m| owner.map_or(true, |o| o == m.key.owner))
            .map(|m| (m.key.owner.as_str(), m.key.project.as_str()))
            .collect();
        Ok(pairs.len() as u64)
    }

    fn list_projects(
        &self,
        owner: Option<&str>,
        window: PageWindow,
    ) -> IndexResult<Vec<ProjectSummary>> {
        Ok(window.slice(
            self.latest_per_project(owner)
                .into_iter()
                .map(|(_, m)| m.summary()),
        ))
    }

    fn count_commits(&self, owner: &str, project: &str) -> IndexResult<u64> {
        Ok(self
            .state
            .releases
            .values()
            .filter(|m| m.key.owner == owner && m.key.project == project)
            .count() as u64)
    }

    fn list_commits(
        &self,
        owner: &str,
        project: &str,
        window: PageWindow,
    ) -> IndexResult<Vec<StoredRelease>> {
        Ok(window.slice(self.commits_newest_first(owner, project)))
    }
}

impl Catalog for InMemoryCatalog {
    type Tx = MemoryTx;

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&MemoryTx) -> Result<T, E>,
        E: From<IndexError>,
    {
        let tx = MemoryTx {
            state: self.snapshot(),
            dirty: false,
        };
        f(&tx)
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut MemoryTx) -> Result<T, E>,
        E: From<IndexError>,
    {
        let _gate = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tx = MemoryTx {
            state: self.snapshot(),
            dirty: false,
        };
        let out = f(&mut tx)?;
        if tx.dirty {
            *self.published.write().unwrap_or_else(PoisonError::into_inner) = tx.state;
        }
        Ok(out)
    }
}
