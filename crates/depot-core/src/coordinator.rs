//! Keeps the reference index and the release index mutually consistent.
//!
//! Every mutation runs inside one catalog write transaction: validation,
//! superseding the previous manifest, reference bookkeeping and the insert
//! either all commit or none do. When the catalog reports lock contention
//! the whole transaction is retried from scratch, up to the configured
//! budget, after which the caller gets [`DepotError::ConcurrencyConflict`].

use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::Duration;

use depot_index::{Catalog, ReferenceIndex, ReleaseIndex};
use depot_types::{ContentHash, ReferenceString, ReleaseId, ReleaseKey, ReleaseManifest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{DepotError, DepotResult};

/// Result of a release submission.
///
/// A non-empty `missing` list means the submission was rejected and nothing
/// changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    /// Manifests for the same key that this submission replaced.
    pub superseded: usize,
    /// Hashes in the file map that are not stored yet.
    pub missing: Vec<ContentHash>,
}

impl SubmitOutcome {
    /// `true` when the manifest was stored, i.e. no hash was missing.
    pub fn is_committed(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Runs every mutation of the two indexes as one catalog transaction,
/// retrying lock contention.
pub struct ConsistencyCoordinator<C> {
    catalog: C,
    max_retries: u32,
    backoff: Duration,
}

impl<C: Catalog> ConsistencyCoordinator<C> {
    /// Wrap `catalog` with the retry budget from `config`.
    pub fn new(catalog: C, config: &CoordinatorConfig) -> Self {
        Self {
            catalog,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// The catalog, for read-only queries.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Submit a manifest, replacing any existing one with the same key.
    pub fn submit_release(&self, manifest: &ReleaseManifest) -> DepotResult<SubmitOutcome> {
        let outcome = self.with_retry("submit_release", || {
            self.catalog.write(|tx| submit_in_tx(tx, manifest))
        })?;

        if outcome.is_committed() {
            info!(
                release = %manifest.key,
                files = manifest.files.len(),
                superseded = outcome.superseded,
                "release committed"
            );
        } else {
            warn!(
                release = %manifest.key,
                missing = outcome.missing.len(),
                "release rejected: missing objects"
            );
        }
        Ok(outcome)
    }

    /// Delete every manifest for `key`. Returns how many were removed; an
    /// absent key yields 0.
    pub fn delete_release(&self, key: &ReleaseKey) -> DepotResult<usize> {
        let deleted = self.with_retry("delete_release", || {
            self.catalog.write(|tx| delete_in_tx(tx, key))
        })?;
        if deleted > 0 {
            info!(release = %key, deleted, "release deleted");
        }
        Ok(deleted)
    }

    /// Give `hash` an (empty) reference entry if it has none. Returns `true`
    /// if the entry was created.
    pub fn register_object(&self, hash: &ContentHash) -> DepotResult<bool> {
        self.with_retry("register_object", || {
            self.catalog.write(|tx| {
                let wanted = BTreeSet::from([hash.clone()]);
                if !tx.find_existing(&wanted)?.is_empty() {
                    return Ok(false);
                }
                let entry = BTreeMap::from([(hash.clone(), Vec::new())]);
                tx.upsert(&entry)?;
                Ok(true)
            })
        })
    }

    fn with_retry<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> DepotResult<T>,
    ) -> DepotResult<T> {
        let attempts = self.max_retries.saturating_add(1);
        for n in 1..=attempts {
            match attempt() {
                Err(err) if err.is_busy() => {
                    warn!(operation, attempt = n, error = %err, "catalog busy");
                    if n < attempts {
                        thread::sleep(self.backoff * n);
                    }
                }
                other => return other,
            }
        }
        Err(DepotError::ConcurrencyConflict {
            operation,
            attempts,
        })
    }
}

fn submit_in_tx<Tx>(tx: &mut Tx, manifest: &ReleaseManifest) -> DepotResult<SubmitOutcome>
where
    Tx: ReferenceIndex + ReleaseIndex,
{
    let wanted = manifest.hashes();
    let existing = tx.find_existing(&wanted)?;
    let missing: Vec<ContentHash> = wanted.difference(&existing).cloned().collect();
    if !missing.is_empty() {
        return Ok(SubmitOutcome {
            superseded: 0,
            missing,
        });
    }

    let superseded = delete_in_tx(tx, &manifest.key)?;

    let additions = manifest.references_by_hash();
    let mut lists = tx.query(&additions.keys().cloned().collect())?;
    for (hash, refs) in additions {
        let list = lists.entry(hash).or_default();
        for reference in refs {
            if !list.contains(&reference) {
                list.push(reference);
            }
        }
    }
    tx.upsert(&lists)?;

    let id = tx.insert(manifest)?;
    debug!(release = %manifest.key, %id, hashes = lists.len(), "manifest inserted");
    Ok(SubmitOutcome {
        superseded,
        missing: Vec::new(),
    })
}

fn delete_in_tx<Tx>(tx: &mut Tx, key: &ReleaseKey) -> DepotResult<usize>
where
    Tx: ReferenceIndex + ReleaseIndex,
{
    let rows = tx.find_exact(key)?;
    if rows.is_empty() {
        return Ok(0);
    }
    if rows.len() > 1 {
        warn!(release = %key, rows = rows.len(), "duplicate manifests for one key");
    }

    let mut withdrawn: BTreeMap<ContentHash, BTreeSet<ReferenceString>> = BTreeMap::new();
    for row in &rows {
        for (hash, refs) in row.manifest.references_by_hash() {
            withdrawn.entry(hash).or_default().extend(refs);
        }
    }

    let mut lists = tx.query(&withdrawn.keys().cloned().collect())?;
    for (hash, list) in lists.iter_mut() {
        if let Some(gone) = withdrawn.get(hash) {
            list.retain(|reference| !gone.contains(reference));
        }
    }
    tx.upsert(&lists)?;

    let ids: Vec<ReleaseId> = rows.iter().map(|row| row.id).collect();
    Ok(tx.delete_by_ids(&ids)?)
}
