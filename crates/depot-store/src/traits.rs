use std::collections::BTreeSet;

use depot_types::ContentHash;

use crate::error::{StoreError, StoreResult};

/// Hash-keyed object store.
///
/// All implementations must satisfy these invariants:
/// - Content under a hash never changes once written; `put` of an existing
///   hash succeeds without touching the stored bytes.
/// - Concurrent `put` of the same hash with identical bytes is safe without
///   external locking. Different bytes under one hash is caller error.
/// - The store never interprets object contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    fn exists(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Store `bytes` under `hash`.
    ///
    /// Returns `true` if the object was written, `false` if it was already
    /// present.
    fn put(&self, hash: &ContentHash, bytes: &[u8]) -> StoreResult<bool>;

    /// Read an object's bytes. Returns `Ok(None)` if it does not exist.
    fn get(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>>;

    /// The subset of `hashes` currently stored.
    ///
    /// Default implementation calls `exists()` for each hash.
    fn exists_batch(&self, hashes: &BTreeSet<ContentHash>) -> StoreResult<BTreeSet<ContentHash>> {
        let mut present = BTreeSet::new();
        for hash in hashes {
            if self.exists(hash)? {
                present.insert(hash.clone());
            }
        }
        Ok(present)
    }

    /// Like [`get`](Self::get) but absence is an error.
    fn fetch(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.get(hash)?
            .ok_or_else(|| StoreError::NotFound(hash.clone()))
    }
}
