use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use depot_types::ContentHash;

use crate::error::StoreResult;
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Objects are held behind a `RwLock`;
/// a poisoned lock is recovered since stored entries are never mutated.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.contains_key(hash))
    }

    fn put(&self, hash: &ContentHash, bytes: &[u8]) -> StoreResult<bool> {
        let mut map = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(hash) {
            return Ok(false);
        }
        map.insert(hash.clone(), bytes.to_vec());
        Ok(true)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(hash).cloned())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
