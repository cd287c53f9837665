use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use depot_types::ContentHash;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

const OBJECTS_DIR: &str = "objects";
const TMP_DIR: &str = "tmp";

/// Filesystem object store.
///
/// Each object is one read-only file named by its hash, sharded by the first
/// two characters: `<root>/objects/ab/abcdef...`. Writes go to a temp file
/// under `<root>/tmp`, are fsynced, then moved into place with a no-clobber
/// rename, so a reader never observes a partially written object and a racing
/// writer of the same hash simply loses.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for dir in [root.join(OBJECTS_DIR), root.join(TMP_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        debug!(root = %root.display(), "opened object store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the object for `hash` lives (whether or not it exists).
    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        let shard = hash.as_str().get(0..2).unwrap_or("_");
        self.root.join(OBJECTS_DIR).join(shard).join(hash.as_str())
    }

    fn write_new_object(&self, hash: &ContentHash, bytes: &[u8], dest: &Path) -> StoreResult<bool> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp_dir = self.root.join(TMP_DIR);
        let mut tmp = NamedTempFile::new_in(&tmp_dir).map_err(|e| StoreError::io(&tmp_dir, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;

        let mut perms = tmp
            .as_file()
            .metadata()
            .map_err(|e| StoreError::io(tmp.path(), e))?
            .permissions();
        perms.set_readonly(true);
        tmp.as_file()
            .set_permissions(perms)
            .map_err(|e| StoreError::io(tmp.path(), e))?;

        match tmp.persist_noclobber(dest) {
            Ok(_) => {
                debug!(hash = %hash.short(), size = bytes.len(), "object stored");
                Ok(true)
            }
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(hash = %hash.short(), "object stored concurrently");
                Ok(false)
            }
            Err(err) => Err(StoreError::io(dest, err.error)),
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        let path = self.object_path(hash);
        path.try_exists().map_err(|e| StoreError::io(&path, e))
    }

    fn put(&self, hash: &ContentHash, bytes: &[u8]) -> StoreResult<bool> {
        let dest = self.object_path(hash);
        if dest.try_exists().map_err(|e| StoreError::io(&dest, e))? {
            return Ok(false);
        }
        self.write_new_object(hash, bytes, &dest)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        let path = self.object_path(hash);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}
