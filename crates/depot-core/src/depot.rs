use std::collections::BTreeSet;
use std::sync::Arc;

use depot_index::{
    Catalog, InMemoryCatalog, ReferenceIndex, ReferenceMap, ReleaseIndex, SqliteCatalog,
};
use depot_store::{FsObjectStore, InMemoryObjectStore, ObjectStore};
use depot_types::{
    validate_file_path, ContentHash, Page, PageRequest, ProjectSummary, ReleaseKey,
    ReleaseSubmission, StoredRelease,
};
use tracing::{debug, info};

use crate::config::{CoordinatorConfig, DepotConfig};
use crate::coordinator::{ConsistencyCoordinator, SubmitOutcome};
use crate::error::{DepotError, DepotResult};

/// The artifact store: object bytes plus the catalog that tracks which
/// releases use them.
///
/// All methods block on I/O. The handle is `Send + Sync`; share it behind an
/// `Arc` and call it from as many threads as needed.
pub struct Depot<C> {
    objects: Arc<dyn ObjectStore>,
    coordinator: ConsistencyCoordinator<C>,
}

impl Depot<SqliteCatalog> {
    /// Open the on-disk store described by `config.storage`.
    pub fn open(config: &DepotConfig) -> DepotResult<Self> {
        let storage = &config.storage;
        let objects = FsObjectStore::open(&storage.data_dir)?;
        let catalog = SqliteCatalog::open(storage.catalog_path(), storage.busy_timeout())?;
        info!(data_dir = %storage.data_dir.display(), "depot opened");
        Ok(Self::new(Arc::new(objects), catalog, &config.coordinator))
    }
}

impl Depot<InMemoryCatalog> {
    /// A depot that lives only in memory. Nothing survives a drop.
    pub fn in_memory(config: &CoordinatorConfig) -> Self {
        Self::new(
            Arc::new(InMemoryObjectStore::new()),
            InMemoryCatalog::new(),
            config,
        )
    }
}

impl<C: Catalog> Depot<C> {
    /// Assemble a depot from an object store and a catalog.
    pub fn new(objects: Arc<dyn ObjectStore>, catalog: C, config: &CoordinatorConfig) -> Self {
        Self {
            objects,
            coordinator: ConsistencyCoordinator::new(catalog, config),
        }
    }

    /// Which of `hashes` are already uploaded.
    pub fn check_hashes(&self, hashes: &BTreeSet<ContentHash>) -> DepotResult<BTreeSet<ContentHash>> {
        self.catalog().read(|tx| tx.find_existing(hashes).map_err(Into::into))
    }

    /// Store `bytes` under `hash`, then register the hash in the reference
    /// index. Returns `true` if the bytes were newly written.
    pub fn store_object(&self, hash: &ContentHash, bytes: &[u8]) -> DepotResult<bool> {
        let written = self.objects.put(hash, bytes)?;
        self.coordinator.register_object(hash)?;
        debug!(hash = %hash.short(), size = bytes.len(), written, "object uploaded");
        Ok(written)
    }

    /// Bytes stored under `hash`; [`DepotError::NotFound`] if never uploaded.
    pub fn fetch_object(&self, hash: &ContentHash) -> DepotResult<Vec<u8>> {
        Ok(self.objects.fetch(hash)?)
    }

    /// Validate and submit a release. Submissions without a timestamp are
    /// stamped with the current UTC time.
    pub fn submit_release(&self, submission: ReleaseSubmission) -> DepotResult<SubmitOutcome> {
        let manifest = submission.into_manifest(depot_types::now())?;
        self.coordinator.submit_release(&manifest)
    }

    /// Remove every manifest for `key` and withdraw its references. Objects
    /// are kept. Returns the number of manifests removed; 0 if none existed.
    pub fn delete_release(&self, key: &ReleaseKey) -> DepotResult<usize> {
        self.coordinator.delete_release(key)
    }

    /// Every manifest stored for `key`, oldest insertion first. Normally zero
    /// or one.
    pub fn query_release(&self, key: &ReleaseKey) -> DepotResult<Vec<StoredRelease>> {
        self.catalog().read(|tx| tx.find_exact(key).map_err(Into::into))
    }

    /// The newest manifest for `key`.
    pub fn get_commit(&self, key: &ReleaseKey) -> DepotResult<StoredRelease> {
        self.query_release(key)?
            .pop()
            .ok_or_else(|| DepotError::NotFound(format!("release {key}")))
    }

    /// Resolve `path` inside the release `key` and return its hash and bytes.
    pub fn fetch_release_file(
        &self,
        key: &ReleaseKey,
        path: &str,
    ) -> DepotResult<(ContentHash, Vec<u8>)> {
        validate_file_path(path)?;
        let release = self.get_commit(key)?;
        let hash = release
            .manifest
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| DepotError::NotFound(format!("file {path} in release {key}")))?;
        let bytes = self.fetch_object(&hash)?;
        Ok((hash, bytes))
    }

    /// Current reference lists for `hashes`; unknown hashes are omitted.
    pub fn query_references(&self, hashes: &BTreeSet<ContentHash>) -> DepotResult<ReferenceMap> {
        self.catalog().read(|tx| tx.query(hashes).map_err(Into::into))
    }

    /// Distinct owners with at least one release, sorted.
    pub fn list_owners(&self) -> DepotResult<Vec<String>> {
        self.catalog().read(|tx| tx.list_owners().map_err(Into::into))
    }

    /// Latest revision of each project, newest first.
    pub fn list_projects(
        &self,
        owner: Option<&str>,
        request: PageRequest,
    ) -> DepotResult<Page<ProjectSummary>> {
        let window = request.window();
        self.catalog().read(|tx| {
            let total = tx.count_projects(owner)?;
            let items = tx.list_projects(owner, window)?;
            Ok(Page::new(total, window, items))
        })
    }

    /// Manifests of one project across all revisions, newest first.
    pub fn list_commits(
        &self,
        owner: &str,
        project: &str,
        request: PageRequest,
    ) -> DepotResult<Page<StoredRelease>> {
        let window = request.window();
        self.catalog().read(|tx| {
            let total = tx.count_commits(owner, project)?;
            let items = tx.list_commits(owner, project, window)?;
            Ok(Page::new(total, window, items))
        })
    }

    fn catalog(&self) -> &C {
        self.coordinator.catalog()
    }
}
