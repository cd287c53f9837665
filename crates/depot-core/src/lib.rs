//! Core of the depot artifact store.
//!
//! [`Depot`] is the entry point: it owns an object store and a catalog and
//! exposes every operation the server and CLI need. Mutations that touch
//! both indexes go through the [`ConsistencyCoordinator`], which runs each
//! one as a single catalog transaction so the reference index never
//! disagrees with the release index.

pub mod config;
pub mod coordinator;
pub mod depot;
pub mod error;

pub use config::{CoordinatorConfig, DepotConfig, ServerConfig, StorageBackend, StorageConfig};
pub use coordinator::{ConsistencyCoordinator, SubmitOutcome};
pub use depot::Depot;
pub use error::{DepotError, DepotResult};

// Re-export the types callers need alongside the API.
pub use depot_index::{Catalog, InMemoryCatalog, ReferenceMap, SqliteCatalog};
pub use depot_types::{
    ContentHash, Page, PageParams, PageRequest, ProjectSummary, ReleaseKey, ReleaseSubmission,
    StoredRelease,
};
