//! Reference and release indexes for depot.
//!
//! Two logical tables back every depot operation:
//!
//! - the **reference index** ([`ReferenceIndex`]) maps each content hash to
//!   the reference strings (`owner/project/revision/filepath`) that use it;
//! - the **release index** ([`ReleaseIndex`]) stores release manifests keyed
//!   by `(owner, project, revision)`.
//!
//! Both are reached only through a [`Catalog`] transaction, so a mutation
//! that spans the two commits or rolls back as a unit.
//!
//! # Backends
//!
//! - [`InMemoryCatalog`] -- copy-on-write snapshot, for tests and embedding
//! - [`SqliteCatalog`] -- one SQLite file in WAL mode

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod conformance;

pub use error::{IndexError, IndexResult};
pub use memory::{InMemoryCatalog, MemoryTx};
pub use sqlite::{SqliteCatalog, SqliteTx};
pub use traits::{Catalog, ReferenceIndex, ReferenceMap, ReleaseIndex};
