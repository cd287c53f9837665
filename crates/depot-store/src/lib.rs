//! Hash-keyed object storage for depot.
//!
//! Every uploaded file is stored once, as an immutable byte sequence keyed
//! by its caller-supplied [`ContentHash`](depot_types::ContentHash). The
//! store never interprets object contents and never re-verifies a hash.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- one file per object under a sharded directory tree
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; a second `put` of the same hash is
//!    a no-op.
//! 2. Write-then-register: bytes are durable before the hash is announced to
//!    the reference index.
//! 3. Concurrent reads are always safe.
//! 4. There is no delete. Unreferenced objects are left for an external
//!    reclamation process.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
