//! Foundation types for depot.
//!
//! This crate provides the value types shared by every depot crate: the
//! caller-supplied [`ContentHash`], the natural key of a release
//! ([`ReleaseKey`]), the typed [`ReleaseManifest`], and the pagination
//! contract used by the listing operations.
//!
//! # Key Types
//!
//! - [`ContentHash`] -- Opaque, validated object identifier (also a filename)
//! - [`ReleaseKey`] -- `(owner, project, revision)` natural key
//! - [`ReferenceString`] -- `owner/project/revision/filepath` location string
//! - [`ReleaseManifest`] -- File map, author, metadata, and timestamp
//! - [`PageRequest`] / [`PageWindow`] / [`Page`] -- Pagination

pub mod error;
pub mod hash;
pub mod page;
pub mod release;
pub mod time;

pub use error::TypeError;
pub use hash::ContentHash;
pub use page::{Page, PageParams, PageRequest, PageWindow, DEFAULT_PAGE_SIZE};
pub use release::{
    validate_file_path, FileMap, ProjectMetadata, ProjectSummary, ReferenceString, ReleaseId,
    ReleaseKey, ReleaseManifest, ReleaseSubmission, StoredRelease,
};
pub use time::{now, parse_timestamp};
