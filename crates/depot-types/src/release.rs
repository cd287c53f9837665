//! Release manifests and the identifiers that tie them to the reference index.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::hash::ContentHash;
use crate::time::parse_timestamp;

/// Logical file path → content hash. Paths are unique and kept sorted.
pub type FileMap = BTreeMap<String, ContentHash>;

/// Natural key of a release: `(owner, project, revision)`.
///
/// None of the three components may contain `/`, which keeps the derived
/// [`ReferenceString`] unambiguous.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReleaseKey {
    pub owner: String,
    pub project: String,
    pub revision: String,
}

impl ReleaseKey {
    /// Validate and build a key.
    pub fn new(
        owner: impl Into<String>,
        project: impl Into<String>,
        revision: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let key = Self {
            owner: owner.into(),
            project: project.into(),
            revision: revision.into(),
        };
        validate_segment("owner", &key.owner)?;
        validate_segment("project", &key.project)?;
        validate_segment("revision", &key.revision)?;
        Ok(key)
    }

    /// The reference string for `path` inside this release.
    ///
    /// This is the only place reference strings are built.
    pub fn reference_for(&self, path: &str) -> ReferenceString {
        ReferenceString(format!(
            "{}/{}/{}/{}",
            self.owner, self.project, self.revision, path
        ))
    }
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.project, self.revision)
    }
}

fn validate_segment(field: &'static str, value: &str) -> Result<(), TypeError> {
    let reason = if value.is_empty() {
        Some("must not be empty".to_string())
    } else if value == "." || value == ".." {
        Some("must not be '.' or '..'".to_string())
    } else if value.contains('/') {
        Some("must not contain '/'".to_string())
    } else if value.chars().any(char::is_control) {
        Some("must not contain control characters".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TypeError::InvalidName {
            field,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Validate a logical file path inside a release.
///
/// Paths are relative, `/`-separated, and contain no empty, `.` or `..`
/// components.
pub fn validate_file_path(path: &str) -> Result<(), TypeError> {
    let fail = |reason: &str| {
        Err(TypeError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        })
    };

    if path.is_empty() {
        return fail("must not be empty");
    }
    if path.starts_with('/') {
        return fail("must be relative");
    }
    if path.chars().any(char::is_control) {
        return fail("must not contain control characters");
    }
    for component in path.split('/') {
        match component {
            "" => return fail("must not contain empty components"),
            "." | ".." => return fail("must not contain '.' or '..' components"),
            _ => {}
        }
    }
    Ok(())
}

/// Identifies one `(owner, project, revision, filepath)` location that
/// depends on a hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceString(String);

impl ReferenceString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ReferenceString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ReferenceString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque project metadata. Always a JSON object; never interpreted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectMetadata(Map<String, Value>);

impl ProjectMetadata {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for ProjectMetadata {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other),
        }
    }
}

/// A release: the file map of one `(owner, project, revision)` plus author,
/// metadata, and timestamp. Immutable once submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    #[serde(flatten)]
    pub key: ReleaseKey,
    pub author: String,
    pub files: FileMap,
    #[serde(default)]
    pub metadata: ProjectMetadata,
    pub time: NaiveDateTime,
}

impl ReleaseManifest {
    /// Distinct hashes referenced by the file map.
    pub fn hashes(&self) -> BTreeSet<ContentHash> {
        self.files.values().cloned().collect()
    }

    /// Reference strings grouped by the hash each one points at.
    pub fn references_by_hash(&self) -> BTreeMap<ContentHash, Vec<ReferenceString>> {
        let mut grouped: BTreeMap<ContentHash, Vec<ReferenceString>> = BTreeMap::new();
        for (path, hash) in &self.files {
            grouped
                .entry(hash.clone())
                .or_default()
                .push(self.key.reference_for(path));
        }
        grouped
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            owner: self.key.owner.clone(),
            project: self.key.project.clone(),
            revision: self.key.revision.clone(),
            author: self.author.clone(),
            time: self.time,
        }
    }
}

/// Insertion id of a manifest row. Ascending ids follow insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(pub i64);

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A manifest together with its row id in the release index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRelease {
    pub id: ReleaseId,
    #[serde(flatten)]
    pub manifest: ReleaseManifest,
}

/// Latest-revision summary of one `(owner, project)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub owner: String,
    pub project: String,
    pub revision: String,
    pub author: String,
    pub time: NaiveDateTime,
}

/// An unvalidated release submission as received from a client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReleaseSubmission {
    pub owner: String,
    pub project: String,
    pub revision: String,
    pub author: String,
    #[serde(default)]
    pub files: FileMap,
    #[serde(default)]
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub time: Option<String>,
}

impl ReleaseSubmission {
    /// Validate the submission into a manifest. `now` stamps submissions that
    /// carry no timestamp.
    pub fn into_manifest(self, now: NaiveDateTime) -> Result<ReleaseManifest, TypeError> {
        let key = ReleaseKey::new(self.owner, self.project, self.revision)?;
        for path in self.files.keys() {
            validate_file_path(path)?;
        }
        let time = match self.time.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => now,
        };
        Ok(ReleaseManifest {
            key,
            author: self.author,
            files: self.files,
            metadata: self.metadata,
            time,
        })
    }
}
