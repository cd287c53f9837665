//! SQLite-backed catalog.
//!
//! Both tables live in one database file so a single SQLite transaction
//! covers every multi-table mutation. Write transactions start with
//! `BEGIN IMMEDIATE`, which takes the database write lock up front: two
//! writers never interleave their read-modify-write of a reference list.
//! Readers use `BEGIN DEFERRED` and, with the WAL journal, see a stable
//! snapshot without blocking the writer.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use depot_types::{
    ContentHash, FileMap, PageWindow, ProjectMetadata, ProjectSummary, ReferenceString, ReleaseId,
    ReleaseKey, ReleaseManifest, StoredRelease,
};
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, info, warn};

use crate::error::{IndexError, IndexResult};
use crate::traits::{Catalog, ReferenceIndex, ReferenceMap, ReleaseIndex};

/// Stay well below SQLite's bound-parameter limit.
const MAX_PARAMS_PER_QUERY: usize = 500;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS object_refs (
    hash TEXT PRIMARY KEY,
    refs TEXT NOT NULL DEFAULT '[]'
);
CREATE TABLE IF NOT EXISTS releases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    project TEXT NOT NULL,
    revision TEXT NOT NULL,
    author TEXT NOT NULL,
    files TEXT NOT NULL DEFAULT '{}',
    metadata TEXT NOT NULL DEFAULT '{}',
    time INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS releases_by_key ON releases(owner, project, revision);
CREATE INDEX IF NOT EXISTS releases_by_time ON releases(owner, project, time);
"#;

const RELEASE_COLUMNS: &str = "id, owner, project, revision, author, files, metadata, time";

/// A [`Catalog`] stored in a single SQLite database file.
///
/// Each operation opens its own connection; the handle itself is just the
/// path and settings, so it is cheap to share across threads.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog at `path`.
    pub fn open(path: impl Into<PathBuf>, busy_timeout: Duration) -> IndexResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let catalog = Self { path, busy_timeout };
        let conn = catalog.connection()?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %catalog.path.display(), %journal_mode, "catalog opened");
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> IndexResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

/// An open SQLite transaction. Dropping it without [`commit`](Self::commit)
/// rolls back.
pub struct SqliteTx {
    conn: Connection,
    open: bool,
}

impl SqliteTx {
    fn begin(conn: Connection, statement: &str) -> IndexResult<Self> {
        conn.execute_batch(statement)?;
        Ok(Self { conn, open: true })
    }

    fn commit(mut self) -> IndexResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    fn select_references(
        &self,
        hashes: &BTreeSet<ContentHash>,
        mut visit: impl FnMut(ContentHash, &Row<'_>) -> IndexResult<()>,
    ) -> IndexResult<()> {
        let hashes: Vec<&str> = hashes.iter().map(ContentHash::as_str).collect();
        for chunk in hashes.chunks(MAX_PARAMS_PER_QUERY) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("SELECT hash, refs FROM object_refs WHERE hash IN ({placeholders})");
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let raw: String = row.get(0)?;
                let hash = ContentHash::new(raw).map_err(|e| IndexError::Corrupt(e.to_string()))?;
                visit(hash, row)?;
            }
        }
        Ok(())
    }

    fn collect_releases(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> IndexResult<Vec<StoredRelease>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(release_from_row(row)?);
        }
        Ok(out)
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "catalog rollback failed");
            }
        }
    }
}

fn to_micros(time: NaiveDateTime) -> i64 {
    time.and_utc().timestamp_micros()
}

fn from_micros(micros: i64) -> IndexResult<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| IndexError::Corrupt(format!("timestamp out of range: {micros}")))
}

fn sql_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn release_from_row(row: &Row<'_>) -> IndexResult<StoredRelease> {
    let files: String = row.get(5)?;
    let metadata: String = row.get(6)?;
    let files: FileMap = serde_json::from_str(&files)?;
    let metadata: ProjectMetadata = serde_json::from_str(&metadata)?;
    Ok(StoredRelease {
        id: ReleaseId(row.get(0)?),
        manifest: ReleaseManifest {
            key: ReleaseKey {
                owner: row.get(1)?,
                project: row.get(2)?,
                revision: row.get(3)?,
            },
            author: row.get(4)?,
            files,
            metadata,
            time: from_micros(row.get(7)?)?,
        },
    })
}

impl ReferenceIndex for SqliteTx {
    fn query(&self, hashes: &BTreeSet<ContentHash>) -> IndexResult<ReferenceMap> {
        let mut found = ReferenceMap::new();
        self.select_references(hashes, |hash, row| {
            let refs: String = row.get(1)?;
            let refs: Vec<ReferenceString> = serde_json::from_str(&refs)?;
            found.insert(hash, refs);
            Ok(())
        })?;
        Ok(found)
    }

    fn find_existing(&self, hashes: &BTreeSet<ContentHash>) -> IndexResult<BTreeSet<ContentHash>> {
        let mut found = BTreeSet::new();
        self.select_references(hashes, |hash, _| {
            found.insert(hash);
            Ok(())
        })?;
        Ok(found)
    }

    fn upsert(&mut self, entries: &ReferenceMap) -> IndexResult<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO object_refs(hash, refs) VALUES (?1, ?2)
             ON CONFLICT(hash) DO UPDATE SET refs = excluded.refs",
        )?;
        for (hash, refs) in entries {
            stmt.execute(params![hash.as_str(), serde_json::to_string(refs)?])?;
        }
        debug!(hashes = entries.len(), "reference lists written");
        Ok(())
    }
}

impl ReleaseIndex for SqliteTx {
    fn find_exact(&self, key: &ReleaseKey) -> IndexResult<Vec<StoredRelease>> {
        self.collect_releases(
            &format!(
                "SELECT {RELEASE_COLUMNS} FROM releases
                 WHERE owner = ?1 AND project = ?2 AND revision = ?3
                 ORDER BY id ASC"
            ),
            params![key.owner, key.project, key.revision],
        )
    }

    fn insert(&mut self, manifest: &ReleaseManifest) -> IndexResult<ReleaseId> {
        self.conn.execute(
            "INSERT INTO releases(owner, project, revision, author, files, metadata, time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                manifest.key.owner,
                manifest.key.project,
                manifest.key.revision,
                manifest.author,
                serde_json::to_string(&manifest.files)?,
                serde_json::to_string(&manifest.metadata)?,
                to_micros(manifest.time),
            ],
        )?;
        Ok(ReleaseId(self.conn.last_insert_rowid()))
    }

    fn delete_by_ids(&mut self, ids: &[ReleaseId]) -> IndexResult<usize> {
        let mut stmt = self.conn.prepare_cached("DELETE FROM releases WHERE id = ?1")?;
        let mut deleted = 0;
        for id in ids {
            deleted += stmt.execute(params![id.0])?;
        }
        Ok(deleted)
    }

    fn list_owners(&self) -> IndexResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT owner FROM releases ORDER BY owner")?;
        let owners = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(owners)
    }

    fn count_projects(&self, owner: Option<&str>) -> IndexResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT DISTINCT owner, project FROM releases
                WHERE ?1 IS NULL OR owner = ?1
             )",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_projects(
        &self,
        owner: Option<&str>,
        window: PageWindow,
    ) -> IndexResult<Vec<ProjectSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.owner, r.project, r.revision, r.author, r.time FROM releases r
             WHERE (?1 IS NULL OR r.owner = ?1)
               AND r.id = (
                   SELECT l.id FROM releases l
                   WHERE l.owner = r.owner AND l.project = r.project
                   ORDER BY l.time DESC, l.id DESC
                   LIMIT 1
               )
             ORDER BY r.time DESC, r.id DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let mut rows = stmt.query(params![
            owner,
            sql_limit(window.limit),
            sql_limit(window.offset)
        ])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(ProjectSummary {
                owner: row.get(0)?,
                project: row.get(1)?,
                revision: row.get(2)?,
                author: row.get(3)?,
                time: from_micros(row.get(4)?)?,
            });
        }
        Ok(out)
    }

    fn count_commits(&self, owner: &str, project: &str) -> IndexResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM releases WHERE owner = ?1 AND project = ?2",
            params![owner, project],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_commits(
        &self,
        owner: &str,
        project: &str,
        window: PageWindow,
    ) -> IndexResult<Vec<StoredRelease>> {
        self.collect_releases(
            &format!(
                "SELECT {RELEASE_COLUMNS} FROM releases
                 WHERE owner = ?1 AND project = ?2
                 ORDER BY time DESC, id DESC
                 LIMIT ?3 OFFSET ?4"
            ),
            params![
                owner,
                project,
                sql_limit(window.limit),
                sql_limit(window.offset)
            ],
        )
    }
}

impl Catalog for SqliteCatalog {
    type Tx = SqliteTx;

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&SqliteTx) -> Result<T, E>,
        E: From<IndexError>,
    {
        let tx = SqliteTx::begin(self.connection()?, "BEGIN DEFERRED")?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut SqliteTx) -> Result<T, E>,
        E: From<IndexError>,
    {
        let mut tx = SqliteTx::begin(self.connection()?, "BEGIN IMMEDIATE")?;
        let out = f(&mut tx)?;
        tx.commit()?;
        Ok(out)
    }
}
