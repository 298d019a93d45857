//! SQLite backends for [`CatalogStore`] and [`CentralStore`].
//!
//! Each store owns one connection behind a `Mutex`; SQLite itself arbitrates
//! between processes sharing a database file, and the `UNIQUE` constraints
//! are what make concurrent scanners of one catalog safe.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use sumdex_types::time::{from_unix_nanos, from_unix_parts, to_unix_nanos, to_unix_parts};
use sumdex_types::{
    optional_hex, CatalogRecord, Digest, Fingerprint, NamespaceRecord, NamespacedRecord,
    RecordContent,
};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::schema::{
    like_prefix, CATALOG_SCHEMA, CENTRAL_SCHEMA, NAMESPACES_TABLE, OBJECTS_TABLE, UNKNOWN_SIZE,
};
use crate::traits::{CatalogStore, CentralStore};

const RECORD_COLUMNS: &str =
    "path, type, size, mtime, mtime_nsec, digest, status, created_at, updated_at";
const NAMESPACE_COLUMNS: &str = "name, source_locator, snapshot_size, snapshot_mtime, \
                                 snapshot_mtime_nsec, snapshot_digest, status, created_at, \
                                 updated_at";

// SQLite caps the number of bound parameters per statement.
const IN_CHUNK: usize = 500;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Row codecs
// ---------------------------------------------------------------------------

struct RawRecord {
    path: String,
    kind: String,
    size: i64,
    mtime: i64,
    mtime_nsec: u32,
    digest: String,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl RawRecord {
    /// Read [`RECORD_COLUMNS`] starting at column `offset`.
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(offset)?,
            kind: row.get(offset + 1)?,
            size: row.get(offset + 2)?,
            mtime: row.get(offset + 3)?,
            mtime_nsec: row.get(offset + 4)?,
            digest: row.get(offset + 5)?,
            status: row.get(offset + 6)?,
            created_at: row.get(offset + 7)?,
            updated_at: row.get(offset + 8)?,
        })
    }

    fn into_record(self) -> StoreResult<CatalogRecord> {
        Ok(CatalogRecord {
            kind: self.kind.parse()?,
            size: decode_size(self.size),
            mtime: from_unix_parts(self.mtime, self.mtime_nsec)?,
            digest: Digest::parse_optional(&self.digest)?,
            status: self.status.parse()?,
            created_at: from_unix_nanos(self.created_at)?,
            updated_at: from_unix_nanos(self.updated_at)?,
            path: self.path,
        })
    }
}

struct EncodedContent {
    kind: &'static str,
    size: i64,
    mtime: i64,
    mtime_nsec: u32,
    digest: String,
    status: &'static str,
}

impl EncodedContent {
    fn new(content: &RecordContent) -> StoreResult<Self> {
        let (mtime, mtime_nsec) = to_unix_parts(&content.mtime);
        Ok(Self {
            kind: content.kind.as_str(),
            size: encode_size(content.size)?,
            mtime,
            mtime_nsec,
            digest: optional_hex(content.digest.as_ref()),
            status: content.status.as_str(),
        })
    }
}

struct RawNamespace {
    name: String,
    source_locator: String,
    snapshot_size: i64,
    snapshot_mtime: i64,
    snapshot_mtime_nsec: u32,
    snapshot_digest: String,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl RawNamespace {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            source_locator: row.get(1)?,
            snapshot_size: row.get(2)?,
            snapshot_mtime: row.get(3)?,
            snapshot_mtime_nsec: row.get(4)?,
            snapshot_digest: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_namespace(self) -> StoreResult<NamespaceRecord> {
        let size = u64::try_from(self.snapshot_size).map_err(|_| {
            StoreError::Corrupt(format!(
                "namespace {}: negative snapshot size {}",
                self.name, self.snapshot_size
            ))
        })?;
        Ok(NamespaceRecord {
            snapshot: Fingerprint::new(
                size,
                from_unix_parts(self.snapshot_mtime, self.snapshot_mtime_nsec)?,
                Digest::parse_optional(&self.snapshot_digest)?,
            ),
            status: self.status.parse()?,
            created_at: from_unix_nanos(self.created_at)?,
            updated_at: from_unix_nanos(self.updated_at)?,
            name: self.name,
            source_locator: self.source_locator,
        })
    }
}

fn encode_size(size: Option<u64>) -> StoreResult<i64> {
    match size {
        None => Ok(UNKNOWN_SIZE),
        Some(s) => i64::try_from(s).map_err(|_| StoreError::Corrupt(format!("size {s} out of range"))),
    }
}

fn decode_size(raw: i64) -> Option<u64> {
    u64::try_from(raw).ok()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

fn configure(conn: &Connection) -> StoreResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // Byte-exact prefix matching for path and digest lookups.
    conn.pragma_update(None, "case_sensitive_like", true)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

fn has_table(conn: &Connection, name: &str) -> StoreResult<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StoreResult<Vec<CatalogRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let raws = stmt
        .query_map(params, |row| RawRecord::from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawRecord::into_record).collect()
}

fn query_namespaced<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StoreResult<Vec<NamespacedRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let raws = stmt
        .query_map(params, |row| {
            let namespace: String = row.get(0)?;
            Ok((namespace, RawRecord::from_row(row, 1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter()
        .map(|(namespace, raw)| Ok(NamespacedRecord::new(namespace, raw.into_record()?)))
        .collect()
}

fn unique_hexes(digests: &[Digest]) -> Vec<String> {
    let mut hexes: Vec<String> = digests.iter().map(Digest::to_hex).collect();
    hexes.sort();
    hexes.dedup();
    hexes
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| StoreError::LockPoisoned)
}

// ---------------------------------------------------------------------------
// Local catalog
// ---------------------------------------------------------------------------

/// A catalog stored in a single SQLite file.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog at `path` and ensure its schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        configure(&conn)?;
        conn.execute_batch(CATALOG_SCHEMA)?;
        debug!(path = %path.display(), "opened catalog");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing catalog without write access, e.g. a fetched
    /// snapshot. Fails with [`StoreError::NotACatalog`] if the file has no
    /// catalog table.
    pub fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure(&conn)?;
        if !has_table(&conn, OBJECTS_TABLE)? {
            return Err(StoreError::NotACatalog(path.to_path_buf()));
        }
        debug!(path = %path.display(), "opened catalog read-only");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// A throwaway catalog for tests.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        conn.execute_batch(CATALOG_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// The database file, if this catalog is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("path", &self.path)
            .finish()
    }
}

impl CatalogStore for SqliteCatalog {
    fn find_by_path(&self, path: &str) -> StoreResult<Option<CatalogRecord>> {
        let conn = lock(&self.conn)?;
        let raw = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM objects WHERE path = ?1"),
                params![path],
                |row| RawRecord::from_row(row, 0),
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn insert(&self, record: &CatalogRecord) -> StoreResult<()> {
        let c = EncodedContent::new(&record.content())?;
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT INTO objects ({RECORD_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                record.path,
                c.kind,
                c.size,
                c.mtime,
                c.mtime_nsec,
                c.digest,
                c.status,
                to_unix_nanos(&record.created_at)?,
                to_unix_nanos(&record.updated_at)?,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Conflict(record.path.clone())
            } else {
                StoreError::Sqlite(e)
            }
        })?;
        Ok(())
    }

    fn update_size(&self, path: &str, size: u64, now: DateTime<Utc>) -> StoreResult<usize> {
        let size = encode_size(Some(size))?;
        let conn = lock(&self.conn)?;
        let n = conn.execute(
            "UPDATE objects SET size = ?1, updated_at = ?2 WHERE path = ?3",
            params![size, to_unix_nanos(&now)?, path],
        )?;
        Ok(n)
    }

    fn update_content(
        &self,
        path: &str,
        content: &RecordContent,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let c = EncodedContent::new(content)?;
        let conn = lock(&self.conn)?;
        let n = conn.execute(
            "UPDATE objects SET type = ?1, size = ?2, mtime = ?3, mtime_nsec = ?4, digest = ?5, \
             status = ?6, updated_at = ?7 WHERE path = ?8",
            params![
                c.kind,
                c.size,
                c.mtime,
                c.mtime_nsec,
                c.digest,
                c.status,
                to_unix_nanos(&now)?,
                path
            ],
        )?;
        Ok(n)
    }

    fn all_records(&self) -> StoreResult<Vec<CatalogRecord>> {
        let conn = lock(&self.conn)?;
        query_records(
            &conn,
            &format!("SELECT {RECORD_COLUMNS} FROM objects ORDER BY path"),
            [],
        )
    }

    fn find_by_digest_prefix(&self, prefix: &str) -> StoreResult<Vec<CatalogRecord>> {
        let conn = lock(&self.conn)?;
        query_records(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM objects WHERE digest <> '' AND digest LIKE ?1 \
                 ESCAPE '\\' ORDER BY digest, path"
            ),
            params![like_prefix(&prefix.to_ascii_lowercase())],
        )
    }

    fn find_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<CatalogRecord>> {
        let conn = lock(&self.conn)?;
        query_records(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM objects WHERE path LIKE ?1 ESCAPE '\\' ORDER BY path"
            ),
            params![like_prefix(prefix)],
        )
    }

    fn find_by_digests(&self, digests: &[Digest]) -> StoreResult<Vec<CatalogRecord>> {
        let hexes = unique_hexes(digests);
        let conn = lock(&self.conn)?;
        let mut out = Vec::new();
        for chunk in hexes.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM objects WHERE digest IN ({}) ORDER BY path",
                placeholders(chunk.len())
            );
            out.extend(query_records(&conn, &sql, params_from_iter(chunk.iter()))?);
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    fn count(&self) -> StoreResult<usize> {
        let conn = lock(&self.conn)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

// ---------------------------------------------------------------------------
// Central store
// ---------------------------------------------------------------------------

/// The central store in a single SQLite file.
pub struct SqliteCentral {
    conn: Mutex<Connection>,
}

impl SqliteCentral {
    /// Open (creating if needed) the central store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        configure(&conn)?;
        conn.execute_batch(CENTRAL_SCHEMA)?;
        debug!(path = %path.display(), "opened central store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing central store without write access. Fails with
    /// [`StoreError::NotACentralStore`] if the file has no namespace table.
    pub fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure(&conn)?;
        if !has_table(&conn, NAMESPACES_TABLE)? {
            return Err(StoreError::NotACentralStore(path.to_path_buf()));
        }
        debug!(path = %path.display(), "opened central store read-only");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A throwaway central store for tests.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        conn.execute_batch(CENTRAL_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl std::fmt::Debug for SqliteCentral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCentral").finish_non_exhaustive()
    }
}

impl CentralStore for SqliteCentral {
    fn insert_namespace(&self, namespace: &NamespaceRecord) -> StoreResult<()> {
        let size = encode_size(Some(namespace.snapshot.size))?;
        let (mtime, mtime_nsec) = to_unix_parts(&namespace.snapshot.mtime);
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT INTO namespaces ({NAMESPACE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                namespace.name,
                namespace.source_locator,
                size,
                mtime,
                mtime_nsec,
                optional_hex(namespace.snapshot.digest.as_ref()),
                namespace.status.as_str(),
                to_unix_nanos(&namespace.created_at)?,
                to_unix_nanos(&namespace.updated_at)?,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::AlreadyExists(namespace.name.clone())
            } else {
                StoreError::Sqlite(e)
            }
        })?;
        Ok(())
    }

    fn find_namespace(&self, name: &str) -> StoreResult<Option<NamespaceRecord>> {
        let conn = lock(&self.conn)?;
        let raw = conn
            .query_row(
                &format!("SELECT {NAMESPACE_COLUMNS} FROM namespaces WHERE name = ?1"),
                params![name],
                RawNamespace::from_row,
            )
            .optional()?;
        raw.map(RawNamespace::into_namespace).transpose()
    }

    fn list_namespaces(&self) -> StoreResult<Vec<NamespaceRecord>> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare(&format!("SELECT {NAMESPACE_COLUMNS} FROM namespaces ORDER BY name"))?;
        let raws = stmt
            .query_map([], RawNamespace::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawNamespace::into_namespace).collect()
    }

    fn update_namespace(&self, namespace: &NamespaceRecord) -> StoreResult<usize> {
        let size = encode_size(Some(namespace.snapshot.size))?;
        let (mtime, mtime_nsec) = to_unix_parts(&namespace.snapshot.mtime);
        let conn = lock(&self.conn)?;
        let n = conn.execute(
            "UPDATE namespaces SET source_locator = ?1, snapshot_size = ?2, snapshot_mtime = ?3, \
             snapshot_mtime_nsec = ?4, snapshot_digest = ?5, status = ?6, updated_at = ?7 \
             WHERE name = ?8",
            params![
                namespace.source_locator,
                size,
                mtime,
                mtime_nsec,
                optional_hex(namespace.snapshot.digest.as_ref()),
                namespace.status.as_str(),
                to_unix_nanos(&namespace.updated_at)?,
                namespace.name,
            ],
        )?;
        Ok(n)
    }

    fn namespace_objects(&self, namespace: &str) -> StoreResult<Vec<NamespacedRecord>> {
        let conn = lock(&self.conn)?;
        query_namespaced(
            &conn,
            &format!("SELECT namespace, {RECORD_COLUMNS} FROM objects WHERE namespace = ?1"),
            params![namespace],
        )
    }

    fn insert_object(&self, record: &NamespacedRecord) -> StoreResult<()> {
        let r = &record.record;
        let c = EncodedContent::new(&r.content())?;
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT INTO objects (namespace, {RECORD_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                record.namespace,
                r.path,
                c.kind,
                c.size,
                c.mtime,
                c.mtime_nsec,
                c.digest,
                c.status,
                to_unix_nanos(&r.created_at)?,
                to_unix_nanos(&r.updated_at)?,
            ],
        )
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound(record.namespace.clone())
            } else if is_constraint_violation(&e) {
                StoreError::Conflict(format!("{}:{}", record.namespace, r.path))
            } else {
                StoreError::Sqlite(e)
            }
        })?;
        Ok(())
    }

    fn update_object(&self, record: &NamespacedRecord) -> StoreResult<usize> {
        let r = &record.record;
        let c = EncodedContent::new(&r.content())?;
        let conn = lock(&self.conn)?;
        let n = conn.execute(
            "UPDATE objects SET type = ?1, size = ?2, mtime = ?3, mtime_nsec = ?4, digest = ?5, \
             status = ?6, updated_at = ?7 WHERE namespace = ?8 AND path = ?9",
            params![
                c.kind,
                c.size,
                c.mtime,
                c.mtime_nsec,
                c.digest,
                c.status,
                to_unix_nanos(&r.updated_at)?,
                record.namespace,
                r.path,
            ],
        )?;
        Ok(n)
    }

    fn find_objects_by_digest_prefix(&self, prefix: &str) -> StoreResult<Vec<NamespacedRecord>> {
        let conn = lock(&self.conn)?;
        query_namespaced(
            &conn,
            &format!(
                "SELECT namespace, {RECORD_COLUMNS} FROM objects WHERE digest <> '' \
                 AND digest LIKE ?1 ESCAPE '\\' ORDER BY digest, namespace, path"
            ),
            params![like_prefix(&prefix.to_ascii_lowercase())],
        )
    }

    fn find_objects_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<NamespacedRecord>> {
        let conn = lock(&self.conn)?;
        query_namespaced(
            &conn,
            &format!(
                "SELECT namespace, {RECORD_COLUMNS} FROM objects WHERE path LIKE ?1 \
                 ESCAPE '\\' ORDER BY path, namespace"
            ),
            params![like_prefix(prefix)],
        )
    }

    fn find_objects_by_digests(&self, digests: &[Digest]) -> StoreResult<Vec<NamespacedRecord>> {
        let hexes = unique_hexes(digests);
        let conn = lock(&self.conn)?;
        let mut out = Vec::new();
        for chunk in hexes.chunks(IN_CHUNK) {
            let sql = format!(
                "SELECT namespace, {RECORD_COLUMNS} FROM objects WHERE digest IN ({}) \
                 ORDER BY digest, namespace, path",
                placeholders(chunk.len())
            );
            out.extend(query_namespaced(&conn, &sql, params_from_iter(chunk.iter()))?);
        }
        // Chunks are already in digest order relative to each other.
        Ok(out)
    }
}
