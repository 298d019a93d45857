use chrono::{DateTime, Utc};
use sumdex_types::{CatalogRecord, Digest, NamespaceRecord, NamespacedRecord, RecordContent};

use crate::error::StoreResult;

/// A catalog: one durable table of [`CatalogRecord`]s keyed by path.
///
/// All implementations must satisfy these invariants:
/// - `path` is unique. A second insert of the same path fails with
///   [`StoreError::Conflict`](crate::StoreError::Conflict) and leaves the
///   existing row untouched.
/// - Updates return the number of rows they affected; callers treat any
///   count other than one as suspicious.
/// - Queries are read-only and return an empty vector when nothing matches.
pub trait CatalogStore: Send + Sync {
    /// Look up the record for an exact path.
    fn find_by_path(&self, path: &str) -> StoreResult<Option<CatalogRecord>>;

    /// Insert a new record.
    fn insert(&self, record: &CatalogRecord) -> StoreResult<()>;

    /// Set only the `size` column of the record at `path`.
    fn update_size(&self, path: &str, size: u64, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Overwrite type, size, mtime, digest and status of the record at `path`.
    fn update_content(
        &self,
        path: &str,
        content: &RecordContent,
        now: DateTime<Utc>,
    ) -> StoreResult<usize>;

    /// Every record, ordered by path.
    fn all_records(&self) -> StoreResult<Vec<CatalogRecord>>;

    /// Records whose hex digest starts with `prefix`, ordered by `(digest, path)`.
    fn find_by_digest_prefix(&self, prefix: &str) -> StoreResult<Vec<CatalogRecord>>;

    /// Records whose path starts with `prefix`, ordered by path.
    fn find_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<CatalogRecord>>;

    /// Records whose digest is one of `digests`, ordered by path.
    fn find_by_digests(&self, digests: &[Digest]) -> StoreResult<Vec<CatalogRecord>>;

    /// Number of records.
    fn count(&self) -> StoreResult<usize>;
}

/// The central store: the namespace registry plus every namespace's records.
///
/// Rows of different namespaces are disjoint, so merges of different
/// namespaces never touch the same row. `(namespace, path)` is unique.
pub trait CentralStore: Send + Sync {
    /// Register a namespace. Fails with
    /// [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists) if the
    /// name is taken.
    fn insert_namespace(&self, namespace: &NamespaceRecord) -> StoreResult<()>;

    /// Look up a namespace by name.
    fn find_namespace(&self, name: &str) -> StoreResult<Option<NamespaceRecord>>;

    /// Every registered namespace, ordered by name.
    fn list_namespaces(&self) -> StoreResult<Vec<NamespaceRecord>>;

    /// Persist the fingerprint and status of an existing namespace.
    fn update_namespace(&self, namespace: &NamespaceRecord) -> StoreResult<usize>;

    /// Every record currently stored for `namespace`.
    fn namespace_objects(&self, namespace: &str) -> StoreResult<Vec<NamespacedRecord>>;

    /// Insert a record under its namespace.
    ///
    /// Fails with [`StoreError::NotFound`] if the namespace is not
    /// registered, and [`StoreError::Conflict`] if the path is taken.
    fn insert_object(&self, record: &NamespacedRecord) -> StoreResult<()>;

    /// Overwrite the mutable fields of the row keyed by `(namespace, path)`.
    fn update_object(&self, record: &NamespacedRecord) -> StoreResult<usize>;

    /// Records across all namespaces whose hex digest starts with `prefix`,
    /// ordered by `(digest, namespace, path)`.
    fn find_objects_by_digest_prefix(&self, prefix: &str) -> StoreResult<Vec<NamespacedRecord>>;

    /// Records across all namespaces whose path starts with `prefix`,
    /// ordered by `(path, namespace)`.
    fn find_objects_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<NamespacedRecord>>;

    /// Records across all namespaces whose digest is one of `digests`,
    /// ordered by `(digest, namespace, path)`.
    fn find_objects_by_digests(&self, digests: &[Digest]) -> StoreResult<Vec<NamespacedRecord>>;
}
