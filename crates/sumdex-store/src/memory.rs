use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use sumdex_types::{CatalogRecord, Digest, NamespaceRecord, NamespacedRecord, RecordContent};

use crate::error::{StoreError, StoreResult};
use crate::traits::{CatalogStore, CentralStore};

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StoreError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StoreError::LockPoisoned)
}

fn digest_prefix_matches(record: &CatalogRecord, prefix: &str) -> bool {
    record.digest.is_some_and(|d| d.has_hex_prefix(prefix))
}

/// In-memory catalog keyed by path.
///
/// Intended for tests and embedding. Follows the same uniqueness and
/// ordering rules as [`SqliteCatalog`](crate::SqliteCatalog), and counts
/// successful writes so tests can assert that a pass wrote nothing.
#[derive(Default)]
pub struct MemoryCatalog {
    records: RwLock<BTreeMap<String, CatalogRecord>>,
    writes: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inserts and row-affecting updates so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn bump(&self, n: usize) -> usize {
        self.writes.fetch_add(n, Ordering::Relaxed);
        n
    }
}

impl std::fmt::Debug for MemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.records.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("MemoryCatalog")
            .field("record_count", &count)
            .field("writes", &self.writes())
            .finish()
    }
}

impl CatalogStore for MemoryCatalog {
    fn find_by_path(&self, path: &str) -> StoreResult<Option<CatalogRecord>> {
        Ok(read(&self.records)?.get(path).cloned())
    }

    fn insert(&self, record: &CatalogRecord) -> StoreResult<()> {
        let mut map = write(&self.records)?;
        if map.contains_key(&record.path) {
            return Err(StoreError::Conflict(record.path.clone()));
        }
        map.insert(record.path.clone(), record.clone());
        self.bump(1);
        Ok(())
    }

    fn update_size(&self, path: &str, size: u64, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut map = write(&self.records)?;
        match map.get_mut(path) {
            Some(r) => {
                r.size = Some(size);
                r.updated_at = now;
                Ok(self.bump(1))
            }
            None => Ok(0),
        }
    }

    fn update_content(
        &self,
        path: &str,
        content: &RecordContent,
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut map = write(&self.records)?;
        match map.get_mut(path) {
            Some(r) => {
                r.apply_content(content.clone(), now);
                Ok(self.bump(1))
            }
            None => Ok(0),
        }
    }

    fn all_records(&self) -> StoreResult<Vec<CatalogRecord>> {
        Ok(read(&self.records)?.values().cloned().collect())
    }

    fn find_by_digest_prefix(&self, prefix: &str) -> StoreResult<Vec<CatalogRecord>> {
        let mut out: Vec<CatalogRecord> = read(&self.records)?
            .values()
            .filter(|r| digest_prefix_matches(r, prefix))
            .cloned()
            .collect();
        // Values come out in path order, so a stable sort on digest yields (digest, path).
        out.sort_by_key(|r| r.digest);
        Ok(out)
    }

    fn find_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<CatalogRecord>> {
        Ok(read(&self.records)?
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn find_by_digests(&self, digests: &[Digest]) -> StoreResult<Vec<CatalogRecord>> {
        let wanted: BTreeSet<&Digest> = digests.iter().collect();
        Ok(read(&self.records)?
            .values()
            .filter(|r| r.digest.as_ref().is_some_and(|d| wanted.contains(d)))
            .cloned()
            .collect())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(read(&self.records)?.len())
    }
}

/// In-memory central store.
#[derive(Default)]
pub struct MemoryCentral {
    namespaces: RwLock<BTreeMap<String, NamespaceRecord>>,
    objects: RwLock<BTreeMap<(String, String), NamespacedRecord>>,
    writes: AtomicUsize,
}

impl MemoryCentral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of object inserts and row-affecting object updates so far.
    /// Namespace writes are not counted.
    pub fn object_writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn bump(&self, n: usize) -> usize {
        self.writes.fetch_add(n, Ordering::Relaxed);
        n
    }

    fn sorted_by_digest(mut hits: Vec<NamespacedRecord>) -> Vec<NamespacedRecord> {
        hits.sort_by(|a, b| {
            (a.record.digest, &a.namespace, &a.record.path).cmp(&(
                b.record.digest,
                &b.namespace,
                &b.record.path,
            ))
        });
        hits
    }
}

impl std::fmt::Debug for MemoryCentral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCentral")
            .field("object_writes", &self.object_writes())
            .finish_non_exhaustive()
    }
}

impl CentralStore for MemoryCentral {
    fn insert_namespace(&self, namespace: &NamespaceRecord) -> StoreResult<()> {
        let mut map = write(&self.namespaces)?;
        if map.contains_key(&namespace.name) {
            return Err(StoreError::AlreadyExists(namespace.name.clone()));
        }
        map.insert(namespace.name.clone(), namespace.clone());
        Ok(())
    }

    fn find_namespace(&self, name: &str) -> StoreResult<Option<NamespaceRecord>> {
        Ok(read(&self.namespaces)?.get(name).cloned())
    }

    fn list_namespaces(&self) -> StoreResult<Vec<NamespaceRecord>> {
        Ok(read(&self.namespaces)?.values().cloned().collect())
    }

    fn update_namespace(&self, namespace: &NamespaceRecord) -> StoreResult<usize> {
        let mut map = write(&self.namespaces)?;
        match map.get_mut(&namespace.name) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = namespace.clone();
                existing.created_at = created_at;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn namespace_objects(&self, namespace: &str) -> StoreResult<Vec<NamespacedRecord>> {
        Ok(read(&self.objects)?
            .values()
            .filter(|r| r.namespace == namespace)
            .cloned()
            .collect())
    }

    fn insert_object(&self, record: &NamespacedRecord) -> StoreResult<()> {
        if !read(&self.namespaces)?.contains_key(&record.namespace) {
            return Err(StoreError::NotFound(record.namespace.clone()));
        }
        let key = (record.namespace.clone(), record.record.path.clone());
        let mut map = write(&self.objects)?;
        if map.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{}:{}", key.0, key.1)));
        }
        map.insert(key, record.clone());
        self.bump(1);
        Ok(())
    }

    fn update_object(&self, record: &NamespacedRecord) -> StoreResult<usize> {
        let key = (record.namespace.clone(), record.record.path.clone());
        let mut map = write(&self.objects)?;
        match map.get_mut(&key) {
            Some(existing) => {
                existing
                    .record
                    .apply_content(record.record.content(), record.record.updated_at);
                Ok(self.bump(1))
            }
            None => Ok(0),
        }
    }

    fn find_objects_by_digest_prefix(&self, prefix: &str) -> StoreResult<Vec<NamespacedRecord>> {
        let hits = read(&self.objects)?
            .values()
            .filter(|r| digest_prefix_matches(&r.record, prefix))
            .cloned()
            .collect();
        Ok(Self::sorted_by_digest(hits))
    }

    fn find_objects_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<NamespacedRecord>> {
        let mut hits: Vec<NamespacedRecord> = read(&self.objects)?
            .values()
            .filter(|r| r.record.path.starts_with(prefix))
            .cloned()
            .collect();
        hits.sort_by(|a, b| (&a.record.path, &a.namespace).cmp(&(&b.record.path, &b.namespace)));
        Ok(hits)
    }

    fn find_objects_by_digests(&self, digests: &[Digest]) -> StoreResult<Vec<NamespacedRecord>> {
        let wanted: BTreeSet<&Digest> = digests.iter().collect();
        let hits = read(&self.objects)?
            .values()
            .filter(|r| r.record.digest.as_ref().is_some_and(|d| wanted.contains(d)))
            .cloned()
            .collect();
        Ok(Self::sorted_by_digest(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sumdex_types::Fingerprint;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn record(path: &str, byte: u8) -> CatalogRecord {
        CatalogRecord::scanned(path, 3, ts(10), Digest::from_hash([byte; 32]), ts(20))
    }

    #[test]
    fn insert_conflict_leaves_row_and_counter() {
        let cat = MemoryCatalog::new();
        cat.insert(&record("a", 1)).unwrap();
        assert!(cat.insert(&record("a", 2)).unwrap_err().is_conflict());
        assert_eq!(cat.writes(), 1);
        assert_eq!(
            cat.find_by_path("a").unwrap().unwrap().digest,
            Some(Digest::from_hash([1; 32]))
        );
    }

    #[test]
    fn updates_on_missing_rows_affect_nothing() {
        let cat = MemoryCatalog::new();
        assert_eq!(cat.update_size("nope", 1, ts(0)).unwrap(), 0);
        assert_eq!(cat.update_content("nope", &record("nope", 1).content(), ts(0)).unwrap(), 0);
        assert_eq!(cat.writes(), 0);
    }

    #[test]
    fn prefix_queries_follow_store_ordering() {
        let cat = MemoryCatalog::new();
        cat.insert(&record("dir/z", 0xaa)).unwrap();
        cat.insert(&record("dir/a", 0xab)).unwrap();
        cat.insert(&record("other", 0xaa)).unwrap();

        let by_digest: Vec<_> = cat
            .find_by_digest_prefix("aa")
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(by_digest, vec!["dir/z", "other"]);

        let by_path: Vec<_> = cat
            .find_by_path_prefix("dir/")
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(by_path, vec!["dir/a", "dir/z"]);

        let by_set: Vec<_> = cat
            .find_by_digests(&[Digest::from_hash([0xaa; 32])])
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(by_set, vec!["dir/z", "other"]);
    }

    #[test]
    fn central_namespace_lifecycle() {
        let central = MemoryCentral::new();
        let mut ns = NamespaceRecord::new("h1", "h1:/db", Fingerprint::new(1, ts(1), None), ts(1));
        central.insert_namespace(&ns).unwrap();
        assert!(matches!(
            central.insert_namespace(&ns),
            Err(StoreError::AlreadyExists(_))
        ));
        ns.mark_merged(Fingerprint::new(2, ts(2), None), ts(3));
        assert_eq!(central.update_namespace(&ns).unwrap(), 1);
        assert_eq!(central.find_namespace("h1").unwrap(), Some(ns));
    }

    fn registered(names: &[&str]) -> MemoryCentral {
        let central = MemoryCentral::new();
        for name in names {
            central
                .insert_namespace(&NamespaceRecord::new(
                    *name,
                    "loc",
                    Fingerprint::new(0, ts(0), None),
                    ts(0),
                ))
                .unwrap();
        }
        central
    }

    #[test]
    fn objects_need_a_registered_namespace() {
        let central = registered(&["h1"]);
        let err = central
            .insert_object(&NamespacedRecord::new("ghost", record("a", 1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref ns) if ns == "ghost"));
        assert!(!err.is_conflict());
        assert_eq!(central.object_writes(), 0);
    }

    #[test]
    fn central_objects_sorted_by_digest_namespace_path() {
        let central = registered(&["h1", "h2"]);
        central.insert_object(&NamespacedRecord::new("h2", record("a", 1))).unwrap();
        central.insert_object(&NamespacedRecord::new("h1", record("b", 1))).unwrap();
        central.insert_object(&NamespacedRecord::new("h1", record("a", 1))).unwrap();
        assert!(central
            .insert_object(&NamespacedRecord::new("h1", record("a", 2)))
            .unwrap_err()
            .is_conflict());

        let hits: Vec<_> = central
            .find_objects_by_digests(&[Digest::from_hash([1; 32])])
            .unwrap()
            .into_iter()
            .map(|r| format!("{}:{}", r.namespace, r.record.path))
            .collect();
        assert_eq!(hits, vec!["h1:a", "h1:b", "h2:a"]);
        assert_eq!(central.object_writes(), 3);
    }
}
