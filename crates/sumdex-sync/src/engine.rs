use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sumdex_digest::Digester;
use sumdex_store::{CatalogStore, CentralStore, SqliteCatalog, StoreError};
use sumdex_types::{CatalogRecord, Fingerprint, NamespaceRecord, NamespacedRecord};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::fetcher::{FetchedSnapshot, SnapshotFetcher};
use crate::outcome::{MergeOutcome, MergeReport};

/// Registers namespaces and merges their snapshots into the central store.
///
/// Merges of different namespaces touch disjoint rows and may run
/// concurrently. Merges of the same namespace must be serialized by the
/// caller. Row writes are not wrapped in a transaction: a failed merge
/// leaves the rows it already wrote, and rerunning it converges because
/// every write is keyed by `(namespace, path)`.
pub struct SyncEngine {
    central: Arc<dyn CentralStore>,
    fetcher: Arc<dyn SnapshotFetcher>,
    digester: Arc<dyn Digester>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine").finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        central: Arc<dyn CentralStore>,
        fetcher: Arc<dyn SnapshotFetcher>,
        digester: Arc<dyn Digester>,
    ) -> Self {
        Self {
            central,
            fetcher,
            digester,
        }
    }

    /// Register a namespace that has never been merged.
    pub fn register(&self, name: &str, locator: &str) -> SyncResult<NamespaceRecord> {
        let unset = Fingerprint::new(0, DateTime::<Utc>::UNIX_EPOCH, None);
        self.register_with(name, locator, unset)
    }

    fn register_with(
        &self,
        name: &str,
        locator: &str,
        snapshot: Fingerprint,
    ) -> SyncResult<NamespaceRecord> {
        let namespace = NamespaceRecord::new(name, locator, snapshot, Utc::now());
        self.central
            .insert_namespace(&namespace)
            .map_err(|e| match e {
                StoreError::AlreadyExists(name) => SyncError::AlreadyExists(name),
                other => SyncError::Store(other),
            })?;
        info!(namespace = name, locator, "registered namespace");
        Ok(namespace)
    }

    /// Look up a registered namespace.
    pub fn find(&self, name: &str) -> SyncResult<NamespaceRecord> {
        self.central
            .find_namespace(name)?
            .ok_or_else(|| SyncError::NotFound(name.to_string()))
    }

    pub fn list(&self) -> SyncResult<Vec<NamespaceRecord>> {
        Ok(self.central.list_namespaces()?)
    }

    /// Fetch a first snapshot, register the namespace with the snapshot's
    /// size and mtime, and merge it.
    pub fn register_and_sync(&self, name: &str, locator: &str) -> SyncResult<MergeOutcome> {
        if self.central.find_namespace(name)?.is_some() {
            return Err(SyncError::AlreadyExists(name.to_string()));
        }
        let snapshot = self.fetcher.fetch(locator)?;
        let mut namespace = self.register_with(
            name,
            locator,
            Fingerprint::new(snapshot.size(), snapshot.mtime(), None),
        )?;
        self.merge_snapshot(&mut namespace, &snapshot)
    }

    /// Fetch and merge the current snapshot of a registered namespace.
    pub fn sync(&self, name: &str) -> SyncResult<MergeOutcome> {
        let mut namespace = self.find(name)?;
        let snapshot = self.fetcher.fetch(&namespace.source_locator)?;
        self.merge_snapshot(&mut namespace, &snapshot)
    }

    /// Merge `snapshot` into `namespace`, updating its fingerprint on success.
    ///
    /// Records absent from the snapshot are kept.
    pub fn merge_snapshot(
        &self,
        namespace: &mut NamespaceRecord,
        snapshot: &FetchedSnapshot,
    ) -> SyncResult<MergeOutcome> {
        let (size, mtime) = (snapshot.size(), snapshot.mtime());
        if !namespace.is_new() && namespace.snapshot.same_metadata(size, &mtime) {
            debug!(namespace = %namespace.name, "snapshot size and mtime unchanged");
            return Ok(MergeOutcome::Unchanged);
        }

        let digest = self.digester.digest_file(snapshot.path())?;
        let fingerprint = Fingerprint::new(size, mtime, Some(digest));
        if !namespace.is_new() && namespace.snapshot.digest == Some(digest) {
            debug!(namespace = %namespace.name, %digest, "snapshot bytes unchanged");
            self.store_fingerprint(namespace, fingerprint)?;
            return Ok(MergeOutcome::FingerprintRefreshed);
        }

        let report = self.diff_rows(&namespace.name, snapshot)?;
        self.store_fingerprint(namespace, fingerprint)?;
        info!(
            namespace = %namespace.name,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            "merged snapshot"
        );
        Ok(MergeOutcome::Merged(report))
    }

    fn diff_rows(&self, namespace: &str, snapshot: &FetchedSnapshot) -> SyncResult<MergeReport> {
        let remote = SqliteCatalog::open_read_only(snapshot.path())?.all_records()?;
        let mut stored: HashMap<String, NamespacedRecord> = self
            .central
            .namespace_objects(namespace)?
            .into_iter()
            .map(|r| (r.record.path.clone(), r))
            .collect();

        let mut report = MergeReport::default();
        for record in remote {
            let now = Utc::now();
            match stored.remove(&record.path) {
                Some(mut existing) => {
                    let content = record.content();
                    if existing.record.content() == content {
                        report.unchanged += 1;
                        continue;
                    }
                    existing.record.apply_content(content, now);
                    let rows = self.central.update_object(&existing)?;
                    if rows != 1 {
                        warn!(namespace, path = %record.path, rows, "unexpected affected row count");
                    }
                    report.updated += 1;
                }
                None => {
                    let inserted = NamespacedRecord::new(
                        namespace,
                        CatalogRecord {
                            created_at: now,
                            updated_at: now,
                            ..record
                        },
                    );
                    self.central.insert_object(&inserted)?;
                    report.inserted += 1;
                }
            }
        }
        Ok(report)
    }

    fn store_fingerprint(
        &self,
        namespace: &mut NamespaceRecord,
        fingerprint: Fingerprint,
    ) -> SyncResult<()> {
        namespace.mark_merged(fingerprint, Utc::now());
        let rows = self.central.update_namespace(namespace)?;
        if rows != 1 {
            warn!(namespace = %namespace.name, rows, "unexpected affected row count");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use filetime::{set_file_mtime, FileTime};
    use sumdex_digest::{CountingDigester, Sha256Digester};
    use sumdex_store::MemoryCentral;
    use sumdex_types::{Digest, RecordStatus};
    use tempfile::TempDir;

    use crate::fetcher::LocalCopyFetcher;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn record(path: &str, byte: u8) -> CatalogRecord {
        CatalogRecord::scanned(path, 4, ts(100), Digest::from_hash([byte; 32]), ts(100))
    }

    struct Fixture {
        _dir: TempDir,
        remote: PathBuf,
        central: Arc<MemoryCentral>,
        digester: Arc<CountingDigester<Sha256Digester>>,
        engine: SyncEngine,
    }

    impl Fixture {
        fn locator(&self) -> &str {
            self.remote.to_str().unwrap()
        }

        /// Rewrite the remote catalog with `records` and pin its mtime.
        fn publish(&self, records: &[CatalogRecord], mtime: i64) {
            let _ = std::fs::remove_file(&self.remote);
            let catalog = SqliteCatalog::open(&self.remote).unwrap();
            for r in records {
                catalog.insert(r).unwrap();
            }
            drop(catalog);
            set_mtime(&self.remote, mtime);
        }
    }

    fn set_mtime(path: &Path, secs: i64) {
        set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote.db");
        let central = Arc::new(MemoryCentral::new());
        let digester = Arc::new(CountingDigester::new(Sha256Digester));
        let engine = SyncEngine::new(central.clone(), Arc::new(LocalCopyFetcher), digester.clone());
        Fixture {
            _dir: dir,
            remote,
            central,
            digester,
            engine,
        }
    }

    #[test]
    fn register_then_find() {
        let fx = fixture();
        let ns = fx.engine.register("h1", "h1:/srv/sumdex.db").unwrap();
        assert!(ns.is_new());
        assert_eq!(fx.engine.find("h1").unwrap(), ns);
        assert!(matches!(
            fx.engine.register("h1", "elsewhere"),
            Err(SyncError::AlreadyExists(_))
        ));
        assert!(matches!(fx.engine.find("h2"), Err(SyncError::NotFound(_))));
    }

    #[test]
    fn register_and_sync_imports_every_record() {
        let fx = fixture();
        fx.publish(&[record("a", 1), record("b", 2)], 1_000);

        let outcome = fx.engine.register_and_sync("h1", fx.locator()).unwrap();
        assert_eq!(
            outcome,
            MergeOutcome::Merged(MergeReport {
                inserted: 2,
                updated: 0,
                unchanged: 0
            })
        );

        let ns = fx.engine.find("h1").unwrap();
        assert_eq!(ns.status, RecordStatus::Ok);
        assert_eq!(ns.snapshot.mtime, ts(1_000));
        assert!(ns.snapshot.digest.is_some());
        assert_eq!(fx.central.namespace_objects("h1").unwrap().len(), 2);
    }

    #[test]
    fn register_and_sync_rejects_taken_name_before_fetching() {
        let fx = fixture();
        fx.engine.register("h1", "anything").unwrap();
        // The locator does not exist; a fetch would fail with a Fetch error.
        assert!(matches!(
            fx.engine.register_and_sync("h1", "/no/such/catalog.db"),
            Err(SyncError::AlreadyExists(_))
        ));
    }

    #[test]
    fn unchanged_snapshot_short_circuits_on_metadata() {
        let fx = fixture();
        fx.publish(&[record("a", 1)], 1_000);
        fx.engine.register_and_sync("h1", fx.locator()).unwrap();
        let writes = fx.central.object_writes();
        fx.digester.reset();

        let outcome = fx.engine.sync("h1").unwrap();
        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(fx.central.object_writes(), writes);
        assert_eq!(fx.digester.calls(), 0);
    }

    #[test]
    fn touched_snapshot_refreshes_fingerprint_only() {
        let fx = fixture();
        fx.publish(&[record("a", 1)], 1_000);
        fx.engine.register_and_sync("h1", fx.locator()).unwrap();
        let writes = fx.central.object_writes();
        let before = fx.engine.find("h1").unwrap();

        set_mtime(&fx.remote, 2_000);
        let outcome = fx.engine.sync("h1").unwrap();
        assert_eq!(outcome, MergeOutcome::FingerprintRefreshed);
        assert_eq!(fx.central.object_writes(), writes);

        let after = fx.engine.find("h1").unwrap();
        assert_eq!(after.snapshot.mtime, ts(2_000));
        assert_eq!(after.snapshot.digest, before.snapshot.digest);

        // The refreshed fingerprint short-circuits the next sync on metadata.
        assert_eq!(fx.engine.sync("h1").unwrap(), MergeOutcome::Unchanged);
    }

    #[test]
    fn changed_snapshot_updates_m_inserts_rest_deletes_none() {
        let fx = fixture();
        fx.publish(&[record("a", 1), record("b", 2), record("gone", 3)], 1_000);
        fx.engine.register_and_sync("h1", fx.locator()).unwrap();
        let writes = fx.central.object_writes();

        // N = 4 records; M = 2 of them exist with different content.
        let mut b = record("b", 2);
        b.size = Some(99);
        fx.publish(&[record("a", 9), b, record("c", 4), record("d", 5)], 2_000);

        let outcome = fx.engine.sync("h1").unwrap();
        assert_eq!(
            outcome,
            MergeOutcome::Merged(MergeReport {
                inserted: 2,
                updated: 2,
                unchanged: 0
            })
        );
        assert_eq!(fx.central.object_writes(), writes + 4);

        let paths: Vec<_> = fx
            .central
            .namespace_objects("h1")
            .unwrap()
            .into_iter()
            .map(|r| r.record.path)
            .collect();
        assert_eq!(paths, vec!["a", "b", "c", "d", "gone"]);

        let a = fx
            .central
            .namespace_objects("h1")
            .unwrap()
            .into_iter()
            .find(|r| r.record.path == "a")
            .unwrap();
        assert_eq!(a.record.digest, Some(Digest::from_hash([9; 32])));
    }

    #[test]
    fn equal_rows_are_not_rewritten() {
        let fx = fixture();
        fx.publish(&[record("a", 1), record("b", 2)], 1_000);
        fx.engine.register_and_sync("h1", fx.locator()).unwrap();
        let writes = fx.central.object_writes();

        fx.publish(&[record("a", 1), record("b", 2), record("c", 3)], 2_000);
        let outcome = fx.engine.sync("h1").unwrap();
        assert_eq!(
            outcome,
            MergeOutcome::Merged(MergeReport {
                inserted: 1,
                updated: 0,
                unchanged: 2
            })
        );
        assert_eq!(fx.central.object_writes(), writes + 1);
    }

    #[test]
    fn namespaces_do_not_share_rows() {
        let fx = fixture();
        fx.publish(&[record("a", 1)], 1_000);
        fx.engine.register_and_sync("h1", fx.locator()).unwrap();
        fx.engine.register_and_sync("h2", fx.locator()).unwrap();
        assert_eq!(fx.central.namespace_objects("h1").unwrap().len(), 1);
        assert_eq!(fx.central.namespace_objects("h2").unwrap().len(), 1);
    }

    #[test]
    fn fetch_failure_leaves_namespace_untouched() {
        let fx = fixture();
        let ns = fx.engine.register("h1", "/no/such/catalog.db").unwrap();
        assert!(matches!(fx.engine.sync("h1"), Err(SyncError::Fetch { .. })));
        assert_eq!(fx.engine.find("h1").unwrap(), ns);
    }

    #[test]
    fn non_catalog_snapshot_fails_without_fingerprint_update() {
        let fx = fixture();
        std::fs::write(&fx.remote, b"not a database at all").unwrap();
        let ns = fx.engine.register("h1", fx.locator()).unwrap();
        assert!(matches!(fx.engine.sync("h1"), Err(SyncError::Store(_))));
        let after = fx.engine.find("h1").unwrap();
        assert!(after.is_new());
        assert_eq!(after, ns);
    }

    #[test]
    fn sync_of_unknown_namespace_is_not_found() {
        let fx = fixture();
        assert!(matches!(fx.engine.sync("ghost"), Err(SyncError::NotFound(_))));
    }
}
