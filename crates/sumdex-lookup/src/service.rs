use std::path::Path;
use std::sync::Arc;

use sumdex_digest::Digester;
use sumdex_store::{CatalogStore, CentralStore};
use sumdex_types::Digest;
use tracing::{debug, warn};

use crate::error::LookupResult;
use crate::hit::{CentralHit, LocalHit};

/// Digest each candidate file, skipping (and logging) the unreadable ones.
pub fn digest_candidates<P: AsRef<Path>>(digester: &dyn Digester, files: &[P]) -> Vec<Digest> {
    let mut digests = Vec::with_capacity(files.len());
    for file in files {
        let file = file.as_ref();
        match digester.digest_file(file) {
            Ok(digest) => {
                debug!(file = %file.display(), %digest, "digested candidate");
                digests.push(digest);
            }
            Err(e) => warn!(file = %file.display(), error = %e, "skipping candidate"),
        }
    }
    digests
}

/// Read-only queries over one local catalog.
///
/// Multiple prefixes are answered in argument order, each prefix's hits in
/// store order.
pub struct LocalLookup {
    store: Arc<dyn CatalogStore>,
    digester: Arc<dyn Digester>,
}

impl LocalLookup {
    pub fn new(store: Arc<dyn CatalogStore>, digester: Arc<dyn Digester>) -> Self {
        Self { store, digester }
    }

    /// Hits ordered by `(digest, path)` per prefix.
    pub fn by_digest_prefixes<S: AsRef<str>>(&self, prefixes: &[S]) -> LookupResult<Vec<LocalHit>> {
        let mut hits = Vec::new();
        for prefix in prefixes {
            let records = self.store.find_by_digest_prefix(prefix.as_ref())?;
            hits.extend(records.into_iter().map(LocalHit::from));
        }
        Ok(hits)
    }

    /// Hits ordered by path per prefix.
    pub fn by_path_prefixes<S: AsRef<str>>(&self, prefixes: &[S]) -> LookupResult<Vec<LocalHit>> {
        let mut hits = Vec::new();
        for prefix in prefixes {
            let records = self.store.find_by_path_prefix(prefix.as_ref())?;
            hits.extend(records.into_iter().map(LocalHit::from));
        }
        Ok(hits)
    }

    /// Catalog entries with the same content as any of `files`, ordered by path.
    pub fn by_files<P: AsRef<Path>>(&self, files: &[P]) -> LookupResult<Vec<LocalHit>> {
        let digests = digest_candidates(self.digester.as_ref(), files);
        if digests.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.store.find_by_digests(&digests)?;
        Ok(records.into_iter().map(LocalHit::from).collect())
    }
}

/// Read-only queries across every namespace of the central store.
pub struct CentralLookup {
    store: Arc<dyn CentralStore>,
    digester: Arc<dyn Digester>,
}

impl CentralLookup {
    pub fn new(store: Arc<dyn CentralStore>, digester: Arc<dyn Digester>) -> Self {
        Self { store, digester }
    }

    /// Hits ordered by `(digest, namespace, path)` per prefix.
    pub fn by_digest_prefixes<S: AsRef<str>>(
        &self,
        prefixes: &[S],
    ) -> LookupResult<Vec<CentralHit>> {
        let mut hits = Vec::new();
        for prefix in prefixes {
            let records = self.store.find_objects_by_digest_prefix(prefix.as_ref())?;
            hits.extend(records.into_iter().map(CentralHit::from));
        }
        Ok(hits)
    }

    /// Hits ordered by `(path, namespace)` per prefix.
    pub fn by_path_prefixes<S: AsRef<str>>(
        &self,
        prefixes: &[S],
    ) -> LookupResult<Vec<CentralHit>> {
        let mut hits = Vec::new();
        for prefix in prefixes {
            let records = self.store.find_objects_by_path_prefix(prefix.as_ref())?;
            hits.extend(records.into_iter().map(CentralHit::from));
        }
        Ok(hits)
    }

    /// Every copy, on any host, of the content of `files`.
    pub fn by_files<P: AsRef<Path>>(&self, files: &[P]) -> LookupResult<Vec<CentralHit>> {
        let digests = digest_candidates(self.digester.as_ref(), files);
        if digests.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.store.find_objects_by_digests(&digests)?;
        Ok(records.into_iter().map(CentralHit::from).collect())
    }
}
