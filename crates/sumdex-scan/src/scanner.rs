use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sumdex_digest::Digester;
use sumdex_store::CatalogStore;
use sumdex_types::time::from_system_time;
use sumdex_types::{CatalogRecord, EntryKind, RecordContent, RecordStatus};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{PathMode, ScanConfig};
use crate::error::{ScanError, ScanResult};
use crate::report::ScanReport;

/// Walks directory trees and keeps a catalog current.
///
/// The digest of a file is only recomputed when its mtime differs from the
/// stored one; an unchanged tree therefore costs one metadata read and one
/// catalog lookup per file.
pub struct Scanner {
    store: Arc<dyn CatalogStore>,
    digester: Arc<dyn Digester>,
    config: ScanConfig,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        digester: Arc<dyn Digester>,
        config: ScanConfig,
    ) -> Self {
        Self {
            store,
            digester,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan each root in order. The first fatal error stops the whole run.
    pub fn scan_all<P: AsRef<Path>>(&self, roots: &[P]) -> ScanResult<ScanReport> {
        let mut total = ScanReport::default();
        for root in roots {
            total.absorb(&self.scan(root.as_ref())?);
        }
        Ok(total)
    }

    /// Visit every regular file under `root` (or `root` itself, if it is a
    /// file).
    ///
    /// A symbolic link to a file is cataloged under the link's own path with
    /// its target's metadata and content. Links to directories are not
    /// descended. A link whose target cannot be read stops the scan.
    pub fn scan(&self, root: &Path) -> ScanResult<ScanReport> {
        let root = match self.config.path_mode {
            PathMode::Absolute => {
                let abs = std::path::absolute(root).map_err(|source| ScanError::Io {
                    path: root.to_path_buf(),
                    source,
                })?;
                clean(&abs)
            }
            PathMode::Relative => root.to_path_buf(),
        };
        debug!(root = %root.display(), mode = ?self.config.path_mode, "scanning");

        let mut report = ScanReport::default();
        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if self.config.is_reserved(entry.file_name()) {
                continue;
            }
            let file_type = entry.file_type();
            let meta = if file_type.is_file() {
                entry.metadata()?
            } else if file_type.is_symlink() {
                let target = fs::metadata(entry.path()).map_err(|source| ScanError::Io {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
                if !target.is_file() {
                    debug!(path = %entry.path().display(), "skipping link to a non-file");
                    continue;
                }
                target
            } else {
                continue;
            };
            report.visited += 1;
            let key = catalog_key(&root, entry.path(), self.config.path_mode)?;
            self.scan_file(entry.path(), &key, &meta, &mut report)?;
        }

        info!(root = %root.display(), %report, "scan complete");
        Ok(report)
    }

    fn scan_file(
        &self,
        path: &Path,
        key: &str,
        meta: &Metadata,
        report: &mut ScanReport,
    ) -> ScanResult<()> {
        let size = meta.len();
        let io_err = |source: io::Error| ScanError::Io {
            path: path.to_path_buf(),
            source,
        };
        let modified = meta.modified().map_err(io_err)?;
        let mtime = from_system_time(modified)
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let Some(existing) = self.store.find_by_path(key)? else {
            let digest = self.digester.digest_file(path)?;
            let record = CatalogRecord::scanned(key, size, mtime, digest, Utc::now());
            debug!(path = key, "inserting");
            match self.store.insert(&record) {
                Ok(()) => {
                    info!(path = key, digest = %digest, "inserted");
                    report.inserted += 1;
                }
                Err(e) if e.is_conflict() => {
                    warn!(path = key, error = %e, "insert lost to an existing record, keeping it");
                    report.conflicts += 1;
                }
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        };

        if existing.size.is_none() {
            let rows = self.store.update_size(key, size, Utc::now())?;
            expect_one_row(key, rows, "update size");
            debug!(path = key, size, "updated size");
            report.size_repaired += 1;
            // A content change behind the repair is caught by the next scan.
            return Ok(());
        }

        if existing.mtime == mtime {
            report.unchanged += 1;
            return Ok(());
        }

        let digest = self.digester.digest_file(path)?;
        if existing.digest == Some(digest) {
            debug!(path = key, "mtime moved, content unchanged");
            report.touched += 1;
            return Ok(());
        }

        let content = RecordContent {
            kind: EntryKind::Regular,
            size: Some(size),
            mtime,
            digest: Some(digest),
            status: RecordStatus::Ok,
        };
        let rows = self.store.update_content(key, &content, Utc::now())?;
        expect_one_row(key, rows, "update content");
        info!(path = key, digest = %digest, "updated");
        report.updated += 1;
        Ok(())
    }
}

fn expect_one_row(key: &str, rows: usize, op: &str) {
    if rows != 1 {
        warn!(path = key, rows, op, "unexpected affected row count");
    }
}

/// Drop `.` and resolve `..` lexically in an absolute path, so one file has
/// one absolute key however its root was spelled.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the root stays at the root.
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Derive the catalog key of `path`, found while walking `root`.
fn catalog_key(root: &Path, path: &Path, mode: PathMode) -> ScanResult<String> {
    let key: PathBuf = match mode {
        PathMode::Absolute => path.to_path_buf(),
        PathMode::Relative => match path.strip_prefix(root) {
            Ok(rel) if rel.as_os_str().is_empty() => {
                // The root itself is a file.
                path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf())
            }
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        },
    };
    key.into_os_string()
        .into_string()
        .map_err(|raw| ScanError::NonUtf8Path(PathBuf::from(raw)))
}
