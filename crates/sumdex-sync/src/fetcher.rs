use std::fs::{self, File};
use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use sumdex_types::time::from_system_time;
use tempfile::{Builder, TempPath};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

/// A complete local copy of a remote catalog.
///
/// The file is deleted when the value is dropped, whatever way the sync
/// attempt that fetched it ends.
#[derive(Debug)]
pub struct FetchedSnapshot {
    path: TempPath,
    size: u64,
    mtime: DateTime<Utc>,
}

impl FetchedSnapshot {
    /// Take ownership of a finished temporary file and record its metadata.
    pub fn from_temp_path(path: TempPath) -> SyncResult<Self> {
        let meta = fs::metadata(&path).map_err(|e| SyncError::io(path.to_path_buf(), e))?;
        let modified = meta
            .modified()
            .map_err(|e| SyncError::io(path.to_path_buf(), e))?;
        let mtime = from_system_time(modified).map_err(|e| {
            SyncError::io(
                path.to_path_buf(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        Ok(Self {
            size: meta.len(),
            mtime,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mtime(&self) -> DateTime<Utc> {
        self.mtime
    }
}

/// Retrieves a snapshot of a remote catalog.
///
/// An implementation must return only once the local copy is complete, or
/// fail. Timeouts are the implementation's business.
pub trait SnapshotFetcher: Send + Sync {
    fn fetch(&self, locator: &str) -> SyncResult<FetchedSnapshot>;
}

fn fresh_temp_path() -> SyncResult<TempPath> {
    let file = Builder::new()
        .prefix("sumdex-snapshot-")
        .tempfile()
        .map_err(|e| SyncError::io(std::env::temp_dir(), e))?;
    Ok(file.into_temp_path())
}

/// Fetches snapshots with `rsync -vzP <locator> <tmpfile>`.
///
/// The locator is anything rsync accepts as a source, typically
/// `host:/path/to/sumdex.db`.
#[derive(Clone, Debug)]
pub struct RsyncFetcher {
    program: String,
}

impl Default for RsyncFetcher {
    fn default() -> Self {
        Self::new("rsync")
    }
}

impl RsyncFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SnapshotFetcher for RsyncFetcher {
    fn fetch(&self, locator: &str) -> SyncResult<FetchedSnapshot> {
        let tmp = fresh_temp_path()?;
        info!(locator, program = %self.program, "fetching snapshot");
        let output = Command::new(&self.program)
            .arg("-vzP")
            .arg(locator)
            .arg(&*tmp)
            .output()
            .map_err(|e| SyncError::Fetch {
                locator: locator.to_string(),
                reason: format!("cannot run {}: {e}", self.program),
            })?;
        debug!(stdout = %String::from_utf8_lossy(&output.stdout), "rsync finished");
        if !output.status.success() {
            return Err(SyncError::Fetch {
                locator: locator.to_string(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        FetchedSnapshot::from_temp_path(tmp)
    }
}

/// Fetches snapshots by copying a local file path, keeping its mtime.
///
/// Useful for catalogs on mounted filesystems and in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalCopyFetcher;

impl SnapshotFetcher for LocalCopyFetcher {
    fn fetch(&self, locator: &str) -> SyncResult<FetchedSnapshot> {
        let source = Path::new(locator);
        let modified = fs::metadata(source)
            .and_then(|m| m.modified())
            .map_err(|e| SyncError::Fetch {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        let tmp = fresh_temp_path()?;
        debug!(locator, tmp = %tmp.display(), "copying snapshot");
        fs::copy(source, &tmp).map_err(|e| SyncError::Fetch {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        File::options()
            .write(true)
            .open(&tmp)
            .and_then(|f| f.set_modified(modified))
            .map_err(|e| SyncError::io(tmp.to_path_buf(), e))?;
        FetchedSnapshot::from_temp_path(tmp)
    }
}
