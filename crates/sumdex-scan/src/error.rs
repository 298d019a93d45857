//! Error types for the scanner.

use std::path::PathBuf;

use sumdex_digest::DigestError;
use sumdex_store::StoreError;

/// Errors that abort a scan.
///
/// Every variant is fatal for the whole scan. Lost insert races are not
/// errors at all; they are counted in the report.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Directory traversal failed (unreadable directory, vanished entry, loop).
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A file could not be digested.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// The catalog rejected a read or write.
    #[error("catalog error: {0}")]
    Store(#[from] StoreError),

    /// File metadata or root resolution failed.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Catalog keys are UTF-8 strings.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Convenience alias for scan results.
pub type ScanResult<T> = Result<T, ScanError>;
