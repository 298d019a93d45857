use std::path::PathBuf;

/// Errors from digest computation.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("cannot digest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for digest operations.
pub type DigestResult<T> = Result<T, DigestError>;
