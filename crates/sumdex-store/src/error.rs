use std::path::PathBuf;

use sumdex_types::TypeError;

/// Errors from catalog and central store operations.
///
/// `Conflict` and `AlreadyExists` are uniqueness violations; callers decide
/// whether they are fatal. Everything else is an I/O-class failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An insert lost against an existing row with the same key.
    #[error("record already exists: {0}")]
    Conflict(String),

    /// A namespace with this name is already registered.
    #[error("namespace already exists: {0}")]
    AlreadyExists(String),

    /// A namespaced record refers to a namespace that is not registered.
    #[error("namespace not registered: {0}")]
    NotFound(String),

    /// A persisted row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The file opened as a catalog has no catalog table.
    #[error("not a sumdex catalog: {}", .0.display())]
    NotACatalog(PathBuf),

    /// The file opened as a central store has no namespace table.
    #[error("not a sumdex central store: {}", .0.display())]
    NotACentralStore(PathBuf),

    /// Error from the SQLite backend.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A previous holder of the store lock panicked.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Returns `true` for uniqueness violations on insert.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::AlreadyExists(_))
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
