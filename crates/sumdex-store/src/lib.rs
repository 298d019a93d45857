//! Durable record stores for sumdex.
//!
//! Two stores share one record shape:
//!
//! - a **catalog** ([`CatalogStore`]) is one machine's table of files keyed
//!   by path, written by the scanner and shipped around as a snapshot;
//! - the **central store** ([`CentralStore`]) holds the namespace registry
//!   and the merged records of every registered catalog, keyed by
//!   `(namespace, path)`.
//!
//! Each trait has a SQLite backend for real use and an in-memory backend
//! for tests and embedding:
//!
//! - [`SqliteCatalog`] / [`MemoryCatalog`]
//! - [`SqliteCentral`] / [`MemoryCentral`]
//!
//! Inserts never overwrite: a duplicate key is reported as
//! [`StoreError::Conflict`] (or [`StoreError::AlreadyExists`] for
//! namespaces) and the existing row is left alone. A namespaced record can
//! only be inserted once its namespace is registered. Updates report the
//! number of rows they touched.

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCatalog, MemoryCentral};
pub use schema::{NAMESPACES_TABLE, OBJECTS_TABLE, UNKNOWN_SIZE};
pub use sqlite::{SqliteCatalog, SqliteCentral};
pub use traits::{CatalogStore, CentralStore};
