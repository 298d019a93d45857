//! Foundation types for sumdex.
//!
//! This crate provides the data model shared by every other sumdex crate:
//! content digests, catalog records, and namespace bookkeeping.
//!
//! # Key Types
//!
//! - [`Digest`]: SHA-256 content digest, persisted as lowercase hex
//! - [`CatalogRecord`]: One tracked path within one catalog
//! - [`NamespacedRecord`]: A catalog record held centrally under a namespace
//! - [`NamespaceRecord`]: A registered remote catalog plus its [`Fingerprint`]
//! - [`RecordStatus`]: `new` / `ok` lifecycle tag

pub mod digest;
pub mod error;
pub mod namespace;
pub mod record;
pub mod time;

pub use digest::{optional_hex, Digest, DIGEST_LEN};
pub use error::TypeError;
pub use namespace::{Fingerprint, NamespaceRecord};
pub use record::{CatalogRecord, EntryKind, NamespacedRecord, RecordContent, RecordStatus};
