//! Incremental scanner for sumdex catalogs.
//!
//! [`Scanner::scan`] walks a directory tree and brings one catalog up to
//! date. For each regular file it decides from metadata alone whether the
//! stored record is stale:
//!
//! 1. no record: digest the file and insert it (a lost insert race is
//!    counted, not fatal);
//! 2. record with unknown size: fill in the size only;
//! 3. same mtime: nothing to do, and nothing is hashed;
//! 4. different mtime: rehash, and rewrite the record only if the digest
//!    changed.
//!
//! Traversal, metadata and digest errors abort the scan.

pub mod config;
pub mod error;
pub mod report;
pub mod scanner;

pub use config::{PathMode, ScanConfig, DEFAULT_CATALOG_NAME};
pub use error::{ScanError, ScanResult};
pub use report::ScanReport;
pub use scanner::Scanner;
