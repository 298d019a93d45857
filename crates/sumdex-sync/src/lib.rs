//! Namespace registry and snapshot merging for sumdex.
//!
//! A namespace is a remote catalog the central store tracks by name. Syncing
//! one fetches a fresh snapshot of its catalog file and merges it:
//!
//! - same snapshot size and mtime as last time: nothing to do;
//! - same whole-file digest: only the stored fingerprint is refreshed;
//! - otherwise: every snapshot record is inserted or updated under the
//!   namespace. Records missing from the snapshot are never deleted.
//!
//! Fetching is behind [`SnapshotFetcher`]; [`RsyncFetcher`] shells out to
//! `rsync`, [`LocalCopyFetcher`] copies a local path.

pub mod engine;
pub mod error;
pub mod fetcher;
pub mod outcome;

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use fetcher::{FetchedSnapshot, LocalCopyFetcher, RsyncFetcher, SnapshotFetcher};
pub use outcome::{MergeOutcome, MergeReport};
