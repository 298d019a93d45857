//! Namespaces: centrally tracked remote catalogs and their merge fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::record::RecordStatus;

/// The `(size, mtime, digest)` triple identifying a snapshot file.
///
/// The digest is `None` until the snapshot has been read once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub digest: Option<Digest>,
}

impl Fingerprint {
    pub fn new(size: u64, mtime: DateTime<Utc>, digest: Option<Digest>) -> Self {
        Self {
            size,
            mtime,
            digest,
        }
    }

    /// Returns `true` if the cheap metadata half of the fingerprint matches.
    pub fn same_metadata(&self, size: u64, mtime: &DateTime<Utc>) -> bool {
        self.size == size && self.mtime == *mtime
    }
}

/// A registered remote catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    /// Operator-chosen, globally unique name.
    pub name: String,
    /// Opaque address handed to the snapshot fetcher.
    pub source_locator: String,
    /// Fingerprint of the last snapshot successfully merged.
    pub snapshot: Fingerprint,
    /// `new` until the first successful merge, `ok` afterwards.
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NamespaceRecord {
    /// A namespace that has never been merged.
    pub fn new(
        name: impl Into<String>,
        source_locator: impl Into<String>,
        snapshot: Fingerprint,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            source_locator: source_locator.into(),
            snapshot,
            status: RecordStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_new(&self) -> bool {
        self.status == RecordStatus::New
    }

    /// Record a successful merge of the snapshot identified by `fingerprint`.
    pub fn mark_merged(&mut self, fingerprint: Fingerprint, now: DateTime<Utc>) {
        self.snapshot = fingerprint;
        self.status = RecordStatus::Ok;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn new_namespace_starts_new() {
        let ns = NamespaceRecord::new("h1", "h1:/data/sumdex.db", Fingerprint::new(10, ts(1), None), ts(2));
        assert!(ns.is_new());
        assert_eq!(ns.snapshot.digest, None);
    }

    #[test]
    fn mark_merged_moves_to_ok() {
        let mut ns = NamespaceRecord::new("h1", "loc", Fingerprint::new(10, ts(1), None), ts(2));
        let fp = Fingerprint::new(20, ts(3), Some(Digest::from_hash([7; 32])));
        ns.mark_merged(fp.clone(), ts(4));
        assert!(!ns.is_new());
        assert_eq!(ns.snapshot, fp);
        assert_eq!(ns.created_at, ts(2));
        assert_eq!(ns.updated_at, ts(4));
    }

    #[test]
    fn metadata_match_requires_size_and_mtime() {
        let fp = Fingerprint::new(10, ts(1), None);
        assert!(fp.same_metadata(10, &ts(1)));
        assert!(!fp.same_metadata(11, &ts(1)));
        assert!(!fp.same_metadata(10, &ts(2)));
    }
}
