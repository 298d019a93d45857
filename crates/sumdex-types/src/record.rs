//! Catalog rows: one record per tracked path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::TypeError;

/// Classification of a cataloged path.
///
/// Only regular files are produced today; the tag is persisted so that other
/// kinds can be added without a schema change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    #[serde(rename = "file")]
    Regular,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "file",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::Regular),
            other => Err(TypeError::UnknownTag {
                field: "type",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle tag shared by catalog records and namespaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Registered but not yet completed.
    #[default]
    New,
    /// Complete and trusted.
    Ok,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ok => "ok",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "ok" => Ok(Self::Ok),
            other => Err(TypeError::UnknownTag {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// The content-describing fields of a record.
///
/// Two records describe the same file state exactly when their contents are
/// equal; bookkeeping timestamps are deliberately excluded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordContent {
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub mtime: DateTime<Utc>,
    pub digest: Option<Digest>,
    pub status: RecordStatus,
}

/// One tracked path within one catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Catalog key: absolute path, or path relative to the scan root.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Byte count; `None` while unknown (e.g. after an interrupted insert).
    pub size: Option<u64>,
    /// Last observed modification time.
    pub mtime: DateTime<Utc>,
    /// Content digest; `None` until first computed.
    pub digest: Option<Digest>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// A freshly scanned regular file whose digest has just been computed.
    pub fn scanned(
        path: impl Into<String>,
        size: u64,
        mtime: DateTime<Utc>,
        digest: Digest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Regular,
            size: Some(size),
            mtime,
            digest: Some(digest),
            status: RecordStatus::Ok,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot of the fields compared during change detection and merge.
    pub fn content(&self) -> RecordContent {
        RecordContent {
            kind: self.kind,
            size: self.size,
            mtime: self.mtime,
            digest: self.digest,
            status: self.status,
        }
    }

    /// Overwrite the content fields and bump `updated_at`.
    pub fn apply_content(&mut self, content: RecordContent, now: DateTime<Utc>) {
        self.kind = content.kind;
        self.size = content.size;
        self.mtime = content.mtime;
        self.digest = content.digest;
        self.status = content.status;
        self.updated_at = now;
    }

    /// Returns `true` if the record can be used for lookups: the size is
    /// known, the digest is present and the status is `ok`.
    pub fn is_trusted(&self) -> bool {
        self.size.is_some() && self.digest.is_some() && self.status == RecordStatus::Ok
    }
}

/// A catalog record held in the central store under a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacedRecord {
    pub namespace: String,
    #[serde(flatten)]
    pub record: CatalogRecord,
}

impl NamespacedRecord {
    pub fn new(namespace: impl Into<String>, record: CatalogRecord) -> Self {
        Self {
            namespace: namespace.into(),
            record,
        }
    }

    pub fn path(&self) -> &str {
        &self.record.path
    }
}
