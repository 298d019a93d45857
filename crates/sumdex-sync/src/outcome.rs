use std::fmt;

use serde::Serialize;

/// Row-level effect of a merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Snapshot records new to the namespace.
    pub inserted: usize,
    /// Stored records whose content differed from the snapshot.
    pub updated: usize,
    /// Stored records already equal to the snapshot.
    pub unchanged: usize,
}

impl MergeReport {
    pub fn writes(&self) -> usize {
        self.inserted + self.updated
    }
}

/// How far a merge had to go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Snapshot size and mtime matched the stored fingerprint; nothing was read.
    Unchanged,
    /// Snapshot bytes matched the stored digest; only the fingerprint was stored.
    FingerprintRefreshed,
    /// The snapshot was diffed row by row.
    Merged(MergeReport),
}

impl MergeOutcome {
    /// Namespaced rows written by this merge.
    pub fn writes(&self) -> usize {
        match self {
            Self::Merged(report) => report.writes(),
            _ => 0,
        }
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::FingerprintRefreshed => f.write_str("snapshot content unchanged, fingerprint refreshed"),
            Self::Merged(r) => write!(
                f,
                "merged: {} inserted, {} updated, {} unchanged",
                r.inserted, r.updated, r.unchanged
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_merges_write() {
        assert_eq!(MergeOutcome::Unchanged.writes(), 0);
        assert_eq!(MergeOutcome::FingerprintRefreshed.writes(), 0);
        let merged = MergeOutcome::Merged(MergeReport {
            inserted: 2,
            updated: 1,
            unchanged: 4,
        });
        assert_eq!(merged.writes(), 3);
        assert_eq!(merged.to_string(), "merged: 2 inserted, 1 updated, 4 unchanged");
    }

    #[test]
    fn json_shape_is_tagged() {
        let json = serde_json::to_value(MergeOutcome::Merged(MergeReport::default())).unwrap();
        assert_eq!(json["outcome"], "merged");
        assert_eq!(json["inserted"], 0);
        let json = serde_json::to_value(MergeOutcome::Unchanged).unwrap();
        assert_eq!(json["outcome"], "unchanged");
    }
}
