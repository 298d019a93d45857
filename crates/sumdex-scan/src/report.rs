use std::fmt;

use serde::Serialize;

/// What one scan did, file by file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Regular files considered (reserved names excluded).
    pub visited: usize,
    /// New records written.
    pub inserted: usize,
    /// Records whose unknown size was filled in.
    pub size_repaired: usize,
    /// Records rewritten after a content change.
    pub updated: usize,
    /// Files whose mtime moved but whose digest did not.
    pub touched: usize,
    /// Files skipped on an unchanged mtime.
    pub unchanged: usize,
    /// Inserts that lost to an existing row.
    pub conflicts: usize,
}

impl ScanReport {
    /// Number of store writes this scan performed.
    pub fn mutations(&self) -> usize {
        self.inserted + self.size_repaired + self.updated
    }

    /// Fold another root's report into this one.
    pub fn absorb(&mut self, other: &ScanReport) {
        self.visited += other.visited;
        self.inserted += other.inserted;
        self.size_repaired += other.size_repaired;
        self.updated += other.updated;
        self.touched += other.touched;
        self.unchanged += other.unchanged;
        self.conflicts += other.conflicts;
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} inserted, {} updated, {} size repaired, {} touched, {} unchanged, {} conflicts",
            self.visited,
            self.inserted,
            self.updated,
            self.size_repaired,
            self.touched,
            self.unchanged,
            self.conflicts
        )
    }
}
