//! SQL schemas for the local catalog and the central store.
//!
//! File mtimes are INTEGER seconds since the Unix epoch plus an INTEGER
//! `*_nsec` column of subsecond nanoseconds. `created_at` and `updated_at`
//! are INTEGER nanoseconds. `size = -1` means unknown, and an empty `digest`
//! means not computed yet.

/// Name of the table holding records, in both databases.
pub const OBJECTS_TABLE: &str = "objects";

/// Name of the central store's namespace registry table.
pub const NAMESPACES_TABLE: &str = "namespaces";

/// Persisted value of an unknown size.
pub const UNKNOWN_SIZE: i64 = -1;

pub(crate) const CATALOG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS objects (
    id INTEGER PRIMARY KEY,
    path TEXT UNIQUE NOT NULL,
    type TEXT NOT NULL,
    size INTEGER NOT NULL,
    mtime INTEGER NOT NULL,
    mtime_nsec INTEGER NOT NULL,
    digest TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS objects_path ON objects (path);
CREATE INDEX IF NOT EXISTS objects_digest_path ON objects (digest, path);
CREATE INDEX IF NOT EXISTS objects_mtime ON objects (mtime);
CREATE INDEX IF NOT EXISTS objects_updated_at ON objects (updated_at);
";

pub(crate) const CENTRAL_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS namespaces (
    id INTEGER PRIMARY KEY,
    name TEXT UNIQUE NOT NULL,
    source_locator TEXT NOT NULL,
    snapshot_size INTEGER NOT NULL,
    snapshot_mtime INTEGER NOT NULL,
    snapshot_mtime_nsec INTEGER NOT NULL,
    snapshot_digest TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS objects (
    id INTEGER PRIMARY KEY,
    namespace TEXT NOT NULL REFERENCES namespaces (name),
    path TEXT NOT NULL,
    type TEXT NOT NULL,
    size INTEGER NOT NULL,
    mtime INTEGER NOT NULL,
    mtime_nsec INTEGER NOT NULL,
    digest TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (namespace, path)
);
CREATE INDEX IF NOT EXISTS objects_namespace_path ON objects (namespace, path);
CREATE INDEX IF NOT EXISTS objects_digest_path ON objects (digest, path);
CREATE INDEX IF NOT EXISTS objects_path ON objects (path);
CREATE INDEX IF NOT EXISTS objects_updated_at ON objects (updated_at);
";

/// Build a `LIKE` pattern matching every string that starts with `prefix`.
///
/// `\`, `%` and `_` in the prefix are escaped; queries must use
/// `ESCAPE '\'`.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_metacharacters() {
        assert_eq!(like_prefix("abc"), "abc%");
        assert_eq!(like_prefix(""), "%");
        assert_eq!(like_prefix("a_b%c\\d"), "a\\_b\\%c\\\\d%");
    }
}
