use std::ffi::OsStr;

use serde::{Deserialize, Serialize};

/// Default file name of a local catalog database.
pub const DEFAULT_CATALOG_NAME: &str = "sumdex.db";

const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// How a file's catalog key is derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    /// Path relative to the scan root.
    #[default]
    Relative,
    /// Absolute path of the file.
    Absolute,
}

impl PathMode {
    pub fn from_abs_flag(abs: bool) -> Self {
        if abs {
            Self::Absolute
        } else {
            Self::Relative
        }
    }
}

/// Options for one scanner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    pub path_mode: PathMode,
    /// File name of the catalog itself; never cataloged, at any depth.
    pub reserved_name: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            path_mode: PathMode::Relative,
            reserved_name: DEFAULT_CATALOG_NAME.to_string(),
        }
    }
}

impl ScanConfig {
    pub fn new(path_mode: PathMode, reserved_name: impl Into<String>) -> Self {
        Self {
            path_mode,
            reserved_name: reserved_name.into(),
        }
    }

    /// Returns `true` for the catalog file and its SQLite sidecars.
    pub fn is_reserved(&self, file_name: &OsStr) -> bool {
        let Some(name) = file_name.to_str() else {
            return false;
        };
        let Some(rest) = name.strip_prefix(self.reserved_name.as_str()) else {
            return false;
        };
        rest.is_empty() || SIDECAR_SUFFIXES.contains(&rest)
    }
}
