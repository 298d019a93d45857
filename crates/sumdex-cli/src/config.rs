use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Name of the config file looked up in the default locations.
pub const CONFIG_FILE_NAME: &str = "sumdex.toml";

/// Resolved settings for one invocation.
///
/// Built once in `main` from defaults, the config file, `SUMDEX_*`
/// environment variables and flags, in that order of increasing precedence.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Log level used when neither `RUST_LOG` nor `--debug`/`--verbose` is given.
    pub log_level: Option<String>,
    /// Key scanned files by absolute path.
    pub abs_mode: bool,
    /// Local catalog database.
    pub catalog: PathBuf,
    /// Central store database.
    pub central: PathBuf,
    /// Program run by the rsync snapshot fetcher.
    pub rsync: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            abs_mode: false,
            catalog: PathBuf::from("sumdex.db"),
            central: PathBuf::from("sumdex-central.db"),
            rsync: "rsync".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Candidate config files, most specific first.
    pub fn default_locations() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sumdex").join(CONFIG_FILE_NAME));
        }
        paths.push(PathBuf::from(CONFIG_FILE_NAME));
        paths
    }

    /// Load the config file.
    ///
    /// An explicit path must exist. Otherwise the first existing default
    /// location is used, and defaults apply when there is none. Returns the
    /// file that was read, if any.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::read(path)?, Some(path.to_path_buf())));
        }
        for path in Self::default_locations() {
            if path.is_file() {
                let config = Self::read(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Overlay `SUMDEX_LOG_LEVEL`, `SUMDEX_ABS_MODE` and `SUMDEX_RSYNC`.
    ///
    /// `SUMDEX_CATALOG` and `SUMDEX_CENTRAL` are read by the flag parser.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(level) = var("SUMDEX_LOG_LEVEL") {
            self.log_level = Some(level);
        }
        if let Some(abs) = var("SUMDEX_ABS_MODE") {
            self.abs_mode = parse_bool(&abs)
                .with_context(|| format!("SUMDEX_ABS_MODE: expected a boolean, got {abs:?}"))?;
        }
        if let Some(rsync) = var("SUMDEX_RSYNC") {
            self.rsync = rsync;
        }
        Ok(())
    }

    /// Log filter directive when `RUST_LOG` is unset.
    pub fn log_directive(&self, debug: bool, verbose: bool) -> String {
        if debug {
            "debug".to_string()
        } else if verbose {
            "info".to_string()
        } else {
            self.log_level.clone().unwrap_or_else(|| "warn".to_string())
        }
    }

    /// File name the scanner must never catalog.
    pub fn reserved_name(&self) -> String {
        self.catalog
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(sumdex_scan::DEFAULT_CATALOG_NAME)
            .to_string()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
