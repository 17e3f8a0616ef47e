// src/config.rs

//! Suite catalog configuration
//!
//! The catalog is a JSON file (by default `.apt-repos/suites.json` below the
//! project base directory) describing every suite the tool may scan:
//!
//! ```json
//! {
//!   "cache_dir": ".apt-repos/cache",
//!   "suites": [
//!     { "name": "ubuntu:noble", "url": "http://archive.ubuntu.com/ubuntu",
//!       "distribution": "noble", "components": ["main"], "architectures": ["amd64"] }
//!   ]
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Catalog location relative to the project base directory
pub const DEFAULT_CATALOG: &str = ".apt-repos/suites.json";

/// Cache location relative to the project base directory
pub const DEFAULT_CACHE_DIR: &str = ".apt-repos/cache";

/// One scannable suite of a Debian-style archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteDefinition {
    /// Suite identifier used in selectors and control files
    pub name: String,

    /// Archive base URL (`http(s)://`, `file://` or a plain path)
    pub url: String,

    /// Directory name below `dists/`
    pub distribution: String,

    #[serde(default = "default_components")]
    pub components: Vec<String>,

    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,

    /// Seconds a refreshed index stays valid; 0 always refreshes
    #[serde(default)]
    pub metadata_expire: u64,
}

fn default_components() -> Vec<String> {
    vec!["main".to_string()]
}

fn default_architectures() -> Vec<String> {
    vec!["amd64".to_string()]
}

/// The suite catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub suites: Vec<SuiteDefinition>,
}

impl CatalogConfig {
    /// Load the catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading suite catalog from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read suite catalog {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ParseError(format!("Invalid suite catalog: {}", e)))
    }

    /// Cache directory, resolved against `basedir` when relative
    pub fn cache_dir(&self, basedir: &Path) -> PathBuf {
        let dir = self
            .cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
        if dir.is_absolute() { dir } else { basedir.join(dir) }
    }

    /// Resolve a selector to suite definitions, sorted by name
    ///
    /// Selectors are comma separated. An entry ending in `:` matches every
    /// suite whose name starts with it; any other entry matches by name.
    pub fn select(&self, selector: &str) -> Vec<&SuiteDefinition> {
        let mut selected: Vec<&SuiteDefinition> = Vec::new();
        for part in selector.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            for suite in &self.suites {
                let matches = if part.ends_with(':') {
                    suite.name.starts_with(part)
                } else {
                    suite.name == part
                };
                if matches && !selected.iter().any(|s| s.name == suite.name) {
                    selected.push(suite);
                }
            }
        }
        selected.sort_by(|a, b| a.name.cmp(&b.name));
        selected
    }
}
