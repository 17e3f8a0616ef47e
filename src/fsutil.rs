// src/fsutil.rs

//! Atomic file replacement
//!
//! Control files are read by other tools while bundles are updated, so they
//! are always written to a temporary file in the target directory and renamed
//! into place.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Replace `path` with `contents`, creating parent directories as needed
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| {
        Error::IoError(format!("Failed to create directory {}: {}", parent.display(), e))
    })?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        Error::IoError(format!("Failed to move temp file to {}: {}", path.display(), e.error))
    })?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
