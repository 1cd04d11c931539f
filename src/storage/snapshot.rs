//! Debug snapshots of data passing through a stage
//!
//! When a stage is configured with `debug: true`, its raw and mapped data are
//! dumped as pretty JSON into the debug directory, named by connector and
//! timestamp:
//!
//! ```text
//! debug/Item Ledger Entries_2025-11-19_08-27-42_debug_data.json
//! debug/Item Ledger Entries_2025-11-19_08-27-42_debug_mapped_data.json
//! ```

use eyre::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Writes debug snapshots for one connector
#[derive(Debug, Clone)]
pub struct DebugSnapshots {
    dir: PathBuf,
    label: String,
    enabled: bool,
}

impl DebugSnapshots {
    pub fn new(dir: impl AsRef<Path>, label: impl Into<String>, enabled: bool) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            label: label.into(),
            enabled,
        }
    }

    /// File path for a snapshot with the given suffix, stamped now
    pub fn path_for(&self, suffix: &str) -> PathBuf {
        let now = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        self.dir
            .join(format!("{}_{}_{}.json", sanitize(&self.label), now, suffix))
    }

    /// Write a snapshot, returning where it went
    pub fn write<T: Serialize>(&self, suffix: &str, data: &T) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create debug directory: {}", self.dir.display()))?;

        let path = self.path_for(suffix);
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write debug snapshot: {}", path.display()))?;

        log::debug!("Saved debug data to {}", path.display());
        Ok(Some(path))
    }

    /// Write a snapshot, logging instead of failing
    pub fn record<T: Serialize>(&self, suffix: &str, data: &T) {
        if let Err(e) = self.write(suffix, data) {
            log::warn!("Could not save debug snapshot: {:#}", e);
        }
    }
}

/// Keep snapshot file names portable
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
