//! Process configuration
//!
//! The configuration file lists process definitions and a few run-wide
//! settings. It may be YAML (`.yml`, `.yaml`) or JSON/JSON5 (`.json`,
//! `.json5`). Example:
//!
//! ```yaml
//! settings:
//!   debug_dir: debug
//!   process_timeout_secs: 900
//! processes:
//!   - name: Item Ledger Entries
//!     active: true
//!     extraction:
//!       type: gevisapi
//!       base_url: ${GEVIS_API_BASE_URL}
//!       endpoint: /api/gws/ecm/v1.0/itemLedgerEntries
//!     loading:
//!       type: csv
//!       path: data/output
//! ```

mod env;
mod process;

pub use env::{expand_env_in_value, expand_env_vars};
pub use process::{ProcessDefinition, StageSpec};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Run-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory for debug snapshots of raw and mapped data
    #[serde(default = "default_debug_dir")]
    pub debug_dir: PathBuf,

    /// Time budget for one process; unset means unbounded
    #[serde(default)]
    pub process_timeout_secs: Option<u64>,

    /// Timeout applied to every HTTP request
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,

    /// Number of processes allowed to run at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_debug_dir() -> PathBuf {
    PathBuf::from("debug")
}

fn default_max_parallel() -> usize {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_dir: default_debug_dir(),
            process_timeout_secs: None,
            http_timeout_secs: None,
            max_parallel: default_max_parallel(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub processes: Vec<ProcessDefinition>,
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json5,
}

impl ConfigFormat {
    /// Pick the format from a file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") | Some("json5") => Self::Json5,
            _ => Self::Yaml,
        }
    }
}

impl EtlConfig {
    /// Read and parse a configuration file, expanding `${VAR}` references
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path.display()))?;

        Self::parse(&content, ConfigFormat::from_path(path))
            .with_context(|| format!("Failed to parse configuration: {}", path.display()))
    }

    /// Parse configuration text in the given format
    ///
    /// `${VAR}` references are expanded after parsing, inside string values.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let mut document: serde_json::Value = match format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).context("Failed to parse YAML configuration")?
            }
            ConfigFormat::Json5 => {
                json5::from_str(content).context("Failed to parse JSON5 configuration")?
            }
        };
        if document.is_null() {
            document = serde_json::Value::Object(Default::default());
        }
        expand_env_in_value(&mut document);

        let config: Self =
            serde_json::from_value(document).context("Invalid configuration structure")?;
        log::debug!("Loaded {} process definition(s)", config.processes.len());
        Ok(config)
    }

    /// Number of processes marked active
    pub fn active_count(&self) -> usize {
        self.processes.iter().filter(|p| p.active).count()
    }

    /// Keep only the processes whose names are listed
    ///
    /// Unknown names are logged and ignored; an empty filter keeps everything.
    pub fn retain_named(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        for name in names {
            if !self.processes.iter().any(|p| &p.name == name) {
                log::warn!("Process '{}' not found in configuration, ignoring", name);
            }
        }
        self.processes.retain(|p| names.contains(&p.name));
    }
}
