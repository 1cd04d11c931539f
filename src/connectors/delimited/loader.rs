//! Delimited file loader (`type: csv`)

use crate::config::Settings;
use crate::envelope::{Envelope, FieldMapping, value_to_text};
use crate::etl::{LoadOutcome, Loader};
use crate::process_context::ProcessContext;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Settings of a `csv` load
#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_filename")]
    pub filename: String,
    #[serde(default = "super::default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_true")]
    pub header: bool,
    #[serde(default, alias = "mappings")]
    pub mapping: FieldMapping,
    /// Replace an existing file instead of appending to it
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/output")
}

fn default_filename() -> String {
    "output.csv".to_string()
}

fn default_true() -> bool {
    true
}

/// Loader writing records to a delimited text file
///
/// Columns come from the mapping targets in order, or from the first record's
/// fields when no mapping is configured. Fields outside those columns are
/// ignored.
pub struct CsvLoader {
    ctx: ProcessContext,
    config: CsvConfig,
    delimiter: u8,
}

impl CsvLoader {
    /// # Errors
    /// Returns an error if the delimiter is not a single byte
    pub fn try_new(ctx: ProcessContext, config: CsvConfig, _settings: &Settings) -> Result<Self> {
        let delimiter = super::delimiter_byte(&config.delimiter)?;
        Ok(Self {
            ctx,
            config,
            delimiter,
        })
    }

    pub fn full_path(&self) -> PathBuf {
        self.config.path.join(&self.config.filename)
    }

    fn write(&self, envelope: &Envelope) -> Result<usize> {
        let records = if self.config.mapping.is_empty() {
            envelope.clone()
        } else {
            self.config.mapping.apply_all(envelope)
        };
        let columns: Vec<String> = match records.items.first() {
            Some(first) if self.config.mapping.is_empty() => first.keys().cloned().collect(),
            _ => self.config.mapping.targets().map(str::to_string).collect(),
        };

        let full_path = self.full_path();
        let exists = full_path.exists();
        let truncate = self.config.overwrite || !exists;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(truncate)
            .append(!truncate)
            .open(&full_path)
            .with_context(|| format!("Failed to open {}", full_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(file);

        if self.config.header && truncate {
            writer.write_record(&columns)?;
            log::debug!("{} CSV header written: {:?}", self.ctx, columns);
        }
        for record in &records.items {
            writer.write_record(
                columns
                    .iter()
                    .map(|column| record.get(column).map(value_to_text).unwrap_or_default()),
            )?;
        }
        writer.flush()?;

        Ok(records.len())
    }
}

impl Loader for CsvLoader {
    async fn setup(&mut self) -> Result<bool> {
        if let Err(e) = std::fs::create_dir_all(&self.config.path) {
            log::error!(
                "{} Failed to create output directory {}: {}",
                self.ctx,
                self.config.path.display(),
                e
            );
            return Ok(false);
        }

        let full_path = self.full_path();
        match (full_path.exists(), self.config.overwrite) {
            (true, true) => log::info!("{} {} will be overwritten", self.ctx, full_path.display()),
            (true, false) => log::info!("{} {} will be appended", self.ctx, full_path.display()),
            (false, _) => log::info!("{} {} will be created", self.ctx, full_path.display()),
        }
        Ok(true)
    }

    async fn load(&mut self, envelope: Envelope) -> Result<LoadOutcome> {
        if envelope.is_empty() {
            log::warn!("{} No items to write to CSV file", self.ctx);
            return Ok(LoadOutcome::complete(0));
        }

        match self.write(&envelope) {
            Ok(written) => {
                log::info!(
                    "{} Wrote {} record(s) to {}",
                    self.ctx,
                    written.green(),
                    self.full_path().display()
                );
                Ok(LoadOutcome::complete(written))
            }
            Err(e) => {
                log::error!("{} Load failed: {:#}", self.ctx, e);
                Ok(LoadOutcome::failed(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn loader(temp_dir: &TempDir, extra: serde_json::Value) -> CsvLoader {
        let mut config = json!({"path": temp_dir.path().join("out"), "filename": "result.csv"});
        if let (Some(config), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            config.extend(extra.clone());
        }
        CsvLoader::try_new(
            ProcessContext::new("test").component("csv"),
            serde_json::from_value(config).unwrap(),
            &Settings::default(),
        )
        .unwrap()
    }

    fn envelope() -> Envelope {
        Envelope::from_values(vec![
            json!({"id": "1", "name": "Widget", "qty": 3, "note": null}),
            json!({"id": "2", "name": "Gadget", "qty": 5.5, "extra": "x"}),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_with_first_record_columns() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = loader(&temp_dir, json!({"delimiter": ";"}));
        assert!(loader.setup().await.unwrap());

        let outcome = loader.load(envelope()).await.unwrap();
        assert_eq!(outcome, LoadOutcome::complete(2));

        let content = std::fs::read_to_string(loader.full_path()).unwrap();
        assert_eq!(content, "id;name;qty;note\n1;Widget;3;\n2;Gadget;5.5;\n");
    }

    #[tokio::test]
    async fn test_write_with_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = loader(&temp_dir, json!({"mappings": {"name": "Name", "id": "No", "gone": "Gone"}}));
        assert!(loader.setup().await.unwrap());

        loader.load(envelope()).await.unwrap();

        let content = std::fs::read_to_string(loader.full_path()).unwrap();
        assert_eq!(content, "Name,No,Gone\nWidget,1,\nGadget,2,\n");
    }

    #[tokio::test]
    async fn test_append_without_repeating_header() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = loader(&temp_dir, json!({"overwrite": false}));
        assert!(loader.setup().await.unwrap());

        loader.load(envelope()).await.unwrap();
        loader.load(envelope()).await.unwrap();

        let content = std::fs::read_to_string(loader.full_path()).unwrap();
        assert_eq!(content.matches("id,name").count(), 1);
        assert_eq!(content.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = loader(&temp_dir, json!({}));
        assert!(loader.setup().await.unwrap());

        loader.load(envelope()).await.unwrap();
        loader.load(envelope()).await.unwrap();

        let content = std::fs::read_to_string(loader.full_path()).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_empty_envelope_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = loader(&temp_dir, json!({}));
        assert!(loader.setup().await.unwrap());

        let outcome = loader.load(Envelope::empty()).await.unwrap();
        assert!(outcome.success);
        assert!(!loader.full_path().exists());
    }
}
