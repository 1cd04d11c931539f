//! Delimited file extractor (`type: csvfile`)

use crate::config::Settings;
use crate::envelope::{Envelope, FieldMapping, Record};
use crate::etl::Extractor;
use crate::process_context::ProcessContext;
use crate::storage::{DebugSnapshots, relocate_file, resolve_glob_path};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Settings of a `csvfile` extraction
#[derive(Debug, Clone, Deserialize)]
pub struct CsvFileConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// File to read; a trailing `*` picks the first matching `.csv` file
    #[serde(default)]
    pub file_path: String,
    /// Where to move the file after reading (directory or file path)
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default = "super::default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Field names to use instead of the header line
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default)]
    pub mapping: FieldMapping,
    #[serde(default)]
    pub debug: bool,
}

fn default_name() -> String {
    "ETLExtractCSVFile".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

/// Extractor for delimited text files
///
/// Lines are split on the delimiter without any quote handling. Lines shorter
/// than the header get null for their missing trailing fields; surplus values
/// are ignored.
pub struct CsvFileExtractor {
    ctx: ProcessContext,
    config: CsvFileConfig,
    delimiter: u8,
    source: Option<PathBuf>,
    snapshots: DebugSnapshots,
}

impl CsvFileExtractor {
    /// # Errors
    /// Returns an error if the delimiter is not a single byte
    pub fn try_new(ctx: ProcessContext, config: CsvFileConfig, settings: &Settings) -> Result<Self> {
        let delimiter = super::delimiter_byte(&config.delimiter)?;
        let snapshots = DebugSnapshots::new(&settings.debug_dir, &config.name, config.debug);
        Ok(Self {
            ctx,
            config,
            delimiter,
            source: None,
            snapshots,
        })
    }

    /// Parse file contents into records
    fn parse(&self, text: &str) -> Result<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quoting(false)
            .flexible(true)
            .has_headers(false)
            .from_reader(text.as_bytes());

        let mut rows = reader.records();
        let header: Vec<String> = if self.config.has_header {
            match rows.next() {
                Some(row) => row?.iter().map(|s| s.trim().to_string()).collect(),
                None => return Ok(Vec::new()),
            }
        } else {
            Vec::new()
        };
        let columns = if self.config.columns.is_empty() {
            header
        } else {
            self.config.columns.clone()
        };

        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            let record: Record = columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let value = row
                        .get(i)
                        .map(|v| Value::String(v.trim_end_matches('\r').to_string()))
                        .unwrap_or(Value::Null);
                    (column.clone(), value)
                })
                .collect();
            records.push(record);
        }
        Ok(records)
    }

    fn read_and_relocate(&self, path: &Path) -> Result<Vec<Record>> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let text = decode(&bytes, &self.config.encoding)?;
        let records = self.parse(&text)?;
        self.snapshots.record("debug_data", &json!({ "raw_data": records }));

        if let Some(save_path) = self.config.save_path.as_deref().filter(|s| !s.is_empty()) {
            let moved = relocate_file(path, save_path)?;
            log::info!("{} Moved file to {}", self.ctx, moved.display());
        }
        Ok(records)
    }
}

/// Decode file bytes in the configured encoding
fn decode(bytes: &[u8], encoding: &str) -> Result<String> {
    match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" | "utf-8-sig" => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8(bytes.to_vec()).context("File is not valid UTF-8")
        }
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        other => {
            log::warn!("Unsupported encoding '{}', decoding as lossy UTF-8", other);
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Extractor for CsvFileExtractor {
    async fn setup(&mut self) -> Result<bool> {
        if self.config.file_path.is_empty() {
            log::error!("{} No file path provided", self.ctx);
            return Ok(false);
        }
        if !self.config.has_header && self.config.columns.is_empty() {
            log::error!("{} has_header is false but no columns are configured", self.ctx);
            return Ok(false);
        }

        let path = match resolve_glob_path(&self.config.file_path, "csv") {
            Ok(Some(path)) => path,
            Ok(None) => {
                log::error!("{} No CSV file matches {}", self.ctx, self.config.file_path);
                return Ok(false);
            }
            Err(e) => {
                log::error!("{} {:#}", self.ctx, e);
                return Ok(false);
            }
        };
        if !path.is_file() {
            log::error!("{} File not found: {}", self.ctx, path.display());
            return Ok(false);
        }

        log::info!("{} Reading {}", self.ctx, path.display().cyan());
        self.source = Some(path);
        Ok(true)
    }

    async fn extract(&mut self) -> Result<Envelope> {
        let Some(path) = self.source.clone() else {
            eyre::bail!("extract called before a source file was resolved");
        };

        let records = match self.read_and_relocate(&path) {
            Ok(records) => records,
            Err(e) => {
                log::error!("{} Error extracting data from CSV file: {:#}", self.ctx, e);
                return Ok(Envelope::empty());
            }
        };

        let envelope = self.config.mapping.rename_all(&Envelope::new(records));
        self.snapshots.record("debug_mapped_data", &envelope);
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extractor(config: serde_json::Value) -> CsvFileExtractor {
        CsvFileExtractor::try_new(
            ProcessContext::new("test").component("csvfile"),
            serde_json::from_value(config).unwrap(),
            &Settings::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_with_header_and_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.csv");
        std::fs::write(&file, "no;name;amount\r\nA1;Widget;3\nA2;Gadget\n").unwrap();

        let mut extractor = extractor(json!({
            "file_path": file.to_str().unwrap(),
            "delimiter": ";",
            "mapping": {"no": "id"}
        }));
        assert!(extractor.setup().await.unwrap());

        let envelope = extractor.extract().await.unwrap();
        assert_eq!(envelope.len(), 2);
        assert_eq!(
            envelope.items[0],
            *json!({"id": "A1", "name": "Widget", "amount": "3"}).as_object().unwrap()
        );
        assert_eq!(envelope.items[1]["amount"], Value::Null);
        // file stays put without save_path
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_quotes_are_not_special() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.csv");
        std::fs::write(&file, "a,b\n\"x,y\"\n").unwrap();

        let mut extractor = extractor(json!({"file_path": file.to_str().unwrap()}));
        assert!(extractor.setup().await.unwrap());

        let envelope = extractor.extract().await.unwrap();
        assert_eq!(envelope.items[0]["a"], "\"x");
        assert_eq!(envelope.items[0]["b"], "y\"");
    }

    #[tokio::test]
    async fn test_glob_and_relocation() {
        let temp_dir = TempDir::new().unwrap();
        let inbox = temp_dir.path().join("in");
        let archive = temp_dir.path().join("archive");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::create_dir_all(&archive).unwrap();
        std::fs::write(inbox.join("b.csv"), "id\n2\n").unwrap();
        std::fs::write(inbox.join("a.csv"), "id\n1\n").unwrap();

        let mut extractor = extractor(json!({
            "file_path": format!("{}/*", inbox.display()),
            "save_path": archive.to_str().unwrap()
        }));
        assert!(extractor.setup().await.unwrap());

        let envelope = extractor.extract().await.unwrap();
        assert_eq!(envelope.items[0]["id"], "1");
        assert!(archive.join("a.csv").exists());
        assert!(!inbox.join("a.csv").exists());
        assert!(inbox.join("b.csv").exists());
    }

    #[tokio::test]
    async fn test_headerless_file_uses_columns() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.csv");
        std::fs::write(&file, "1|x\n2|y\n").unwrap();

        let mut extractor = extractor(json!({
            "file_path": file.to_str().unwrap(),
            "delimiter": "|",
            "has_header": false,
            "columns": ["id", "code"]
        }));
        assert!(extractor.setup().await.unwrap());

        let envelope = extractor.extract().await.unwrap();
        assert_eq!(envelope.len(), 2);
        assert_eq!(envelope.items[1]["code"], "y");
    }

    #[tokio::test]
    async fn test_missing_file_fails_setup() {
        let mut extractor = extractor(json!({"file_path": "/nonexistent/data.csv"}));
        assert!(!extractor.setup().await.unwrap());

        let mut extractor = extractor_without_path();
        assert!(!extractor.setup().await.unwrap());
    }

    fn extractor_without_path() -> CsvFileExtractor {
        extractor(json!({}))
    }

    #[test]
    fn test_multibyte_delimiter_rejected() {
        let result = CsvFileExtractor::try_new(
            ProcessContext::new("test"),
            serde_json::from_value(json!({"delimiter": ";;"})).unwrap(),
            &Settings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode(b"M\xfcller", "ISO-8859-1").unwrap(), "Müller");
        assert_eq!(decode(b"\xEF\xBB\xBFid", "utf-8").unwrap(), "id");
        assert!(decode(b"M\xfcller", "utf-8").is_err());
    }
}
