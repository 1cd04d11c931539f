//! SQL Server extractor (`type: mssql`)

use super::session::{self, ConnectionConfig, SqlClient};
use crate::config::Settings;
use crate::envelope::{Envelope, FieldMapping};
use crate::etl::Extractor;
use crate::process_context::ProcessContext;
use crate::storage::DebugSnapshots;
use eyre::Result;
use owo_colors::OwoColorize;
use serde::Deserialize;

/// Settings of an `mssql` extraction
#[derive(Debug, Clone, Deserialize)]
pub struct MssqlExtractConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default = "default_table")]
    pub table: String,
    /// Query to run verbatim; defaults to `SELECT * FROM {table}`
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, alias = "mappings")]
    pub mapping: FieldMapping,
    #[serde(default)]
    pub debug: bool,
}

fn default_name() -> String {
    "ETLExtractMSSQL".to_string()
}

fn default_table() -> String {
    "source_table".to_string()
}

impl MssqlExtractConfig {
    pub fn query(&self) -> String {
        self.query
            .clone()
            .unwrap_or_else(|| format!("SELECT * FROM {}", self.table))
    }
}

/// Extractor running a query against SQL Server
///
/// Column order of the result defines field order; the mapping renames
/// columns and keeps unmapped ones.
pub struct MssqlExtractor {
    ctx: ProcessContext,
    config: MssqlExtractConfig,
    client: Option<SqlClient>,
    snapshots: DebugSnapshots,
}

impl MssqlExtractor {
    pub fn new(ctx: ProcessContext, config: MssqlExtractConfig, settings: &Settings) -> Self {
        let snapshots = DebugSnapshots::new(&settings.debug_dir, &config.name, config.debug);
        Self {
            ctx,
            config,
            client: None,
            snapshots,
        }
    }

    async fn run_query(client: &mut SqlClient, query: &str) -> Result<Envelope> {
        let rows = client.simple_query(query).await?.into_first_result().await?;
        Ok(Envelope::new(
            rows.into_iter().map(session::row_to_record).collect(),
        ))
    }
}

impl Extractor for MssqlExtractor {
    async fn setup(&mut self) -> Result<bool> {
        let mut client = match session::connect(&self.config.connection).await {
            Ok(client) => client,
            Err(e) => {
                log::error!("{} Setup failed: {:#}", self.ctx, e);
                return Ok(false);
            }
        };
        log::info!(
            "{} Connected to {}",
            self.ctx,
            self.config.connection.to_string().cyan()
        );

        match session::table_exists(&mut client, &self.config.table).await {
            Ok(true) => log::info!("{} Table '{}' exists", self.ctx, self.config.table),
            Ok(false) => log::warn!("{} Table '{}' does not exist", self.ctx, self.config.table),
            Err(e) => {
                log::error!("{} Setup failed: {:#}", self.ctx, e);
                return Ok(false);
            }
        }

        self.client = Some(client);
        Ok(true)
    }

    async fn extract(&mut self) -> Result<Envelope> {
        let Some(client) = self.client.as_mut() else {
            eyre::bail!("extract called before a connection was opened");
        };

        let query = self.config.query();
        log::debug!("{} Running query: {}", self.ctx, query);
        let raw = match Self::run_query(client, &query).await {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("{} Data extraction failed: {:#}", self.ctx, e);
                return Ok(Envelope::empty());
            }
        };
        self.snapshots.record("debug_data", &raw);

        let envelope = self.config.mapping.rename_all(&raw);
        self.snapshots.record("debug_mapped_data", &envelope);
        log::info!("{} Extracted {} record(s)", self.ctx, envelope.len());
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_query() {
        let config: MssqlExtractConfig = serde_json::from_value(json!({
            "connection": {"server": "sql01"},
            "table": "Items"
        }))
        .unwrap();
        assert_eq!(config.query(), "SELECT * FROM Items");

        let config: MssqlExtractConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.query(), "SELECT * FROM source_table");
    }

    #[test]
    fn test_custom_query_verbatim() {
        let config: MssqlExtractConfig = serde_json::from_value(json!({
            "query": "SELECT TOP 10 No FROM Items WHERE Blocked = 0",
            "mappings": {"No": "no"}
        }))
        .unwrap();
        assert_eq!(config.query(), "SELECT TOP 10 No FROM Items WHERE Blocked = 0");
        assert_eq!(config.mapping.get("No"), Some("no"));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_setup() {
        let config: MssqlExtractConfig = serde_json::from_value(json!({
            "connection": {"server": "127.0.0.1,1"}
        }))
        .unwrap();
        let mut extractor = MssqlExtractor::new(
            ProcessContext::new("test").component("mssql"),
            config,
            &Settings::default(),
        );
        assert!(!extractor.setup().await.unwrap());
    }
}
