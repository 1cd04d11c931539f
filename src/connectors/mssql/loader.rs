//! SQL Server loader (`type: mssql`)

use super::session::{self, ConnectionConfig, SqlClient};
use super::statement::InsertTemplate;
use crate::config::Settings;
use crate::envelope::{Envelope, FieldMapping};
use crate::etl::{LoadOutcome, Loader};
use crate::process_context::ProcessContext;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use serde::Deserialize;

/// Settings of an `mssql` load
#[derive(Debug, Clone, Deserialize)]
pub struct MssqlLoadConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default = "default_table")]
    pub table: String,
    /// Insert statement with `@field` placeholders
    #[serde(default)]
    pub insert_statement: String,
    /// Renames record fields to placeholder names
    #[serde(default, alias = "mappings")]
    pub mapping: FieldMapping,
}

fn default_table() -> String {
    "target_table".to_string()
}

/// Loader executing a parameterized insert per record
///
/// All inserts of one load share a transaction: either every record is
/// committed or none is.
pub struct MssqlLoader {
    ctx: ProcessContext,
    config: MssqlLoadConfig,
    template: InsertTemplate,
    client: Option<SqlClient>,
}

impl MssqlLoader {
    pub fn new(ctx: ProcessContext, config: MssqlLoadConfig, _settings: &Settings) -> Self {
        let template = InsertTemplate::parse(&config.insert_statement);
        Self {
            ctx,
            config,
            template,
            client: None,
        }
    }

    async fn insert_all(
        template: &InsertTemplate,
        mapping: &FieldMapping,
        client: &mut SqlClient,
        envelope: &Envelope,
    ) -> Result<usize> {
        for (index, record) in envelope.items.iter().enumerate() {
            let bound = template.bind(record, mapping);
            log::trace!("{} {:?}", bound.sql, bound.values);
            client
                .execute(bound.sql.as_str(), &bound.params())
                .await
                .with_context(|| format!("Insert failed for record {}", index + 1))?;
        }
        Ok(envelope.len())
    }

    async fn simple(client: &mut SqlClient, sql: &str) -> Result<()> {
        client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }
}

impl Loader for MssqlLoader {
    async fn setup(&mut self) -> Result<bool> {
        if self.config.insert_statement.trim().is_empty() {
            log::error!("{} No insert_statement configured", self.ctx);
            return Ok(false);
        }

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

    async fn load(&mut self, envelope: Envelope) -> Result<LoadOutcome> {
        if envelope.is_empty() {
            log::info!("{} No records to insert", self.ctx);
            return Ok(LoadOutcome::complete(0));
        }
        let Some(mut client) = self.client.take() else {
            eyre::bail!("load called before a connection was opened");
        };

        Self::simple(&mut client, "BEGIN TRANSACTION").await?;
        let inserted =
            Self::insert_all(&self.template, &self.config.mapping, &mut client, &envelope).await;
        let outcome = match inserted {
            Ok(inserted) => {
                Self::simple(&mut client, "COMMIT TRANSACTION").await?;
                log::info!("{} Inserted {} record(s)", self.ctx, inserted.green());
                LoadOutcome::complete(inserted)
            }
            Err(e) => {
                log::error!("{} Load failed, rolling back: {:#}", self.ctx, e);
                if let Err(rollback) = Self::simple(&mut client, "ROLLBACK TRANSACTION").await {
                    log::error!("{} Rollback failed: {:#}", self.ctx, rollback);
                }
                LoadOutcome::failed(0)
            }
        };

        self.client = Some(client);
        Ok(outcome)
    }
}
