//! Business object loader (`type: d3businessobjects`)
//!
//! Loads records into a custom business object entity:
//! 1. Resolve the model by name from `GET /businessobjects/core/models/customModels`
//! 2. Create the entity in that model if it is missing
//! 3. Optionally truncate the entity set
//! 4. Upsert records in `$batch` calls of `batch_size` `PUT` requests

use super::batch::{batch_payload, build_batch_requests, failed_items};
use super::schema::{BusinessObjectsConfig, EntityKey, RemoteSchema, model_id};
use crate::client::{ApiClient, Auth};
use crate::config::Settings;
use crate::envelope::{Envelope, Record};
use crate::etl::{LoadOutcome, Loader};
use crate::process_context::ProcessContext;
use crate::storage::DebugSnapshots;
use eyre::{Result, eyre};
use owo_colors::OwoColorize;
use reqwest::Method;
use serde_json::{Value, json};
use std::time::Duration;

const MODELS_PATH: &str = "/businessobjects/core/models/customModels";

/// Where the loader stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Uninitialized,
    SchemaVerified,
    EntityVerified,
    EntityCreated,
    Truncated,
    Loaded,
    Failed,
}

/// Loader for custom business object entities
///
/// Batches are independent: a rejected item inside a batch is logged and the
/// batch still counts, while a batch call that fails outright stops the load.
/// Nothing is rolled back.
pub struct BusinessObjectsLoader {
    ctx: ProcessContext,
    config: BusinessObjectsConfig,
    client: ApiClient,
    schema: RemoteSchema,
    key: EntityKey,
    state: LoaderState,
    snapshots: DebugSnapshots,
}

impl BusinessObjectsLoader {
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL
    pub fn try_new(
        ctx: ProcessContext,
        config: BusinessObjectsConfig,
        settings: &Settings,
    ) -> Result<Self> {
        let client = ApiClient::try_new(
            &config.base_url,
            Auth::Bearer(config.api_key.clone()),
            settings.http_timeout_secs.map(Duration::from_secs),
        )?;
        let schema = RemoteSchema::from_config(&config);
        let key = EntityKey::from_config(&config.entity);
        let snapshots = DebugSnapshots::new(&settings.debug_dir, &config.name, config.debug);

        log::debug!("{} Initialized with name {}", ctx, config.name.cyan());
        Ok(Self {
            ctx,
            config,
            client,
            schema,
            key,
            state: LoaderState::Uninitialized,
            snapshots,
        })
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn schema(&self) -> &RemoteSchema {
        &self.schema
    }

    fn batch_path(&self) -> String {
        format!("/businessobjects/custom/{}/$batch", self.schema.model_name)
    }

    fn clear_path(&self) -> String {
        format!(
            "/businessobjects/custom/{}/bo.clearEntitySet",
            self.schema.model_name
        )
    }

    /// Resolve the model and make sure the entity exists
    async fn verify_schema(&mut self) -> Result<bool> {
        let listing = self.client.send_json(Method::GET, MODELS_PATH, None).await?;

        let Some(model) = self.schema.find_model(&listing) else {
            log::error!(
                "{} Model '{}' does not exist",
                self.ctx,
                self.schema.model_name
            );
            return Ok(false);
        };
        let id = model_id(model)
            .ok_or_else(|| eyre!("Model '{}' has no id", self.schema.model_name))?;
        log::info!(
            "{} Model '{}' exists with ID {}",
            self.ctx,
            self.schema.model_name,
            id
        );
        let has_entity = self.schema.model_has_entity(model);
        self.schema.model_id = Some(id.clone());
        self.state = LoaderState::SchemaVerified;

        if has_entity {
            log::debug!("{} Entity '{}' exists", self.ctx, self.schema.entity_name);
            self.state = LoaderState::EntityVerified;
            return Ok(true);
        }

        log::info!(
            "{} Entity '{}' does not exist in model '{}', creating it",
            self.ctx,
            self.schema.entity_name,
            self.schema.model_name
        );
        let path = format!("{}/{}/entityTypes", MODELS_PATH, id);
        self.client
            .send_json(Method::POST, &path, Some(&self.schema.entity_definition))
            .await?;
        log::info!(
            "{} Entity '{}' created",
            self.ctx,
            self.schema.entity_name.green()
        );
        self.state = LoaderState::EntityCreated;
        Ok(true)
    }

    async fn truncate(&self) -> Result<()> {
        log::info!(
            "{} Truncating entity '{}' in model '{}'",
            self.ctx,
            self.schema.entity_name,
            self.schema.model_name
        );
        let payload = json!({
            "entitySet": self.schema.entity_plural,
            "mode": "truncate",
        });
        self.client
            .send_json(Method::POST, &self.clear_path(), Some(&payload))
            .await?;
        Ok(())
    }

    /// Send one batch; returns the number of requests submitted
    async fn send_batch(&self, number: usize, records: &[Record]) -> Result<usize> {
        let mapped: Vec<Record> = records
            .iter()
            .map(|record| self.config.mapping.apply(record))
            .collect();
        let requests = build_batch_requests(&mapped, &self.key, &self.schema.entity_plural);
        if requests.is_empty() {
            log::warn!("{} No valid requests in batch {}, skipping", self.ctx, number);
            return Ok(0);
        }

        let payload = batch_payload(&requests);
        self.snapshots
            .record(&format!("debug_batch_{}", number), &payload);
        log::debug!(
            "{} Executing batch {} with {} request(s)",
            self.ctx,
            number,
            requests.len()
        );

        let response = self
            .client
            .send_json(Method::POST, &self.batch_path(), Some(&payload))
            .await?;
        for failed in failed_items(&response) {
            log::warn!(
                "{} Batch item {} failed with status {}: {}",
                self.ctx,
                failed.id,
                failed.status,
                failed.body
            );
        }
        Ok(requests.len())
    }
}

impl Loader for BusinessObjectsLoader {
    async fn setup(&mut self) -> Result<bool> {
        match self.verify_schema().await {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.state = LoaderState::Failed;
                Ok(false)
            }
            Err(e) => {
                log::error!("{} Setup failed: {:#}", self.ctx, e);
                self.state = LoaderState::Failed;
                Ok(false)
            }
        }
    }

    async fn load(&mut self, envelope: Envelope) -> Result<LoadOutcome> {
        if envelope.is_empty() {
            log::warn!("{} No items to load", self.ctx);
            self.state = LoaderState::Loaded;
            return Ok(LoadOutcome::complete(0));
        }

        if self.config.truncate_before_load {
            if let Err(e) = self.truncate().await {
                log::error!("{} Failed to truncate entity before load: {:#}", self.ctx, e);
                self.state = LoaderState::Failed;
                return Ok(LoadOutcome::failed(0));
            }
            self.state = LoaderState::Truncated;
        }

        let batch_size = self.config.effective_batch_size();
        let total = envelope.len();
        let batches = total.div_ceil(batch_size);
        let mut submitted = 0;

        for (index, chunk) in envelope.items.chunks(batch_size).enumerate() {
            let number = index + 1;
            log::info!(
                "{} Processing batch {}/{} ({} item(s))",
                self.ctx,
                number,
                batches,
                chunk.len()
            );
            match self.send_batch(number, chunk).await {
                Ok(count) => submitted += count,
                Err(e) => {
                    log::error!("{} Batch {} failed: {:#}", self.ctx, number, e);
                    self.state = LoaderState::Failed;
                    return Ok(LoadOutcome::failed(submitted));
                }
            }
        }

        log::info!(
            "{} Loaded {}/{} item(s)",
            self.ctx,
            submitted.green(),
            total
        );
        self.state = LoaderState::Loaded;
        Ok(LoadOutcome::complete(submitted))
    }
}
