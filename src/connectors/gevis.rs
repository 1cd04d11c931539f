//! Business Central API extractor (`type: gevisapi`)
//!
//! Pulls one page of records from a Business Central (or gevis ECM) endpoint
//! using an OAuth client-credentials token.

use crate::client::{BUSINESS_CENTRAL_SCOPE, ClientCredentials};
use crate::config::Settings;
use crate::envelope::{Envelope, FieldMapping, Record};
use crate::etl::Extractor;
use crate::process_context::ProcessContext;
use crate::storage::DebugSnapshots;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Settings of a `gevisapi` extraction
#[derive(Debug, Clone, Deserialize)]
pub struct GevisConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub authorization: Authorization,
    #[serde(default)]
    pub erp_tenant_id: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub query_parameters: Map<String, Value>,
    #[serde(default)]
    pub mapping: FieldMapping,
    /// Overrides the Microsoft token endpoint derived from `erp_tenant_id`
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

fn default_name() -> String {
    "ETLExtractGevisApi".to_string()
}

impl GevisConfig {
    /// Request URL: `base_url + endpoint + "?" + k=v&...`
    ///
    /// Query values are inserted as written; encode them in the
    /// configuration if they need it.
    pub fn request_url(&self) -> String {
        let query = self
            .query_parameters
            .iter()
            .map(|(key, value)| format!("{}={}", key, crate::envelope::value_to_text(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}{}?{}", self.base_url, self.endpoint, query)
    }

    fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            token_url: self
                .token_url
                .clone()
                .unwrap_or_else(|| ClientCredentials::microsoft_token_url(&self.erp_tenant_id)),
            client_id: self.authorization.client_id.clone(),
            client_secret: self.authorization.client_secret.clone(),
            scope: self
                .scope
                .clone()
                .unwrap_or_else(|| BUSINESS_CENTRAL_SCOPE.to_string()),
        }
    }
}

/// Extractor for Business Central style OData endpoints
///
/// The response's `value` array is projected through the mapping. A
/// non-success response or a network error yields an empty envelope.
pub struct GevisExtractor {
    ctx: ProcessContext,
    config: GevisConfig,
    client: Client,
    token: Option<String>,
    snapshots: DebugSnapshots,
}

impl GevisExtractor {
    pub fn try_new(ctx: ProcessContext, config: GevisConfig, settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = settings.http_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        let snapshots = DebugSnapshots::new(&settings.debug_dir, &config.name, config.debug);

        log::debug!("{} Initialized with name {}", ctx, config.name.cyan());
        Ok(Self {
            ctx,
            config,
            client,
            token: None,
            snapshots,
        })
    }

    async fn fetch(&self, token: &str) -> Result<Value> {
        let url = self.config.request_url();
        log::debug!("{} GET {}", self.ctx, url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            eyre::bail!("Request failed with status {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse response body")
    }

    fn map_items(&self, data: &Value) -> Envelope {
        let items: Vec<Record> = data
            .get("value")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|record| self.config.mapping.apply(record))
                    .collect()
            })
            .unwrap_or_default();
        Envelope::new(items)
    }
}

impl Extractor for GevisExtractor {
    async fn setup(&mut self) -> Result<bool> {
        let credentials = self.config.credentials();
        match credentials.exchange(&self.client).await {
            Ok(token) => {
                log::info!("{} Retrieved API token", self.ctx);
                self.token = Some(token);
                Ok(true)
            }
            Err(e) => {
                log::error!("{} Failed to retrieve API token: {:#}", self.ctx, e);
                Ok(false)
            }
        }
    }

    async fn extract(&mut self) -> Result<Envelope> {
        let Some(token) = self.token.as_deref() else {
            eyre::bail!("extract called before a token was acquired");
        };

        let data = match self.fetch(token).await {
            Ok(data) => data,
            Err(e) => {
                log::error!("{} Failed to extract data: {:#}", self.ctx, e);
                return Ok(Envelope::empty());
            }
        };
        self.snapshots.record("debug_data", &data);

        let envelope = self.map_items(&data);
        self.snapshots.record("debug_mapped_data", &envelope);
        log::info!(
            "{} Extracted {} record(s) from {}",
            self.ctx,
            envelope.len(),
            self.config.endpoint.cyan()
        );
        Ok(envelope)
    }
}
