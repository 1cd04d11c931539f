//! Field dropper hook
//!
//! Removes specified fields from every record, typically technical fields the
//! destination should not receive.

use crate::envelope::Envelope;
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Hook that drops specified fields from records
///
/// Configuration:
/// ```yaml
/// function_name: drop_fields
/// config:
///   fields: [systemCreatedAt, systemModifiedAt]
/// ```
///
/// # Example
/// ```
/// use etlit::transform::FieldDropper;
/// use etlit::Envelope;
/// use serde_json::json;
///
/// let dropper = FieldDropper::new(vec!["created_at"]);
/// let input: Envelope = serde_json::from_value(json!({
///     "items": [{"id": "test", "created_at": "2024-01-01"}]
/// })).unwrap();
///
/// let output = dropper.apply(&input);
/// assert!(!output.items[0].contains_key("created_at"));
/// assert_eq!(output.items[0]["id"], "test");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDropper {
    fields: Vec<String>,
}

impl FieldDropper {
    /// Create a new field dropper with the specified fields to remove
    pub fn new(fields: Vec<&str>) -> Self {
        Self {
            fields: fields.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build from the hook's `config` block
    pub fn from_config(config: &Value) -> Result<Self> {
        Self::deserialize(config).context("drop_fields expects {\"fields\": [..]}")
    }

    pub fn apply(&self, input: &Envelope) -> Envelope {
        input.map_records(|record| {
            let mut record = record.clone();
            for field in &self.fields {
                record.shift_remove(field);
            }
            record
        })
    }
}
