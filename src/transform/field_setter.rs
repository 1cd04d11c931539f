//! Field setter hook
//!
//! Stamps constant values onto every record, for example the company a
//! ledger export belongs to.

use crate::envelope::Envelope;
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Hook that sets constant fields on every record
///
/// Existing fields with the same name are overwritten.
///
/// ```yaml
/// function_name: set_fields
/// config:
///   fields:
///     company: Raiff. Delbrück
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSetter {
    fields: Map<String, Value>,
}

impl FieldSetter {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build from the hook's `config` block
    pub fn from_config(config: &Value) -> Result<Self> {
        Self::deserialize(config).context("set_fields expects {\"fields\": {name: value}}")
    }

    pub fn apply(&self, input: &Envelope) -> Envelope {
        input.map_records(|record| {
            let mut record = record.clone();
            for (name, value) in &self.fields {
                record.insert(name.clone(), value.clone());
            }
            record
        })
    }
}
