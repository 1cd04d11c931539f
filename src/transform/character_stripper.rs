//! Character stripper hook

use crate::envelope::Envelope;
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Hook that removes characters from every string value
///
/// Useful when a destination chokes on quotes in free-text fields.
///
/// ```yaml
/// function_name: strip_characters
/// config:
///   characters: "'"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterStripper {
    characters: String,
}

impl CharacterStripper {
    pub fn new(characters: impl Into<String>) -> Self {
        Self {
            characters: characters.into(),
        }
    }

    /// Build from the hook's `config` block
    pub fn from_config(config: &Value) -> Result<Self> {
        Self::deserialize(config).context("strip_characters expects {\"characters\": \"..\"}")
    }

    pub fn apply(&self, input: &Envelope) -> Envelope {
        input.map_records(|record| {
            record
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => Value::String(
                            s.chars().filter(|c| !self.characters.contains(*c)).collect(),
                        ),
                        other => other.clone(),
                    };
                    (key.clone(), value)
                })
                .collect()
        })
    }
}
