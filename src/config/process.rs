//! Process definitions and per-stage specifications

use crate::error::EtlError;
use crate::etl::Stage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One configured extract → transform → load unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    #[serde(default = "default_process_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Inactive processes are skipped without instantiating any connector
    #[serde(default)]
    pub active: bool,

    /// Overrides the run-wide process timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    pub extraction: StageSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<StageSpec>,

    pub loading: StageSpec,
}

fn default_process_name() -> String {
    "UnnamedProcess".to_string()
}

impl ProcessDefinition {
    /// The transformation spec, if one is configured with a `type`
    ///
    /// A transformation block without a `type` counts as absent.
    pub fn transformation(&self) -> Option<&StageSpec> {
        self.transformation
            .as_ref()
            .filter(|spec| spec.kind().is_some())
    }
}

/// Raw configuration of one stage: a `type` discriminator plus
/// connector-specific fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageSpec(Map<String, Value>);

impl StageSpec {
    /// The `type` discriminator
    pub fn kind(&self) -> Option<&str> {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The `type` discriminator, or an error naming the stage
    pub fn require_kind(&self, stage: Stage) -> Result<&str, EtlError> {
        self.kind().ok_or(EtlError::MissingType { stage })
    }

    /// Optional human-readable connector name
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Decode the spec into a connector's typed settings
    pub fn parse<T: DeserializeOwned>(&self, stage: Stage) -> Result<T, EtlError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|source| {
            EtlError::InvalidConfig {
                stage,
                kind: self.kind().unwrap_or("unknown").to_string(),
                source,
            }
        })
    }
}

impl From<Value> for StageSpec {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }
}
