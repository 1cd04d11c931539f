//! Configuration and remote schema of the business object loader

use crate::envelope::{FieldMapping, value_to_text};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Settings of a `d3businessobjects` load
#[derive(Debug, Clone, Deserialize)]
pub struct BusinessObjectsConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Name of the custom model holding the entity
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub entity: EntityConfig,
    /// Records per `$batch` call; zero or negative means 100
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default)]
    pub truncate_before_load: bool,
    #[serde(default)]
    pub mapping: FieldMapping,
    #[serde(default)]
    pub debug: bool,
}

fn default_name() -> String {
    "ETLLoadD3BusinessObjects".to_string()
}

fn default_batch_size() -> i64 {
    1
}

impl BusinessObjectsConfig {
    /// Batch size actually used for partitioning
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size > 0 {
            self.batch_size as usize
        } else {
            100
        }
    }
}

/// The `entity` block: name plus the definition posted when it is missing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityConfig {
    #[serde(default)]
    pub name: String,
    /// Used when the definition has no `pluralName`
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default)]
    pub definition: Value,
    #[serde(default)]
    pub key_field: Option<String>,
    #[serde(default)]
    pub key_type: Option<String>,
}

/// What the loader expects to find (or create) on the remote side
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSchema {
    pub model_name: String,
    pub entity_name: String,
    pub entity_plural: String,
    pub entity_definition: Value,
    /// Resolved from the model listing during setup
    pub model_id: Option<String>,
}

impl RemoteSchema {
    pub fn from_config(config: &BusinessObjectsConfig) -> Self {
        let definition = &config.entity.definition;
        let entity_plural = definition
            .get("pluralName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| config.entity.plural.clone())
            .unwrap_or_default();

        Self {
            model_name: config.model.clone(),
            entity_name: config.entity.name.clone(),
            entity_plural,
            entity_definition: definition.clone(),
            model_id: None,
        }
    }

    /// Pick this schema's model from a model listing (`{"value": [..]}`)
    ///
    /// The first model whose `name` matches wins.
    pub fn find_model<'a>(&self, listing: &'a Value) -> Option<&'a Value> {
        listing
            .get("value")
            .and_then(Value::as_array)?
            .iter()
            .find(|model| model.get("name").and_then(Value::as_str) == Some(self.model_name.as_str()))
    }

    /// Whether a model lists this schema's entity among its `entityTypes`
    pub fn model_has_entity(&self, model: &Value) -> bool {
        model
            .get("entityTypes")
            .and_then(Value::as_array)
            .is_some_and(|entities| {
                entities
                    .iter()
                    .any(|e| e.get("name").and_then(Value::as_str) == Some(self.entity_name.as_str()))
            })
    }
}

/// Model id as text, whether the API sends it as a string or a number
pub fn model_id(model: &Value) -> Option<String> {
    model
        .get("id")
        .filter(|id| !id.is_null())
        .map(value_to_text)
        .filter(|id| !id.is_empty())
}

/// Entity key type, which decides how keys appear in request URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKeyType {
    String,
    Guid,
    Int32,
    Int64,
}

impl FromStr for EntityKeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "guid" => Ok(Self::Guid),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            _ => Err(format!("Unsupported entity key type: {}", s)),
        }
    }
}

impl EntityKeyType {
    /// Key segment appended to the entity set: `('value')` or `(value)`
    ///
    /// String keys are OData string literals, where a single quote is written
    /// as two. A key without quotes comes out as plain `('value')`; one with a
    /// quote (`O'Neil`) would otherwise end the literal early and produce an
    /// invalid or wrong entity URL.
    pub fn format_key(&self, value: &str) -> String {
        match self {
            Self::String => format!("('{}')", value.replace('\'', "''")),
            Self::Guid | Self::Int32 | Self::Int64 => format!("({})", value),
        }
    }
}

/// Field holding the entity key and its declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKey {
    pub field: String,
    /// Type name as configured; parsed when requests are built
    pub kind: String,
}

impl EntityKey {
    /// From `entity.key_field`/`entity.key_type`, else the definition's
    /// `key.name`/`key.type`, else `id`/`String`
    pub fn from_config(entity: &EntityConfig) -> Self {
        let definition_key = entity.definition.get("key");
        let from_definition = |field: &str| {
            definition_key
                .and_then(|key| key.get(field))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            field: entity
                .key_field
                .clone()
                .or_else(|| from_definition("name"))
                .unwrap_or_else(|| "id".to_string()),
            kind: entity
                .key_type
                .clone()
                .or_else(|| from_definition("type"))
                .unwrap_or_else(|| "String".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> BusinessObjectsConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_batch_size_clamp() {
        assert_eq!(config(json!({})).effective_batch_size(), 1);
        assert_eq!(config(json!({"batch_size": 25})).effective_batch_size(), 25);
        assert_eq!(config(json!({"batch_size": 0})).effective_batch_size(), 100);
        assert_eq!(config(json!({"batch_size": -3})).effective_batch_size(), 100);
    }

    #[test]
    fn test_plural_from_definition_or_entity() {
        let schema = RemoteSchema::from_config(&config(json!({
            "model": "ledger",
            "entity": {"name": "entry", "plural": "ignored", "definition": {"pluralName": "entries"}}
        })));
        assert_eq!(schema.entity_plural, "entries");

        let schema = RemoteSchema::from_config(&config(json!({
            "entity": {"name": "entry", "plural": "entrys"}
        })));
        assert_eq!(schema.entity_plural, "entrys");
        assert_eq!(schema.model_id, None);
    }

    #[test]
    fn test_find_model_first_match_wins() {
        let schema = RemoteSchema::from_config(&config(json!({"model": "ledger"})));
        let listing = json!({"value": [
            {"name": "other", "id": 1},
            {"name": "ledger", "id": 2},
            {"name": "ledger", "id": 3}
        ]});

        let model = schema.find_model(&listing).unwrap();
        assert_eq!(model_id(model), Some("2".to_string()));
        assert!(schema.find_model(&json!({"value": []})).is_none());
        assert!(schema.find_model(&json!({})).is_none());
    }

    #[test]
    fn test_model_has_entity() {
        let schema = RemoteSchema::from_config(&config(json!({"entity": {"name": "entry"}})));
        assert!(schema.model_has_entity(&json!({"entityTypes": [{"name": "entry"}]})));
        assert!(!schema.model_has_entity(&json!({"entityTypes": [{"name": "item"}]})));
        assert!(!schema.model_has_entity(&json!({})));
    }

    #[test]
    fn test_key_type_case_insensitive() {
        assert_eq!("string".parse::<EntityKeyType>(), Ok(EntityKeyType::String));
        assert_eq!("GUID".parse::<EntityKeyType>(), Ok(EntityKeyType::Guid));
        assert_eq!("Int64".parse::<EntityKeyType>(), Ok(EntityKeyType::Int64));
        assert!("Decimal".parse::<EntityKeyType>().is_err());
    }

    #[test]
    fn test_key_formatting() {
        assert_eq!(EntityKeyType::String.format_key("1"), "('1')");
        assert_eq!(EntityKeyType::String.format_key("O'Neil"), "('O''Neil')");
        assert_eq!(EntityKeyType::Int32.format_key("42"), "(42)");
        assert_eq!(
            EntityKeyType::Guid.format_key("0f8fad5b-d9cb-469f-a165-70867728950e"),
            "(0f8fad5b-d9cb-469f-a165-70867728950e)"
        );
    }

    #[test]
    fn test_entity_key_resolution() {
        let entity: EntityConfig = serde_json::from_value(json!({
            "name": "entry",
            "definition": {"key": {"name": "entryNo", "type": "Int64"}}
        }))
        .unwrap();
        assert_eq!(
            EntityKey::from_config(&entity),
            EntityKey {
                field: "entryNo".to_string(),
                kind: "Int64".to_string()
            }
        );

        let entity: EntityConfig = serde_json::from_value(json!({
            "key_field": "no",
            "definition": {"key": {"name": "entryNo", "type": "Int64"}}
        }))
        .unwrap();
        assert_eq!(EntityKey::from_config(&entity).field, "no");
        assert_eq!(EntityKey::from_config(&entity).kind, "Int64");

        let key = EntityKey::from_config(&EntityConfig::default());
        assert_eq!((key.field.as_str(), key.kind.as_str()), ("id", "String"));
    }
}
