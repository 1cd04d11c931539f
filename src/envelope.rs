//! The `{"items": [...]}` value passed between pipeline stages

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record: field name to scalar (or null) value, in insertion order
pub type Record = Map<String, Value>;

/// Data envelope exchanged by extractors, transformers and loaders
///
/// A missing `items` key deserializes to an empty list, so every stage can
/// rely on a well-formed envelope.
///
/// # Example
/// ```
/// use etlit::Envelope;
/// use serde_json::json;
///
/// let envelope: Envelope = serde_json::from_value(json!({})).unwrap();
/// assert!(envelope.is_empty());
///
/// let envelope: Envelope = serde_json::from_value(json!({"items": [{"id": "1"}]})).unwrap();
/// assert_eq!(envelope.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub items: Vec<Record>,
}

impl Envelope {
    pub fn new(items: Vec<Record>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build an envelope from a list of JSON values, rejecting non-objects
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        let items = values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| match value {
                Value::Object(record) => Ok(record),
                other => Err(eyre!("Item {} is not an object: {}", idx + 1, other)),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { items })
    }

    /// Apply `f` to every record, producing a new envelope
    pub fn map_records(&self, f: impl Fn(&Record) -> Record) -> Self {
        Self {
            items: self.items.iter().map(f).collect(),
        }
    }
}

impl From<Vec<Record>> for Envelope {
    fn from(items: Vec<Record>) -> Self {
        Self { items }
    }
}

/// Ordered source-field → target-field table
///
/// Deserializes from a plain mapping:
/// ```yaml
/// mapping:
///   documentNo: no
///   documentDate: date
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct FieldMapping {
    pairs: Vec<(String, String)>,
}

impl FieldMapping {
    pub fn new<S: Into<String>, T: Into<String>>(pairs: impl IntoIterator<Item = (S, T)>) -> Self {
        let mut mapping = Self::default();
        for (source, target) in pairs {
            mapping.insert(source.into(), target.into());
        }
        mapping
    }

    /// Insert a pair; a repeated source field replaces the earlier target
    pub fn insert(&mut self, source: String, target: String) {
        match self.pairs.iter_mut().find(|(s, _)| *s == source) {
            Some(pair) => pair.1 = target,
            None => self.pairs.push((source, target)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Target name for a source field, if mapped
    pub fn get(&self, source: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, t)| t.as_str())
    }

    /// Target field names in mapping order
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, t)| t.as_str())
    }

    /// Project a record onto the mapped targets
    ///
    /// `record[target] = record.get(source)`; missing sources become null and
    /// unmapped fields are dropped. An empty mapping returns the record as is.
    pub fn apply(&self, record: &Record) -> Record {
        if self.is_empty() {
            return record.clone();
        }
        self.pairs
            .iter()
            .map(|(source, target)| {
                (
                    target.clone(),
                    record.get(source).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Rename mapped fields and carry unmapped fields through unchanged
    pub fn rename(&self, record: &Record) -> Record {
        record
            .iter()
            .map(|(key, value)| {
                let key = self.get(key).unwrap_or(key).to_string();
                (key, value.clone())
            })
            .collect()
    }

    pub fn apply_all(&self, envelope: &Envelope) -> Envelope {
        envelope.map_records(|record| self.apply(record))
    }

    pub fn rename_all(&self, envelope: &Envelope) -> Envelope {
        envelope.map_records(|record| self.rename(record))
    }
}

impl TryFrom<Map<String, Value>> for FieldMapping {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        let mut mapping = Self::default();
        for (source, target) in map {
            match target {
                Value::String(target) => mapping.insert(source, target),
                other => {
                    return Err(format!(
                        "mapping target for '{}' must be a string, got {}",
                        source, other
                    ));
                }
            }
        }
        Ok(mapping)
    }
}

impl From<FieldMapping> for Map<String, Value> {
    fn from(mapping: FieldMapping) -> Self {
        mapping
            .pairs
            .into_iter()
            .map(|(s, t)| (s, Value::String(t)))
            .collect()
    }
}

/// Render a scalar value the way it should appear in text output
///
/// Strings are used verbatim, null becomes the empty string and everything
/// else uses its JSON representation.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
