//! `$batch` request payloads and response inspection

use super::schema::{EntityKey, EntityKeyType};
use crate::envelope::{Record, value_to_text};
use serde::Serialize;
use serde_json::{Value, json};

/// Per-item statuses that count as success
const SUCCESS_STATUSES: [u64; 3] = [200, 201, 204];

/// One upsert inside a `$batch` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRequest {
    /// Position of the record within its batch, starting at 1
    pub id: String,
    pub method: &'static str,
    /// Entity set plus formatted key: `entries('A1')`
    pub url: String,
    pub body: Record,
    pub headers: BatchHeaders,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchHeaders {
    #[serde(rename = "content-type")]
    pub content_type: &'static str,
}

impl Default for BatchHeaders {
    fn default() -> Self {
        Self {
            content_type: "application/json",
        }
    }
}

/// Build `PUT` requests for one batch of (already mapped) records
///
/// Records with a missing, null or empty key are skipped with a warning. An
/// unsupported key type yields no requests at all.
pub fn build_batch_requests(records: &[Record], key: &EntityKey, plural: &str) -> Vec<BatchRequest> {
    let key_type: EntityKeyType = match key.kind.parse() {
        Ok(key_type) => key_type,
        Err(e) => {
            log::warn!("{}, no requests built", e);
            return Vec::new();
        }
    };

    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let id = index + 1;
            let key_value = record
                .get(&key.field)
                .map(value_to_text)
                .filter(|v| !v.is_empty());
            let Some(key_value) = key_value else {
                log::warn!("Item {} missing entity key field '{}', skipping", id, key.field);
                return None;
            };

            Some(BatchRequest {
                id: id.to_string(),
                method: "PUT",
                url: format!("{}{}", plural, key_type.format_key(&key_value)),
                body: record.clone(),
                headers: BatchHeaders::default(),
            })
        })
        .collect()
}

/// The `$batch` request body
pub fn batch_payload(requests: &[BatchRequest]) -> Value {
    json!({ "requests": requests })
}

/// A sub-response whose status is not a success
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    pub id: String,
    pub status: Value,
    pub body: Value,
}

/// Sub-responses of a `$batch` response that did not succeed
pub fn failed_items(response: &Value) -> Vec<FailedItem> {
    response
        .get("responses")
        .and_then(Value::as_array)
        .map(|responses| {
            responses
                .iter()
                .filter(|r| {
                    !r.get("status")
                        .and_then(status_code)
                        .is_some_and(|s| SUCCESS_STATUSES.contains(&s))
                })
                .map(|r| FailedItem {
                    id: r.get("id").map(value_to_text).unwrap_or_default(),
                    status: r.get("status").cloned().unwrap_or(Value::Null),
                    body: r.get("body").cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Status as a number, accepting `200` as well as `"200"`
fn status_code(status: &Value) -> Option<u64> {
    match status {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn key(field: &str, kind: &str) -> EntityKey {
        EntityKey {
            field: field.to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn test_string_key_request() {
        let requests = build_batch_requests(
            &records(vec![json!({"id": "1", "no": "A"})]),
            &key("id", "String"),
            "entries",
        );

        assert_eq!(
            serde_json::to_value(&requests).unwrap(),
            json!([{
                "id": "1",
                "method": "PUT",
                "url": "entries('1')",
                "body": {"id": "1", "no": "A"},
                "headers": {"content-type": "application/json"}
            }])
        );
    }

    #[test]
    fn test_numeric_key_request() {
        let requests = build_batch_requests(
            &records(vec![json!({"entryNo": 17})]),
            &key("entryNo", "int64"),
            "entries",
        );
        assert_eq!(requests[0].url, "entries(17)");
    }

    #[test]
    fn test_keyless_records_dropped() {
        let requests = build_batch_requests(
            &records(vec![
                json!({"id": "1"}),
                json!({"id": null}),
                json!({"other": "x"}),
                json!({"id": ""}),
                json!({"id": "5"}),
            ]),
            &key("id", "String"),
            "entries",
        );

        let ids: Vec<&str> = requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "5"]);
    }

    #[test]
    fn test_unknown_key_type_builds_nothing() {
        let requests = build_batch_requests(
            &records(vec![json!({"id": "1"})]),
            &key("id", "Decimal"),
            "entries",
        );
        assert!(requests.is_empty());
    }

    #[test]
    fn test_failed_items() {
        let response = json!({"responses": [
            {"id": "1", "status": 200, "body": {}},
            {"id": "2", "status": 404, "body": {"error": "not found"}},
            {"id": "3", "status": "204"},
            {"id": "4", "status": 500}
        ]});

        let failed = failed_items(&response);
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].id, "2");
        assert_eq!(failed[0].status, json!(404));
        assert_eq!(failed[1].id, "4");

        assert!(failed_items(&json!({})).is_empty());
    }
}
