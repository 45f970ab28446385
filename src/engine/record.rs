//! Source record parsing and the document shape written to the destination.

use serde_json::{Map, Value};

use crate::error::ItemError;
use crate::types::SourceObjectRef;
use crate::utils::config::{ID_FIELD, PARTITION_KEY_FIELD};

/// Which record fields make up the partition key, and how they are joined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSettings {
    pub customer_field: String,
    pub site_field: String,
    pub separator: String,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            customer_field: "custid".to_string(),
            site_field: "siteid".to_string(),
            separator: "_".to_string(),
        }
    }
}

/// Downloaded object content: an ordered, schema-free JSON object.
/// Unknown fields are kept as-is and written through.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Parse object bytes. Anything other than a JSON object is rejected.
    pub fn parse(key: &str, bytes: &[u8]) -> Result<Self, ItemError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(ItemError::Parse {
                key: key.to_string(),
                reason: format!("expected an object, found {}", json_kind(&other)),
            }),
            Err(e) => Err(ItemError::Parse {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Scalar field rendered for use in a key. Null, arrays and objects are not usable.
fn key_component(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// `<customer><sep><site>` from the record. Pure: same content, same key.
///
/// Components use JSON rendering: `true`/`false` for booleans and numbers as serde_json
/// prints them (`1.0` stays `1.0`). Keys written by tools that format `True` or drop a
/// trailing `.0` will not match for such records.
pub fn partition_key(
    key: &str,
    record: &RawRecord,
    settings: &RecordSettings,
) -> Result<String, ItemError> {
    let component = |field: &str| {
        record
            .get(field)
            .and_then(key_component)
            .ok_or_else(|| ItemError::MissingField {
                key: key.to_string(),
                field: field.to_string(),
            })
    };
    let customer = component(&settings.customer_field)?;
    let site = component(&settings.site_field)?;
    Ok(format!("{}{}{}", customer, settings.separator, site))
}

/// A record ready to write: source fields plus the injected `partitionKey`.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestDocument {
    /// Document id within its partition: the record's string `id`, else the source key.
    pub id: String,
    pub partition_key: String,
    pub body: Map<String, Value>,
}

impl IngestDocument {
    pub fn from_record(
        source: &SourceObjectRef,
        record: RawRecord,
        settings: &RecordSettings,
    ) -> Result<Self, ItemError> {
        let key = source.key();
        let partition_key = partition_key(&key, &record, settings)?;
        let id = match record.get(ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => key,
        };
        let mut body = record.into_map();
        body.insert(
            PARTITION_KEY_FIELD.to_string(),
            Value::String(partition_key.clone()),
        );
        Ok(Self {
            id,
            partition_key,
            body,
        })
    }

    /// Serialized body as written to the destination.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}
