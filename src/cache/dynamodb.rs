//! DynamoDB store implementation
//!
//! Items use the table layout below. The table's TTL sweeper is configured on
//! `ttl`, but sweeping is lazy, so the fetcher still checks freshness itself.
//!
//! | attribute     | type | content                          |
//! |---------------|------|----------------------------------|
//! | `cityId`      | S    | partition key                    |
//! | `weatherData` | M    | raw payload as a document        |
//! | `ttl`         | N    | expiration, epoch seconds        |
//! | `timestamp`   | S    | write instant, RFC 3339          |

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use super::entry::CacheEntry;
use super::error::CacheError;
use super::traits::ExpiringKeyValueStore;
use crate::constants::{
    DYNAMODB_KEY_ATTRIBUTE, DYNAMODB_PAYLOAD_ATTRIBUTE, DYNAMODB_STORED_AT_ATTRIBUTE,
    DYNAMODB_TTL_ATTRIBUTE,
};

/// Store backed by a single DynamoDB table
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl ExpiringKeyValueStore for DynamoDbStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(DYNAMODB_KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| CacheError::Backend(DisplayErrorContext(&e).to_string()))?;

        match output.item() {
            Some(item) => decode_item(item).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(encode_item(&entry)))
            .send()
            .await
            .map_err(|e| CacheError::Backend(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }
}

/// Build the table item for an entry
pub fn encode_item(entry: &CacheEntry) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::with_capacity(4);
    item.insert(
        DYNAMODB_KEY_ATTRIBUTE.to_string(),
        AttributeValue::S(entry.key.clone()),
    );
    item.insert(
        DYNAMODB_PAYLOAD_ATTRIBUTE.to_string(),
        json_to_attribute(&entry.payload),
    );
    item.insert(
        DYNAMODB_TTL_ATTRIBUTE.to_string(),
        AttributeValue::N(entry.expires_at.to_string()),
    );
    item.insert(
        DYNAMODB_STORED_AT_ATTRIBUTE.to_string(),
        AttributeValue::S(entry.stored_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    item
}

/// Rebuild an entry from a table item
///
/// Items without a string key, a numeric `ttl` or a payload are malformed.
pub fn decode_item(item: &HashMap<String, AttributeValue>) -> Result<CacheEntry, CacheError> {
    let key = match item.get(DYNAMODB_KEY_ATTRIBUTE) {
        Some(AttributeValue::S(key)) => key.clone(),
        _ => return Err(malformed(DYNAMODB_KEY_ATTRIBUTE)),
    };

    let expires_at = match item.get(DYNAMODB_TTL_ATTRIBUTE) {
        Some(AttributeValue::N(raw)) => raw
            .parse::<i64>()
            .map_err(|_| malformed(DYNAMODB_TTL_ATTRIBUTE))?,
        _ => return Err(malformed(DYNAMODB_TTL_ATTRIBUTE)),
    };

    let payload = item
        .get(DYNAMODB_PAYLOAD_ATTRIBUTE)
        .ok_or_else(|| malformed(DYNAMODB_PAYLOAD_ATTRIBUTE))
        .and_then(attribute_to_json)?;

    // informational only, tolerate absence
    let stored_at = match item.get(DYNAMODB_STORED_AT_ATTRIBUTE) {
        Some(AttributeValue::S(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        _ => DateTime::<Utc>::default(),
    };

    Ok(CacheEntry {
        key,
        payload,
        expires_at,
        stored_at,
    })
}

/// Convert a JSON document to a DynamoDB attribute
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_attribute(v)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB attribute back to JSON
///
/// Binary attributes have no JSON counterpart and are rejected.
pub fn attribute_to_json(attr: &AttributeValue) -> Result<Value, CacheError> {
    match attr {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::N(raw) => parse_number(raw),
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::Ss(items) => Ok(Value::Array(
            items.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(items) => items
            .iter()
            .map(|raw| parse_number(raw))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::L(items) => items
            .iter()
            .map(attribute_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(fields) => {
            let mut object = Map::with_capacity(fields.len());
            for (k, v) in fields {
                object.insert(k.clone(), attribute_to_json(v)?);
            }
            Ok(Value::Object(object))
        }
        other => Err(CacheError::SerializationError(format!(
            "unsupported attribute type in payload: {:?}",
            other
        ))),
    }
}

fn parse_number(raw: &str) -> Result<Value, CacheError> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Ok(Value::from(u));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| CacheError::SerializationError(format!("invalid number attribute: {raw}")))
}

fn malformed(attribute: &str) -> CacheError {
    CacheError::SerializationError(format!(
        "cache item is missing or has an invalid `{attribute}` attribute"
    ))
}
