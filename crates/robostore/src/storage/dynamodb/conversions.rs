//! Conversions between records and DynamoDB attribute maps.
//!
//! Records are plain JSON objects, so `serde_dynamo` maps them directly:
//! strings to `S`, numbers to `N`, booleans to `BOOL`, arrays to `L` and
//! nested objects to `M`.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;

use robostore_core::item::{Record, ID_ATTRIBUTE};
use robostore_core::storage::{ContinuationToken, RepositoryError, Result};

/// DynamoDB item representation.
pub type Item = HashMap<String, AttributeValue>;

fn serialization_error(err: serde_dynamo::Error) -> RepositoryError {
    RepositoryError::Serialization(err.to_string())
}

/// Convert a record to a DynamoDB item.
pub fn record_to_item(record: &Record) -> Result<Item> {
    serde_dynamo::to_item(record).map_err(serialization_error)
}

/// Convert a DynamoDB item to a record.
pub fn item_to_record(item: Item) -> Result<Record> {
    serde_dynamo::from_item(item).map_err(|e| {
        RepositoryError::Internal(format!("Malformed item in table: {e}"))
    })
}

/// Convert items returned by a query or scan.
pub fn items_to_records(items: Option<Vec<Item>>) -> Result<Vec<Record>> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(item_to_record)
        .collect()
}

/// Convert a single JSON value to an attribute value.
pub fn to_attribute(value: &Value) -> Result<AttributeValue> {
    serde_dynamo::to_attribute_value(value).map_err(serialization_error)
}

/// Primary key of the item with `id`.
pub fn id_key(id: &str) -> Item {
    HashMap::from([(ID_ATTRIBUTE.to_string(), AttributeValue::S(id.to_string()))])
}

/// Exclusive start key for a query resumed from `token`.
pub fn token_to_key(token: &ContinuationToken) -> Result<Item> {
    record_to_item(token.key())
}

/// Token for a query's `LastEvaluatedKey`.
pub fn key_to_token(key: Option<Item>) -> Result<Option<ContinuationToken>> {
    key.map(|key| item_to_record(key).map(ContinuationToken::from_key))
        .transpose()
}
