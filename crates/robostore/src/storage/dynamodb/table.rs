//! DynamoDB table backend implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{KeysAndAttributes, ReturnValue, Select};
use aws_sdk_dynamodb::Client;
use tracing::{debug, warn};

use robostore_core::item::{record_id, Record, ID_ATTRIBUTE, TYPE_ATTRIBUTE};
use robostore_core::storage::{
    index_name, ContinuationToken, FieldFilter, RawPage, RepositoryError, Result, TableBackend,
    TextFilter,
};

use super::conversions::{
    id_key, item_to_record, items_to_records, key_to_token, record_to_item, token_to_key, Item,
};
use super::error::{
    map_batch_get_error, map_delete_item_error, map_get_item_error, map_put_item_error,
    map_query_error, map_scan_error, map_update_item_error,
};
use super::expressions::{all_of, Expressions};

/// Rounds of `UnprocessedKeys` re-requests before a batch read gives up.
const MAX_BATCH_GET_ROUNDS: usize = 8;

/// Largest `Limit` accepted for a single query page.
const MAX_QUERY_LIMIT: usize = i32::MAX as usize;

/// DynamoDB-based table backend.
///
/// Stores every item type in one table with `id` as the partition key.
#[derive(Debug, Clone)]
pub struct DynamoDbTable {
    client: Client,
    table_name: String,
}

impl DynamoDbTable {
    /// Creates a new backend with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Runs an index query to exhaustion.
    async fn query_all(
        &self,
        index: String,
        key_condition: String,
        filter: Option<String>,
        expr: &Expressions,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(&index)
                .key_condition_expression(&key_condition)
                .set_filter_expression(filter.clone())
                .set_expression_attribute_names(expr.names())
                .set_expression_attribute_values(expr.values())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(map_query_error)?;

            records.extend(items_to_records(result.items)?);
            match result.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => return Ok(records),
            }
        }
    }
}

#[async_trait]
impl TableBackend for DynamoDbTable {
    async fn put_record(
        &self,
        item_type: &'static str,
        record: Record,
        absent: &[&str],
    ) -> Result<()> {
        let id = record_id(&record).unwrap_or_default().to_string();
        let item = record_to_item(&record)?;

        let mut expr = Expressions::new();
        let condition = expr.all_absent(absent);

        debug!(table = %self.table_name, item_type, id = %id, "PutItem");
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .set_condition_expression((!absent.is_empty()).then_some(condition))
            .set_expression_attribute_names(expr.names())
            .send()
            .await
            .map_err(|e| map_put_item_error(e, item_type, id))?;

        Ok(())
    }

    async fn get_record(&self, id: &str) -> Result<Option<Record>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(id_key(id)))
            .send()
            .await
            .map_err(map_get_item_error)?;

        result.item.map(item_to_record).transpose()
    }

    async fn update_record(
        &self,
        item_type: &'static str,
        id: &str,
        set: Record,
        remove: &[String],
    ) -> Result<Record> {
        let mut expr = Expressions::new();
        let update = expr.update(&set, remove)?;
        let condition = format!(
            "attribute_exists({}) AND {}",
            expr.name(ID_ATTRIBUTE),
            expr.equals(TYPE_ATTRIBUTE, item_type)
        );

        debug!(table = %self.table_name, item_type, id, "UpdateItem");
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(id_key(id)))
            .update_expression(update)
            .condition_expression(condition)
            .set_expression_attribute_names(expr.names())
            .set_expression_attribute_values(expr.values())
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, item_type, id))?;

        result
            .attributes
            .map(item_to_record)
            .transpose()?
            .ok_or_else(|| {
                RepositoryError::Internal(format!("UpdateItem returned no attributes for {id}"))
            })
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        debug!(table = %self.table_name, id, "DeleteItem");
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(id_key(id)))
            .send()
            .await
            .map_err(map_delete_item_error)?;

        Ok(())
    }

    async fn query_type_page(
        &self,
        item_type: &str,
        filter: Option<&TextFilter>,
        evaluate: usize,
        start: Option<&ContinuationToken>,
    ) -> Result<RawPage> {
        let mut expr = Expressions::new();
        let key_condition = expr.equals(TYPE_ATTRIBUTE, item_type);
        let filter = filter.map(|f| expr.text_filter(f));
        let start_key = start.map(token_to_key).transpose()?;
        let limit = evaluate.clamp(1, MAX_QUERY_LIMIT) as i32;

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(index_name(TYPE_ATTRIBUTE))
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_expression_attribute_names(expr.names())
            .set_expression_attribute_values(expr.values())
            .set_exclusive_start_key(start_key)
            .limit(limit)
            .send()
            .await
            .map_err(map_query_error)?;

        Ok(RawPage {
            records: items_to_records(result.items)?,
            last_evaluated: key_to_token(result.last_evaluated_key)?,
        })
    }

    async fn count_type(&self, item_type: &str, filter: Option<&TextFilter>) -> Result<usize> {
        let mut expr = Expressions::new();
        let key_condition = expr.equals(TYPE_ATTRIBUTE, item_type);
        let filter = filter.map(|f| expr.text_filter(f));

        let mut total = 0usize;
        let mut start_key: Option<Item> = None;
        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index_name(TYPE_ATTRIBUTE))
                .key_condition_expression(&key_condition)
                .set_filter_expression(filter.clone())
                .set_expression_attribute_names(expr.names())
                .set_expression_attribute_values(expr.values())
                .select(Select::Count)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(map_query_error)?;

            total += usize::try_from(result.count).unwrap_or_default();
            match result.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => return Ok(total),
            }
        }
    }

    async fn batch_get_records(&self, ids: &[String]) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pending = KeysAndAttributes::builder()
            .set_keys(Some(ids.iter().map(|id| id_key(id)).collect()))
            .build()
            .map_err(|e| RepositoryError::Internal(format!("Invalid batch request: {e}")))?;
        let mut records = Vec::with_capacity(ids.len());

        for round in 1..=MAX_BATCH_GET_ROUNDS {
            let result = self
                .client
                .batch_get_item()
                .set_request_items(Some(HashMap::from([(self.table_name.clone(), pending)])))
                .send()
                .await
                .map_err(map_batch_get_error)?;

            if let Some(mut responses) = result.responses {
                if let Some(items) = responses.remove(&self.table_name) {
                    records.extend(items_to_records(Some(items))?);
                }
            }

            match result
                .unprocessed_keys
                .and_then(|mut unprocessed| unprocessed.remove(&self.table_name))
                .filter(|keys| !keys.keys().is_empty())
            {
                Some(keys) => {
                    debug!(round, unprocessed = keys.keys().len(), "BatchGetItem left keys unprocessed");
                    pending = keys;
                }
                None => return Ok(records),
            }
        }

        warn!(table = %self.table_name, "BatchGetItem kept returning unprocessed keys");
        Err(RepositoryError::QueryFailed(
            "BatchGetItem left keys unprocessed, please retry".to_string(),
        ))
    }

    async fn query_index(
        &self,
        attribute: &str,
        value: &str,
        item_type: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Record>> {
        let mut expr = Expressions::new();
        let key_condition = expr.equals(attribute, value);

        let mut conditions = Vec::with_capacity(filters.len() + 1);
        if attribute != TYPE_ATTRIBUTE {
            conditions.push(expr.equals(TYPE_ATTRIBUTE, item_type));
        }
        for filter in filters {
            conditions.push(expr.field_filter(filter)?);
        }

        debug!(table = %self.table_name, attribute, item_type, "Query index");
        self.query_all(index_name(attribute), key_condition, all_of(conditions), &expr)
            .await
    }

    async fn scan_attribute_in(
        &self,
        attribute: &str,
        values: &[String],
        item_type: &str,
    ) -> Result<Vec<Record>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut expr = Expressions::new();
        let filter = format!(
            "{} AND {}",
            expr.equals(TYPE_ATTRIBUTE, item_type),
            expr.one_of(attribute, values)
        );

        debug!(table = %self.table_name, attribute, values = values.len(), "Scan");
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(&filter)
                .set_expression_attribute_names(expr.names())
                .set_expression_attribute_values(expr.values())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(map_scan_error)?;

            records.extend(items_to_records(result.items)?);
            match result.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => return Ok(records),
            }
        }
    }
}
