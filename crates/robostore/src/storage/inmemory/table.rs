//! In-memory table backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use robostore_core::item::{record_string, record_type, Record, ID_ATTRIBUTE};
use robostore_core::storage::{
    ContinuationToken, FieldFilter, RawPage, RepositoryError, Result, TableBackend, TextFilter,
};

/// In-memory table for testing.
///
/// Records are kept in a `BTreeMap` keyed by ID, so type-index pages come
/// back in a stable order. Filters are applied after `evaluate` records are
/// read, the way DynamoDB applies a `Limit` before a filter expression.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTable {
    records: Arc<RwLock<BTreeMap<String, Record>>>,
}

impl InMemoryTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records of every type.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no record is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn is_type(record: &Record, item_type: &str) -> bool {
    record_type(record) == Some(item_type)
}

#[async_trait]
impl TableBackend for InMemoryTable {
    async fn put_record(
        &self,
        item_type: &'static str,
        record: Record,
        absent: &[&str],
    ) -> Result<()> {
        let id = record_string(&record, ID_ATTRIBUTE)
            .ok_or_else(|| RepositoryError::Validation("record has no id".to_string()))?
            .to_string();

        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&id) {
            if absent.iter().any(|attribute| existing.contains_key(*attribute)) {
                return Err(RepositoryError::AlreadyExists {
                    entity_type: item_type,
                    id,
                });
            }
        }
        records.insert(id, record);
        Ok(())
    }

    async fn get_record(&self, id: &str) -> Result<Option<Record>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn update_record(
        &self,
        item_type: &'static str,
        id: &str,
        set: Record,
        remove: &[String],
    ) -> Result<Record> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .filter(|record| is_type(record, item_type))
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: item_type,
                id: id.to_string(),
            })?;

        for attribute in remove {
            record.remove(attribute);
        }
        record.extend(set);
        Ok(record.clone())
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(id);
        Ok(())
    }

    async fn query_type_page(
        &self,
        item_type: &str,
        filter: Option<&TextFilter>,
        evaluate: usize,
        start: Option<&ContinuationToken>,
    ) -> Result<RawPage> {
        let records = self.records.read().await;
        let after = start.and_then(ContinuationToken::id);

        let mut candidates = records
            .iter()
            .filter(|(id, _)| after.is_none_or(|after| id.as_str() > after))
            .map(|(_, record)| record)
            .filter(|record| is_type(record, item_type));

        let evaluated: Vec<&Record> = candidates.by_ref().take(evaluate.max(1)).collect();
        let last_evaluated = match (evaluated.last(), candidates.next()) {
            (Some(last), Some(_)) => Some(ContinuationToken::after(last)),
            _ => None,
        };

        Ok(RawPage {
            records: evaluated
                .into_iter()
                .filter(|record| filter.is_none_or(|f| f.matches(record)))
                .cloned()
                .collect(),
            last_evaluated,
        })
    }

    async fn count_type(&self, item_type: &str, filter: Option<&TextFilter>) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| is_type(record, item_type))
            .filter(|record| filter.is_none_or(|f| f.matches(record)))
            .count())
    }

    async fn batch_get_records(&self, ids: &[String]) -> Result<Vec<Record>> {
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn query_index(
        &self,
        attribute: &str,
        value: &str,
        item_type: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Record>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record_string(record, attribute) == Some(value))
            .filter(|record| is_type(record, item_type))
            .filter(|record| filters.iter().all(|f| f.matches(record)))
            .cloned()
            .collect())
    }

    async fn scan_attribute_in(
        &self,
        attribute: &str,
        values: &[String],
        item_type: &str,
    ) -> Result<Vec<Record>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| is_type(record, item_type))
            .filter(|record| {
                record_string(record, attribute)
                    .is_some_and(|value| values.iter().any(|v| v == value))
            })
            .cloned()
            .collect())
    }
}
