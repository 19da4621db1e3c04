//! Typed item store on top of a [`TableBackend`].
//!
//! The store turns typed items into tagged records and back, validates
//! writes, enforces unique fields, and drives pagination and batching. The
//! backend only moves records.

mod api_keys;
mod index;

use futures_util::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use robostore_core::item::{
    from_record, record_string, record_type, to_record, validate_updates, Item, Record, ID_ATTRIBUTE,
};
use robostore_core::storage::{
    chunk_unique, clamp_chunk_size, is_indexed, reorder_by_ids, ContinuationToken, FieldFilter,
    ListQuery, Page, RepositoryError, Result, TableBackend, TextFilter, MAX_BATCH_SIZE,
};

/// Attribute refreshed on every non-empty update when the model declares it.
const UPDATED_AT: &str = "updated_at";

/// Typed access to the shared table.
#[derive(Debug, Clone)]
pub struct ItemStore<B> {
    backend: B,
    chunk_size: usize,
}

impl<B: TableBackend> ItemStore<B> {
    /// Creates a store over `backend` with the largest batch chunk size.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            chunk_size: MAX_BATCH_SIZE,
        }
    }

    /// Sets the chunk size used by batch reads when the caller gives none.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = clamp_chunk_size(chunk_size);
        self
    }

    /// Get the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Default batch chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Writes a new item.
    ///
    /// Fails with `AlreadyExists` if the ID is taken and with
    /// `UniqueViolation` if another item of the same type already holds
    /// the value of one of `unique_fields`. Uniqueness is checked with an
    /// index lookup before the conditional write, so two concurrent writers
    /// can still both succeed.
    pub async fn add<T: Item>(&self, item: &T, unique_fields: &[&str]) -> Result<()> {
        item.validate()?;
        let record = to_record(item)?;

        for field in unique_fields {
            let value = record_string(&record, field).ok_or_else(|| {
                RepositoryError::Validation(format!(
                    "{}.{field} must be a string to be unique",
                    T::TYPE
                ))
            })?;
            self.ensure_unique::<T>(item.id(), field, value).await?;
        }

        let mut absent = Vec::with_capacity(unique_fields.len() + 1);
        absent.push(ID_ATTRIBUTE);
        absent.extend_from_slice(unique_fields);

        debug!(item_type = T::TYPE, id = item.id(), "put item");
        self.backend.put_record(T::TYPE, record, &absent).await
    }

    async fn ensure_unique<T: Item>(&self, id: &str, field: &str, value: &str) -> Result<()> {
        ensure_indexed(field)?;
        let others = self
            .backend
            .query_index(
                field,
                value,
                T::TYPE,
                &[FieldFilter::not_equals(ID_ATTRIBUTE, id)],
            )
            .await?;

        if others.is_empty() {
            Ok(())
        } else {
            Err(RepositoryError::UniqueViolation {
                entity_type: T::TYPE,
                field: field.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Gets an item by its ID.
    ///
    /// Fails with `TypeMismatch` if the ID belongs to an item of another
    /// type.
    pub async fn get<T: Item>(&self, id: &str) -> Result<Option<T>> {
        debug!(item_type = T::TYPE, id, "get item");
        match self.backend.get_record(id).await? {
            Some(record) => from_record(record).map(Some),
            None => Ok(None),
        }
    }

    /// Gets an item by its ID, failing with `NotFound` if it is missing.
    pub async fn get_required<T: Item>(&self, id: &str) -> Result<T> {
        self.get(id).await?.ok_or_else(|| RepositoryError::NotFound {
            entity_type: T::TYPE,
            id: id.to_string(),
        })
    }

    /// Applies a partial update and returns the updated item.
    ///
    /// `null` values remove optional fields. An empty update changes
    /// nothing and returns the current item. Fails with `NotFound` if no
    /// item of type `T` has this ID.
    pub async fn update<T: Item>(&self, id: &str, updates: Record) -> Result<T> {
        validate_updates::<T>(&updates)?;
        if updates.is_empty() {
            return self.get_required(id).await;
        }
        self.validate_merged::<T>(id, &updates).await?;

        for field in T::UNIQUE_FIELDS {
            if let Some(value) = updates.get(*field).and_then(Value::as_str) {
                self.ensure_unique::<T>(id, field, value).await?;
            }
        }

        let mut set = Record::new();
        let mut remove = Vec::new();
        for (name, value) in updates {
            if value.is_null() {
                remove.push(name);
            } else {
                set.insert(name, value);
            }
        }

        let declares_updated_at = T::FIELDS.iter().any(|f| f.name == UPDATED_AT);
        if declares_updated_at && !set.contains_key(UPDATED_AT) {
            set.insert(
                UPDATED_AT.to_string(),
                serde_json::to_value(chrono::Utc::now())?,
            );
        }

        debug!(item_type = T::TYPE, id, fields = set.len() + remove.len(), "update item");
        let record = self.backend.update_record(T::TYPE, id, set, &remove).await?;
        from_record(record)
    }

    /// Checks the item that `updates` would produce against `T::validate`.
    async fn validate_merged<T: Item>(&self, id: &str, updates: &Record) -> Result<()> {
        let mut merged = self
            .backend
            .get_record(id)
            .await?
            .filter(|record| record_type(record) == Some(T::TYPE))
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: T::TYPE,
                id: id.to_string(),
            })?;
        for (name, value) in updates {
            if value.is_null() {
                merged.remove(name);
            } else {
                merged.insert(name.clone(), value.clone());
            }
        }
        from_record::<T>(merged)?.validate()
    }

    /// Deletes an item by its ID. Deleting a missing item succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        debug!(id, "delete item");
        self.backend.delete_record(id).await
    }

    /// Deletes an item.
    pub async fn delete_item<T: Item>(&self, item: &T) -> Result<()> {
        self.delete(item.id()).await
    }

    /// Lists items of type `T`, one page at a time.
    ///
    /// The type index is read repeatedly until `query.limit` items pass the
    /// text filter or the type is exhausted. `query.offset` matching items
    /// are skipped first. Following [`Page::next`] until it is `None` visits
    /// every item exactly once.
    pub async fn list_by_type<T: Item>(&self, query: ListQuery) -> Result<Page<T>> {
        query.validate()?;
        let filter = query
            .text
            .as_deref()
            .and_then(|text| TextFilter::new(text, T::SEARCH_FIELDS));

        let mut skip = query.offset;
        let mut start = query.cursor;
        let mut records: Vec<Record> = Vec::new();

        loop {
            let wanted = (query.limit - records.len()).saturating_add(skip);
            let page = self
                .backend
                .query_type_page(T::TYPE, filter.as_ref(), wanted, start.as_ref())
                .await?;

            let mut fetched = page.records.into_iter();
            for record in fetched.by_ref() {
                if skip > 0 {
                    skip -= 1;
                    continue;
                }
                records.push(record);
                if records.len() == query.limit {
                    break;
                }
            }
            let has_rest = fetched.next().is_some();

            if records.len() == query.limit {
                let next = if has_rest || page.last_evaluated.is_some() {
                    records.last().map(ContinuationToken::after)
                } else {
                    None
                };
                return Ok(Page {
                    items: records
                        .into_iter()
                        .map(from_record)
                        .collect::<Result<_>>()?,
                    next,
                });
            }

            match page.last_evaluated {
                Some(token) => start = Some(token),
                None => {
                    return Ok(Page {
                        items: records
                            .into_iter()
                            .map(from_record)
                            .collect::<Result<_>>()?,
                        next: None,
                    })
                }
            }
        }
    }

    /// Counts items of type `T` whose search fields contain `text`.
    pub async fn count<T: Item>(&self, text: Option<&str>) -> Result<usize> {
        let filter = text.and_then(|text| TextFilter::new(text, T::SEARCH_FIELDS));
        self.count_by_type(T::TYPE, filter.as_ref()).await
    }

    /// Counts items of `item_type` without reading them.
    pub async fn count_by_type(&self, item_type: &str, filter: Option<&TextFilter>) -> Result<usize> {
        debug!(item_type, "count items");
        self.backend.count_type(item_type, filter).await
    }

    /// Gets items by ID with the default chunk size.
    pub async fn get_batch<T: Item>(&self, ids: &[String]) -> Result<Vec<T>> {
        self.get_batch_chunked(ids, self.chunk_size).await
    }

    /// Gets items by ID, issuing one multi-get per chunk concurrently.
    ///
    /// Results follow the order of `ids`. Missing IDs are dropped, not
    /// padded.
    pub async fn get_batch_chunked<T: Item>(&self, ids: &[String], chunk_size: usize) -> Result<Vec<T>> {
        let chunks = chunk_unique(ids, chunk_size);
        debug!(item_type = T::TYPE, ids = ids.len(), chunks = chunks.len(), "batch get items");

        let fetched = try_join_all(
            chunks
                .iter()
                .map(|chunk| self.backend.batch_get_records(chunk)),
        )
        .await?;

        reorder_by_ids(ids, fetched.into_iter().flatten().collect())
            .into_iter()
            .map(from_record)
            .collect()
    }
}

fn ensure_indexed(attribute: &str) -> Result<()> {
    if is_indexed(attribute) {
        Ok(())
    } else {
        Err(RepositoryError::Validation(format!(
            "{attribute} has no secondary index"
        )))
    }
}
