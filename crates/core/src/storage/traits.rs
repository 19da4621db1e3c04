use async_trait::async_trait;

use super::{ContinuationToken, FieldFilter, RawPage, Result, TextFilter};
use crate::item::Record;

/// Record-level access to the shared single table.
///
/// Implementations deal in tagged [`Record`]s only; typing, validation and
/// pagination policy live in the item store built on top.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Writes a new record.
    ///
    /// The write is conditional: it fails with `AlreadyExists` if an item
    /// with the same `id` exists or if the stored item already has any of
    /// the `absent` attributes.
    async fn put_record(
        &self,
        item_type: &'static str,
        record: Record,
        absent: &[&str],
    ) -> Result<()>;

    /// Gets a record by its ID.
    async fn get_record(&self, id: &str) -> Result<Option<Record>>;

    /// Applies a partial update to an existing record of `item_type`.
    ///
    /// Attributes in `set` are overwritten and attributes in `remove` are
    /// deleted. Fails with `NotFound` if no item with this ID and type
    /// exists. Returns the record as stored after the update.
    async fn update_record(
        &self,
        item_type: &'static str,
        id: &str,
        set: Record,
        remove: &[String],
    ) -> Result<Record>;

    /// Deletes a record. Deleting a missing record succeeds.
    async fn delete_record(&self, id: &str) -> Result<()>;

    /// Reads one page of the type index.
    ///
    /// At most `evaluate` records are examined before `filter` is applied,
    /// so a page may hold fewer records than requested while
    /// `last_evaluated` is still set.
    async fn query_type_page(
        &self,
        item_type: &str,
        filter: Option<&TextFilter>,
        evaluate: usize,
        start: Option<&ContinuationToken>,
    ) -> Result<RawPage>;

    /// Counts the records of a type that pass `filter`.
    async fn count_type(&self, item_type: &str, filter: Option<&TextFilter>) -> Result<usize>;

    /// Fetches up to one chunk of records by ID, in no particular order.
    ///
    /// `ids` must be free of duplicates. Missing IDs are skipped.
    async fn batch_get_records(&self, ids: &[String]) -> Result<Vec<Record>>;

    /// Returns every record of `item_type` whose `attribute` equals `value`
    /// and that passes all of `filters`.
    async fn query_index(
        &self,
        attribute: &str,
        value: &str,
        item_type: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Record>>;

    /// Returns every record of `item_type` whose `attribute` is one of
    /// `values`.
    async fn scan_attribute_in(
        &self,
        attribute: &str,
        values: &[String],
        item_type: &str,
    ) -> Result<Vec<Record>>;
}
