//! Typed items persisted in the shared single table.
//!
//! Every entity is stored as a flat [`Record`] carrying its domain fields
//! plus the `id` primary key and the `type` discriminator. The discriminator
//! is attached on write by [`to_record`] and checked on every read by
//! [`from_record`], so a record can never be decoded as the wrong model.

mod fields;
mod record;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::Result;

pub use fields::{validate_updates, FieldKind, FieldSpec};
pub use record::{
    from_record, record_id, record_string, record_type, sort_by_created_at, to_record, Record,
    ID_ATTRIBUTE, TYPE_ATTRIBUTE,
};

/// A domain model stored in the shared table.
pub trait Item: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Discriminator written to the `type` attribute.
    const TYPE: &'static str;

    /// Fields that may be changed through a partial update.
    const FIELDS: &'static [FieldSpec];

    /// Indexed attributes no two items of this type may share.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    /// Attributes matched by the substring filter of `list_by_type`.
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];

    /// Primary key of this item.
    fn id(&self) -> &str;

    /// Field constraints checked before the item is written.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Creation time used to pick an authoritative item among several that
    /// share a secondary index value.
    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}
