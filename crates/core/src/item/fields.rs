use chrono::DateTime;
use serde_json::Value;

use super::record::json_kind;
use super::{Item, Record, ID_ATTRIBUTE, TYPE_ATTRIBUTE};
use crate::storage::{RepositoryError, Result};

/// Value shape accepted for an updatable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Bool,
    /// RFC 3339 timestamp string.
    Timestamp,
    StringList,
    /// One of a fixed set of strings (serialized enums).
    OneOf(&'static [&'static str]),
}

/// Schema entry for a field that may be changed by a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldSpec {
    /// A field that must always hold a value.
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    /// A field that may be removed by updating it to `null`.
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Check a partial update against the updatable fields of `T`.
///
/// Rejects the key attributes, unknown fields, values of the wrong shape,
/// and `null` for fields that cannot be removed.
pub fn validate_updates<T: Item>(updates: &Record) -> Result<()> {
    for (name, value) in updates {
        if name == ID_ATTRIBUTE || name == TYPE_ATTRIBUTE {
            return Err(RepositoryError::Validation(format!(
                "{name} cannot be updated"
            )));
        }

        let spec = T::FIELDS
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| {
                RepositoryError::Validation(format!("{} has no updatable field {name}", T::TYPE))
            })?;

        if value.is_null() {
            if spec.nullable {
                continue;
            }
            return Err(RepositoryError::Validation(format!(
                "{}.{name} cannot be null",
                T::TYPE
            )));
        }

        if !value_matches(spec.kind, value) {
            return Err(RepositoryError::Validation(format!(
                "{}.{name} expects {}, got {}",
                T::TYPE,
                describe(spec.kind),
                json_kind(value)
            )));
        }
    }
    Ok(())
}

fn value_matches(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Number => value.is_number(),
        FieldKind::Bool => value.is_boolean(),
        FieldKind::Timestamp => value
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
        FieldKind::StringList => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        FieldKind::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
    }
}

fn describe(kind: FieldKind) -> String {
    match kind {
        FieldKind::String => "a string".to_string(),
        FieldKind::Integer => "an integer".to_string(),
        FieldKind::Number => "a number".to_string(),
        FieldKind::Bool => "a boolean".to_string(),
        FieldKind::Timestamp => "an RFC 3339 timestamp".to_string(),
        FieldKind::StringList => "a list of strings".to_string(),
        FieldKind::OneOf(allowed) => format!("one of {}", allowed.join(", ")),
    }
}
