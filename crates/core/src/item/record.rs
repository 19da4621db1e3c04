use serde_json::{Map, Value};

use super::Item;
use crate::storage::{RepositoryError, Result};

/// Backend-neutral representation of a stored item.
pub type Record = Map<String, Value>;

/// Primary key attribute of the shared table.
pub const ID_ATTRIBUTE: &str = "id";

/// Discriminator attribute naming the model stored in a record.
pub const TYPE_ATTRIBUTE: &str = "type";

/// Serialize an item into a tagged record.
///
/// `null` fields are dropped so that absent optional values are stored as
/// absent attributes rather than explicit nulls.
pub fn to_record<T: Item>(item: &T) -> Result<Record> {
    let mut record = match serde_json::to_value(item)? {
        Value::Object(record) => record,
        other => {
            return Err(RepositoryError::Serialization(format!(
                "{} serialized to {} instead of an object",
                T::TYPE,
                json_kind(&other)
            )))
        }
    };

    record.retain(|_, value| !value.is_null());

    match record.get(ID_ATTRIBUTE) {
        Some(Value::String(id)) if id == item.id() => {}
        _ => {
            return Err(RepositoryError::Serialization(format!(
                "{} record does not carry its id as a string",
                T::TYPE
            )))
        }
    }

    record.insert(
        TYPE_ATTRIBUTE.to_string(),
        Value::String(T::TYPE.to_string()),
    );
    Ok(record)
}

/// Decode a tagged record, failing if it was written for another model.
pub fn from_record<T: Item>(mut record: Record) -> Result<T> {
    let id = record_id(&record).unwrap_or("<missing id>").to_string();

    match record.remove(TYPE_ATTRIBUTE) {
        Some(Value::String(found)) if found == T::TYPE => {}
        Some(Value::String(found)) => {
            return Err(RepositoryError::TypeMismatch {
                expected: T::TYPE,
                found,
                id,
            })
        }
        Some(other) => {
            return Err(RepositoryError::Internal(format!(
                "Item {id} has a non-string type attribute ({})",
                json_kind(&other)
            )))
        }
        None => {
            return Err(RepositoryError::Internal(format!(
                "Item {id} has no type attribute"
            )))
        }
    }

    serde_json::from_value(Value::Object(record))
        .map_err(|e| RepositoryError::Internal(format!("Malformed {} {id}: {e}", T::TYPE)))
}

/// Get the primary key of a record.
pub fn record_id(record: &Record) -> Option<&str> {
    record_string(record, ID_ATTRIBUTE)
}

/// Get the discriminator of a record.
pub fn record_type(record: &Record) -> Option<&str> {
    record_string(record, TYPE_ATTRIBUTE)
}

/// Get a string attribute of a record.
pub fn record_string<'a>(record: &'a Record, attribute: &str) -> Option<&'a str> {
    record.get(attribute).and_then(Value::as_str)
}

/// Sort items oldest first; items without a creation time go last.
///
/// Stores give no ordering guarantee for index queries, so callers that
/// need "the first image of a listing" sort client-side with this.
pub fn sort_by_created_at<T: Item>(items: &mut [T]) {
    items.sort_by(|a, b| match (a.created_at(), b.created_at()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Listing, User};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample_user() -> User {
        User::new("a@x.com", "alice").with_id("u1")
    }

    #[test]
    fn test_to_record_attaches_type() {
        let record = to_record(&sample_user()).unwrap();

        assert_eq!(record_type(&record), Some("User"));
        assert_eq!(record_id(&record), Some("u1"));
        assert_eq!(record_string(&record, "email"), Some("a@x.com"));
    }

    #[test]
    fn test_to_record_drops_null_fields() {
        let record = to_record(&sample_user()).unwrap();

        assert!(!record.contains_key("first_name"));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let user = sample_user().with_names("Alice", "Liddell");
        let parsed: User = from_record(to_record(&user).unwrap()).unwrap();

        assert_eq!(parsed, user);
    }

    #[test]
    fn test_from_record_rejects_other_type() {
        let record = to_record(&sample_user()).unwrap();

        let err = from_record::<Listing>(record).unwrap_err();

        assert_eq!(
            err,
            RepositoryError::TypeMismatch {
                expected: "Listing",
                found: "User".to_string(),
                id: "u1".to_string(),
            }
        );
    }

    #[test]
    fn test_from_record_requires_type() {
        let mut record = to_record(&sample_user()).unwrap();
        record.remove(TYPE_ATTRIBUTE);

        let err = from_record::<User>(record).unwrap_err();

        assert!(matches!(err, RepositoryError::Internal(_)));
    }

    #[test]
    fn test_from_record_reports_malformed_fields() {
        let record = json!({"id": "u1", "type": "User", "email": 42})
            .as_object()
            .cloned()
            .unwrap();

        let err = from_record::<User>(record).unwrap_err();

        assert!(matches!(err, RepositoryError::Internal(_)));
    }

    #[test]
    fn test_sort_by_created_at_orders_oldest_first() {
        let mut newer = sample_user().with_id("u2");
        newer.created_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut older = sample_user().with_id("u3");
        older.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut users = vec![newer, older];
        sort_by_created_at(&mut users);

        assert_eq!(users[0].id, "u3");
        assert_eq!(users[1].id, "u2");
    }
}
