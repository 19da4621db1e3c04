use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;

use super::{RepositoryError, Result};
use crate::item::{record_id, Record, ID_ATTRIBUTE, TYPE_ATTRIBUTE};

/// Number of items returned by a listing when the caller sets no limit.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Case-sensitive substring filter over a fixed set of attributes.
///
/// A record matches if any of the attributes contains the needle. String
/// list attributes match when one of their elements equals the needle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub needle: String,
    pub fields: &'static [&'static str],
}

impl TextFilter {
    /// Builds a filter, or `None` if the needle is blank.
    pub fn new(needle: impl Into<String>, fields: &'static [&'static str]) -> Option<Self> {
        let needle = needle.into();
        if needle.trim().is_empty() || fields.is_empty() {
            return None;
        }
        Some(Self { needle, fields })
    }

    /// Returns true if the record passes the filter.
    pub fn matches(&self, record: &Record) -> bool {
        self.fields
            .iter()
            .any(|field| value_contains(record.get(*field), &self.needle))
    }
}

fn value_contains(value: Option<&Value>, needle: &str) -> bool {
    match value {
        Some(Value::String(s)) => s.contains(needle),
        Some(Value::Array(values)) => values.iter().any(|v| v.as_str() == Some(needle)),
        _ => false,
    }
}

/// Comparison applied by a [`FieldFilter`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Equals(Value),
    NotEquals(Value),
    Exists,
    NotExists,
    Contains(String),
}

/// Extra condition applied on top of an index lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub attribute: String,
    pub op: FilterOp,
}

impl FieldFilter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            op: FilterOp::Equals(value.into()),
        }
    }

    pub fn not_equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            op: FilterOp::NotEquals(value.into()),
        }
    }

    pub fn exists(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            op: FilterOp::Exists,
        }
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            op: FilterOp::NotExists,
        }
    }

    pub fn contains(attribute: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            op: FilterOp::Contains(needle.into()),
        }
    }

    /// Returns true if the record passes the filter.
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.attribute);
        match &self.op {
            FilterOp::Equals(expected) => value == Some(expected),
            FilterOp::NotEquals(expected) => value != Some(expected),
            FilterOp::Exists => value.is_some(),
            FilterOp::NotExists => value.is_none(),
            FilterOp::Contains(needle) => value_contains(value, needle),
        }
    }
}

/// Opaque cursor returned with a page of results.
///
/// Wraps the key of the last item of the page. Callers pass it back
/// unchanged, usually after a round trip through [`encode`](Self::encode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(Record);

impl ContinuationToken {
    /// Builds a token positioned after `record` on the type index.
    pub fn after(record: &Record) -> Self {
        let key = [ID_ATTRIBUTE, TYPE_ATTRIBUTE]
            .iter()
            .filter_map(|name| record.get(*name).map(|v| (name.to_string(), v.clone())))
            .collect();
        Self(key)
    }

    /// Wraps a key returned by the backend.
    pub fn from_key(key: Record) -> Self {
        Self(key)
    }

    /// Key attributes of the last item read.
    pub fn key(&self) -> &Record {
        &self.0
    }

    /// Primary key of the last item read.
    pub fn id(&self) -> Option<&str> {
        record_id(&self.0)
    }

    /// Encodes the token as URL-safe base64 JSON.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(Value::Object(self.0.clone()).to_string())
    }

    /// Decodes a token produced by [`encode`](Self::encode).
    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || RepositoryError::Validation("Invalid continuation token".to_string());

        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(key)) if record_id(&key).is_some() => Ok(Self(key)),
            _ => Err(invalid()),
        }
    }
}

/// Parameters of a paginated listing by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Substring matched against the item's search fields.
    pub text: Option<String>,
    /// Maximum number of items to return.
    pub limit: usize,
    /// Number of matching items to skip before collecting.
    pub offset: usize,
    /// Resume after the item a previous page ended on.
    pub cursor: Option<ContinuationToken>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            text: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            cursor: None,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Continue from the end of a previous page.
    pub fn after(mut self, cursor: ContinuationToken) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Fails if the query cannot return anything.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(RepositoryError::Validation(
                "limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page, `None` once the listing is exhausted.
    pub next: Option<ContinuationToken>,
}

impl<T> Page<T> {
    /// Returns true if no further page exists.
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// Raw records returned by a single backend query call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    pub records: Vec<Record>,
    /// Set when the backend stopped before exhausting the query.
    pub last_evaluated: Option<ContinuationToken>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing() -> Record {
        json!({
            "id": "l1",
            "type": "Listing",
            "name": "Six-axis arm",
            "description": "Refurbished",
            "tags": ["arm", "industrial"],
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_text_filter_matches_substring() {
        let filter = TextFilter::new("axis", &["name", "description"]).unwrap();
        assert!(filter.matches(&listing()));

        let filter = TextFilter::new("AXIS", &["name", "description"]).unwrap();
        assert!(!filter.matches(&listing()));
    }

    #[test]
    fn test_text_filter_matches_list_element() {
        let filter = TextFilter::new("arm", &["tags"]).unwrap();
        assert!(filter.matches(&listing()));

        let filter = TextFilter::new("ar", &["tags"]).unwrap();
        assert!(!filter.matches(&listing()));
    }

    #[test]
    fn test_text_filter_blank_is_none() {
        assert!(TextFilter::new("  ", &["name"]).is_none());
        assert!(TextFilter::new("arm", &[]).is_none());
    }

    #[test]
    fn test_field_filters() {
        let record = listing();

        assert!(FieldFilter::equals("name", "Six-axis arm").matches(&record));
        assert!(FieldFilter::not_equals("name", "Gripper").matches(&record));
        assert!(FieldFilter::exists("description").matches(&record));
        assert!(FieldFilter::not_exists("price_amount").matches(&record));
        assert!(FieldFilter::contains("description", "furb").matches(&record));
        assert!(!FieldFilter::equals("missing", "x").matches(&record));
    }

    #[test]
    fn test_token_keeps_only_key_attributes() {
        let token = ContinuationToken::after(&listing());

        assert_eq!(token.key().len(), 2);
        assert_eq!(token.id(), Some("l1"));
    }

    #[test]
    fn test_token_encoding() {
        let token = ContinuationToken::after(&listing());

        let decoded = ContinuationToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_token_decode_rejects_garbage() {
        assert!(ContinuationToken::decode("not base64!").is_err());
        // valid base64 of a JSON array
        assert!(ContinuationToken::decode(&URL_SAFE_NO_PAD.encode("[1]")).is_err());
        assert!(ContinuationToken::decode(&URL_SAFE_NO_PAD.encode("{\"type\":\"x\"}")).is_err());
    }

    #[test]
    fn test_list_query_validation() {
        assert!(ListQuery::new().validate().is_ok());
        assert!(ListQuery::new().with_limit(0).validate().is_err());
    }
}
