//! Table and bucket configuration types (Functional Core - pure data).

use crate::item::ID_ATTRIBUTE;
use crate::storage::{index_name, INDEXED_ATTRIBUTES};

/// Table schema configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    pub gsis: Vec<GsiConfig>,
    pub billing_mode: BillingMode,
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::String,
        }
    }
}

/// DynamoDB attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
}

/// Global Secondary Index configuration. Indexes are keyed on a single
/// attribute with no sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiConfig {
    pub name: String,
    pub partition_key: KeyAttribute,
    pub projection: ProjectionType,
}

/// GSI projection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    All,
}

/// Billing mode for the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    PayPerRequest,
}

impl TableConfig {
    /// Sets the table name.
    pub fn with_table_name(mut self, name: &str) -> Self {
        self.table_name = name.to_string();
        self
    }
}

/// Returns the canonical table configuration: `id` as the only key and
/// one `{attr}_index` per indexed attribute.
pub fn robostore_table_config() -> TableConfig {
    TableConfig {
        table_name: "robostore".to_string(),
        partition_key: KeyAttribute::string(ID_ATTRIBUTE),
        gsis: INDEXED_ATTRIBUTES
            .iter()
            .map(|attribute| GsiConfig {
                name: index_name(attribute),
                partition_key: KeyAttribute::string(*attribute),
                projection: ProjectionType::All,
            })
            .collect(),
        billing_mode: BillingMode::PayPerRequest,
    }
}

/// One CORS rule on the artifact bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age_seconds: Option<i32>,
}

impl CorsRule {
    /// Copy with every list sorted, so rules compare equal regardless of
    /// the order the store returns them in.
    pub fn normalized(&self) -> Self {
        let sorted = |values: &[String]| {
            let mut values = values.to_vec();
            values.sort();
            values
        };
        Self {
            allowed_origins: sorted(&self.allowed_origins),
            allowed_methods: sorted(&self.allowed_methods),
            allowed_headers: sorted(&self.allowed_headers),
            expose_headers: sorted(&self.expose_headers),
            max_age_seconds: self.max_age_seconds,
        }
    }
}

/// Rule letting browsers on `origins` download and upload directly with
/// presigned URLs. `ETag` is exposed so clients can complete multipart
/// uploads.
pub fn default_cors_rule(origins: &[String]) -> CorsRule {
    CorsRule {
        allowed_origins: origins.to_vec(),
        allowed_methods: vec!["GET".to_string(), "HEAD".to_string(), "PUT".to_string()],
        allowed_headers: vec!["*".to_string()],
        expose_headers: vec!["ETag".to_string()],
        max_age_seconds: Some(3000),
    }
}

/// Artifact bucket configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    pub bucket_name: String,
    pub region: String,
    pub cors_rules: Vec<CorsRule>,
}

/// Returns the artifact bucket configuration for `origins`.
pub fn robostore_bucket_config(
    bucket_name: impl Into<String>,
    region: impl Into<String>,
    origins: &[String],
) -> BucketConfig {
    BucketConfig {
        bucket_name: bucket_name.into(),
        region: region.into(),
        cors_rules: vec![default_cors_rule(origins)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_config_declares_every_index() {
        let config = robostore_table_config();

        assert_eq!(config.partition_key.name, "id");
        let names: Vec<&str> = config.gsis.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "type_index",
                "user_id_index",
                "listing_id_index",
                "email_index",
                "username_index"
            ]
        );
        assert_eq!(config.gsis[1].partition_key.name, "user_id");
    }

    #[test]
    fn test_with_table_name() {
        let config = robostore_table_config().with_table_name("robostore-test");
        assert_eq!(config.table_name, "robostore-test");
    }

    #[test]
    fn test_cors_rule_normalization_ignores_order() {
        let rule = default_cors_rule(&["https://b.example".to_string(), "https://a.example".to_string()]);
        let mut shuffled = rule.clone();
        shuffled.allowed_methods.reverse();
        shuffled.allowed_origins.reverse();

        assert_ne!(rule, shuffled);
        assert_eq!(rule.normalized(), shuffled.normalized());
    }

    #[test]
    fn test_bucket_config() {
        let config = robostore_bucket_config("artifacts", "us-east-1", &["*".to_string()]);

        assert_eq!(config.cors_rules.len(), 1);
        assert_eq!(config.cors_rules[0].allowed_origins, vec!["*".to_string()]);
    }
}
