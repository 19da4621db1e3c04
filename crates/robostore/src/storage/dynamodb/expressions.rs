//! Expression builder for DynamoDB requests.
//!
//! Attribute names always go through `#n{i}` placeholders and values through
//! `:v{i}` placeholders, so reserved words such as `name` or `type` never
//! appear in an expression.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use robostore_core::item::Record;
use robostore_core::storage::{FieldFilter, FilterOp, RepositoryError, Result, TextFilter};

use super::conversions::to_attribute;

#[derive(Debug, Default)]
pub struct Expressions {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Expressions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for an attribute name. Repeated names share one.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, name)| *name == attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    /// Placeholder for a value.
    pub fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    pub fn string(&mut self, value: &str) -> String {
        self.value(AttributeValue::S(value.to_string()))
    }

    /// `#attr = :value`
    pub fn equals(&mut self, attribute: &str, value: &str) -> String {
        let name = self.name(attribute);
        let value = self.string(value);
        format!("{name} = {value}")
    }

    /// Condition for one extra index filter.
    pub fn field_filter(&mut self, filter: &FieldFilter) -> Result<String> {
        let name = self.name(&filter.attribute);
        let condition = match &filter.op {
            FilterOp::Equals(value) => {
                let value = self.value(to_attribute(value)?);
                format!("{name} = {value}")
            }
            FilterOp::NotEquals(value) => {
                let value = self.value(to_attribute(value)?);
                format!("{name} <> {value}")
            }
            FilterOp::Exists => format!("attribute_exists({name})"),
            FilterOp::NotExists => format!("attribute_not_exists({name})"),
            FilterOp::Contains(needle) => {
                let value = self.string(needle);
                format!("contains({name}, {value})")
            }
        };
        Ok(condition)
    }

    /// Disjunction of `contains` over the filter's fields.
    pub fn text_filter(&mut self, filter: &TextFilter) -> String {
        let needle = self.string(&filter.needle);
        let clauses: Vec<String> = filter
            .fields
            .iter()
            .map(|field| format!("contains({}, {needle})", self.name(field)))
            .collect();
        format!("({})", clauses.join(" OR "))
    }

    /// `#attr IN (:v0, :v1, ...)`
    pub fn one_of(&mut self, attribute: &str, values: &[String]) -> String {
        let name = self.name(attribute);
        let placeholders: Vec<String> = values.iter().map(|v| self.string(v)).collect();
        format!("{name} IN ({})", placeholders.join(", "))
    }

    /// `attribute_not_exists` for every attribute.
    pub fn all_absent(&mut self, attributes: &[&str]) -> String {
        attributes
            .iter()
            .map(|attribute| format!("attribute_not_exists({})", self.name(attribute)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// `SET ... REMOVE ...` update expression.
    pub fn update(&mut self, set: &Record, remove: &[String]) -> Result<String> {
        if set.is_empty() && remove.is_empty() {
            return Err(RepositoryError::Validation(
                "update changes no attributes".to_string(),
            ));
        }

        let mut assignments = Vec::with_capacity(set.len());
        for (attribute, value) in set {
            let name = self.name(attribute);
            let value = self.value(to_attribute(value)?);
            assignments.push(format!("{name} = {value}"));
        }
        let removals: Vec<String> = remove.iter().map(|attribute| self.name(attribute)).collect();

        let mut clauses = Vec::new();
        if !assignments.is_empty() {
            clauses.push(format!("SET {}", assignments.join(", ")));
        }
        if !removals.is_empty() {
            clauses.push(format!("REMOVE {}", removals.join(", ")));
        }
        Ok(clauses.join(" "))
    }

    /// Name placeholders for the request, `None` when unused.
    pub fn names(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    /// Value placeholders for the request, `None` when unused.
    pub fn values(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

/// Joins conditions with `AND`, `None` if there are none.
pub fn all_of(conditions: Vec<String>) -> Option<String> {
    (!conditions.is_empty()).then(|| conditions.join(" AND "))
}
