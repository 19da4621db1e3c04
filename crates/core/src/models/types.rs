use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::operations::{validate_email, validate_name, validate_non_negative};
use crate::item::{FieldKind, FieldSpec, Item};
use crate::storage::{RepositoryError, Result};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A registered user.
///
/// `email` and `username` are indexed and unique across users. The table
/// itself does not enforce it; the item store checks before writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with a random ID.
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            email: email.into(),
            username: username.into(),
            first_name: None,
            last_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a specific ID for this user (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the first and last name.
    pub fn with_names(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }
}

impl Item for User {
    const TYPE: &'static str = "User";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("username", FieldKind::String),
        FieldSpec::optional("first_name", FieldKind::String),
        FieldSpec::optional("last_name", FieldKind::String),
        FieldSpec::required("updated_at", FieldKind::Timestamp),
    ];
    const UNIQUE_FIELDS: &'static [&'static str] = &["email", "username"];
    const SEARCH_FIELDS: &'static [&'static str] = &["email", "username"];

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_name("User", &self.username, 64)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

/// A marketplace listing for a robot or robot part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Price in the smallest currency unit.
    pub price_amount: Option<i64>,
    pub inventory: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Creates a new listing owned by `user_id`.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            price_amount: None,
            inventory: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a specific ID for this listing (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the description for this listing.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the price in the smallest currency unit.
    pub fn with_price(mut self, amount: i64) -> Self {
        self.price_amount = Some(amount);
        self
    }
}

impl Item for Listing {
    const TYPE: &'static str = "Listing";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("description", FieldKind::String),
        FieldSpec::optional("price_amount", FieldKind::Integer),
        FieldSpec::optional("inventory", FieldKind::Integer),
        FieldSpec::required("tags", FieldKind::StringList),
        FieldSpec::required("updated_at", FieldKind::Timestamp),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_name("Listing", &self.name, 128)?;
        validate_non_negative("price_amount", self.price_amount)?;
        validate_non_negative("inventory", self.inventory)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

/// A robot instance registered by a user against a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robot {
    pub id: String,
    pub user_id: String,
    pub listing_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Robot {
    /// Creates a new robot for `user_id` built from `listing_id`.
    pub fn new(
        user_id: impl Into<String>,
        listing_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            listing_id: listing_id.into(),
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a specific ID for this robot (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl Item for Robot {
    const TYPE: &'static str = "Robot";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("description", FieldKind::String),
        FieldSpec::required("updated_at", FieldKind::Timestamp),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_name("Robot", &self.name, 128)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    InDevelopment,
    BeingAssembled,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Serialized names of every status.
    pub const ALL: &'static [&'static str] = &[
        "processing",
        "in_development",
        "being_assembled",
        "shipped",
        "delivered",
        "cancelled",
        "refunded",
    ];

    /// Returns true once the order can no longer change.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }
}

/// A purchase of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub listing_id: String,
    pub status: OrderStatus,
    pub quantity: u32,
    /// Total in the smallest currency unit.
    pub price_amount: i64,
    pub currency: String,
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order in the `processing` state.
    pub fn new(
        user_id: impl Into<String>,
        listing_id: impl Into<String>,
        quantity: u32,
        price_amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            listing_id: listing_id.into(),
            status: OrderStatus::Processing,
            quantity,
            price_amount,
            currency: currency.into(),
            checkout_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a specific ID for this order (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl Item for Order {
    const TYPE: &'static str = "Order";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("status", FieldKind::OneOf(OrderStatus::ALL)),
        FieldSpec::optional("checkout_session_id", FieldKind::String),
        FieldSpec::required("updated_at", FieldKind::Timestamp),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["status"];

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(RepositoryError::Validation(
                "Order quantity must be at least 1".to_string(),
            ));
        }
        validate_non_negative("price_amount", Some(self.price_amount))?;
        if self.currency.len() != 3 {
            return Err(RepositoryError::Validation(format!(
                "Invalid currency code: {}",
                self.currency
            )));
        }
        Ok(())
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_validation() {
        assert!(User::new("a@x.com", "alice").validate().is_ok());
        assert!(User::new("not-an-email", "alice").validate().is_err());
        assert!(User::new("a@x.com", "").validate().is_err());
    }

    #[test]
    fn test_listing_validation() {
        assert!(Listing::new("u1", "Gripper").with_price(100).validate().is_ok());
        assert!(Listing::new("u1", " ").validate().is_err());
        assert!(Listing::new("u1", "Gripper")
            .with_price(-5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_order_validation() {
        assert!(Order::new("u1", "l1", 1, 5000, "usd").validate().is_ok());
        assert!(Order::new("u1", "l1", 0, 5000, "usd").validate().is_err());
        assert!(Order::new("u1", "l1", 1, 5000, "dollars").validate().is_err());
    }

    #[test]
    fn test_order_status_names_match_serde() {
        let statuses = [
            OrderStatus::Processing,
            OrderStatus::InDevelopment,
            OrderStatus::BeingAssembled,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ];
        for (status, name) in statuses.iter().zip(OrderStatus::ALL) {
            assert_eq!(serde_json::to_value(status).unwrap(), *name);
        }
    }

    #[test]
    fn test_order_status_is_final() {
        assert!(OrderStatus::Delivered.is_final());
        assert!(OrderStatus::Refunded.is_final());
        assert!(!OrderStatus::Shipped.is_final());
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(Listing::new("u1", "a").id, Listing::new("u1", "a").id);
    }
}
