//! Storage backend implementations.
//!
//! This module provides concrete implementations of the `TableBackend` and
//! `ObjectStore` traits defined in `robostore_core`. Backends are selected
//! at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory table and object store for tests
//! - `aws` (default): DynamoDB table and S3 object store
//!
//! Both can be enabled at the same time.

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "aws")]
pub mod dynamodb;

#[cfg(feature = "aws")]
pub mod s3;

#[cfg(feature = "inmemory")]
pub use inmemory::{InMemoryObjectStore, InMemoryTable};

#[cfg(feature = "aws")]
pub use dynamodb::DynamoDbTable;

#[cfg(feature = "aws")]
pub use s3::S3ObjectStore;
