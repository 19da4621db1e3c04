//! Single-table item store and artifact storage.
//!
//! [`store::ItemStore`] reads and writes typed items through a
//! [`robostore_core::storage::TableBackend`], and
//! [`artifacts::ArtifactService`] pairs it with an
//! [`robostore_core::objects::ObjectStore`] for artifact blobs. Backends:
//!
//! - `inmemory` feature: [`storage::InMemoryTable`] and [`storage::InMemoryObjectStore`]
//! - `aws` feature: [`storage::DynamoDbTable`] and [`storage::S3ObjectStore`], plus
//!   client setup in [`aws`] and idempotent provisioning in [`provision`]

pub mod artifacts;
pub mod config;
pub mod storage;
pub mod store;

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "aws")]
pub mod provision;

pub use config::{AwsConfig, Config};
