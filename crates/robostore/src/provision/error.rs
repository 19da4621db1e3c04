//! Error types for provisioning.

use thiserror::Error;

/// Result type alias for the provision module.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that can occur while provisioning the table or bucket.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Timeout waiting for table '{table_name}' to become active")]
    TableActivationTimeout { table_name: String },

    #[error("Bucket '{bucket_name}' already exists and is owned by another account")]
    BucketOwnedElsewhere { bucket_name: String },

    #[error("Operation cancelled by user")]
    UserCancelled,
}
