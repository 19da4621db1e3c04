use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} with {field} '{value}' already exists")]
    UniqueViolation {
        entity_type: &'static str,
        field: String,
        value: String,
    },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Item {id} has type {found}, expected {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
        id: String,
    },
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Invalid multipart upload: {0}")]
    InvalidMultipart(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    /// Returns true for the conflict kinds raised by conditional writes.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::AlreadyExists { .. } | RepositoryError::UniqueViolation { .. }
        )
    }

    /// Returns true if the error reports a missing item or object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
