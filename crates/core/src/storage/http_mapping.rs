//! Pure functions for mapping repository errors to HTTP status codes.
//!
//! The data layer never builds responses itself; request handlers use this
//! mapping to pick the status for a failed store call.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to an HTTP status code.
///
/// - `NotFound` -> 404 (Not Found)
/// - `AlreadyExists`, `UniqueViolation` -> 409 (Conflict)
/// - `Validation`, `InvalidMultipart` -> 400 (Bad Request)
/// - `Unauthorized` -> 403 (Forbidden)
/// - `ConnectionFailed` -> 503 (Service Unavailable)
/// - `TypeMismatch`, `Internal`, `QueryFailed`, `Serialization` -> 500
///
/// # Examples
///
/// ```
/// use robostore_core::storage::{RepositoryError, repository_error_to_status_code};
///
/// let error = RepositoryError::NotFound {
///     entity_type: "Listing",
///     id: "abc-123".to_string(),
/// };
/// assert_eq!(repository_error_to_status_code(&error), 404);
/// ```
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::AlreadyExists { .. } => 409,
        RepositoryError::UniqueViolation { .. } => 409,
        RepositoryError::Validation(_) => 400,
        RepositoryError::InvalidMultipart(_) => 400,
        RepositoryError::Unauthorized(_) => 403,
        RepositoryError::ConnectionFailed(_) => 503,
        RepositoryError::TypeMismatch { .. } => 500,
        RepositoryError::Internal(_) => 500,
        RepositoryError::QueryFailed(_) => 500,
        RepositoryError::Serialization(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let error = RepositoryError::NotFound {
            entity_type: "Robot",
            id: "robot-123".to_string(),
        };
        assert_eq!(repository_error_to_status_code(&error), 404);
    }

    #[test]
    fn test_conflicts_map_to_409() {
        let exists = RepositoryError::AlreadyExists {
            entity_type: "User",
            id: "u1".to_string(),
        };
        let unique = RepositoryError::UniqueViolation {
            entity_type: "User",
            field: "email".to_string(),
            value: "a@x.com".to_string(),
        };
        assert_eq!(repository_error_to_status_code(&exists), 409);
        assert_eq!(repository_error_to_status_code(&unique), 409);
    }

    #[test]
    fn test_client_errors_map_to_400() {
        let validation = RepositoryError::Validation("bad field".to_string());
        let multipart = RepositoryError::InvalidMultipart("missing part 2".to_string());
        assert_eq!(repository_error_to_status_code(&validation), 400);
        assert_eq!(repository_error_to_status_code(&multipart), 400);
    }

    #[test]
    fn test_unauthorized_maps_to_403() {
        let error = RepositoryError::Unauthorized("not the owner".to_string());
        assert_eq!(repository_error_to_status_code(&error), 403);
    }

    #[test]
    fn test_connection_failed_maps_to_503() {
        let error = RepositoryError::ConnectionFailed("dns failure".to_string());
        assert_eq!(repository_error_to_status_code(&error), 503);
    }

    #[test]
    fn test_internal_kinds_map_to_500() {
        let mismatch = RepositoryError::TypeMismatch {
            expected: "User",
            found: "Order".to_string(),
            id: "x".to_string(),
        };
        assert_eq!(repository_error_to_status_code(&mismatch), 500);
        assert_eq!(
            repository_error_to_status_code(&RepositoryError::Internal("x".to_string())),
            500
        );
        assert_eq!(
            repository_error_to_status_code(&RepositoryError::QueryFailed("x".to_string())),
            500
        );
        assert_eq!(
            repository_error_to_status_code(&RepositoryError::Serialization("x".to_string())),
            500
        );
    }
}
