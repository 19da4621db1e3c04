//! S3 error mapping.

use std::fmt::Debug;

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use robostore_core::objects::MultipartUpload;
use robostore_core::storage::RepositoryError;

/// Map an SDK error to RepositoryError, classifying by HTTP status.
pub fn map_s3_error<E: Debug>(err: SdkError<E>, key: &str) -> RepositoryError {
    match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            match status {
                404 => RepositoryError::NotFound {
                    entity_type: "Object",
                    id: key.to_string(),
                },
                401 | 403 => {
                    RepositoryError::Unauthorized(format!("Access denied for key '{}'", key))
                }
                _ => RepositoryError::QueryFailed(format!(
                    "S3 error for key '{}' (HTTP {}): {:?}",
                    key, status, err
                )),
            }
        }
        SdkError::TimeoutError(_) => {
            RepositoryError::ConnectionFailed(format!("S3 timeout for key '{}'", key))
        }
        SdkError::DispatchFailure(_) => RepositoryError::ConnectionFailed(format!(
            "S3 connection error for key '{}': {:?}",
            key, err
        )),
        _ => RepositoryError::QueryFailed(format!("S3 error for key '{}': {:?}", key, err)),
    }
}

/// Map a multipart SDK error, treating rejected uploads and parts as
/// client-correctable.
pub fn map_multipart_error<E: ProvideErrorMetadata + Debug>(
    err: SdkError<E>,
    upload: &MultipartUpload,
) -> RepositoryError {
    match err.code() {
        Some("NoSuchUpload") => RepositoryError::InvalidMultipart(format!(
            "upload {} does not exist or was already completed or aborted",
            upload.upload_id
        )),
        Some(code @ ("InvalidPart" | "InvalidPartOrder" | "EntityTooSmall")) => {
            RepositoryError::InvalidMultipart(format!(
                "{}: {}",
                code,
                err.message().unwrap_or("rejected by the object store")
            ))
        }
        _ => map_s3_error(err, &upload.key),
    }
}
