//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `RepositoryError` from `robostore_core::storage`.
//! Each operation handles the variants that carry meaning for it (a failed
//! condition on PutItem is a conflict, on UpdateItem a missing item) and
//! hands everything else to [`classify`].

use std::fmt::Debug;

use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use robostore_core::storage::RepositoryError;

/// Classifies failures that never reached the service.
fn transport_error<E, R>(err: &SdkError<E, R>) -> Option<RepositoryError> {
    match err {
        SdkError::TimeoutError(_) => Some(RepositoryError::ConnectionFailed(
            "DynamoDB request timed out".to_string(),
        )),
        SdkError::DispatchFailure(e) => Some(RepositoryError::ConnectionFailed(format!(
            "DynamoDB unreachable: {:?}",
            e
        ))),
        _ => None,
    }
}

/// Maps a service error by its error code.
fn classify<E: ProvideErrorMetadata + Debug>(operation: &str, err: E) -> RepositoryError {
    let message = match err.code() {
        Some("ResourceNotFoundException") => "table or index not found".to_string(),
        Some(
            "ProvisionedThroughputExceededException"
            | "RequestLimitExceeded"
            | "ThrottlingException",
        ) => "throttled, please retry".to_string(),
        Some("TransactionConflictException") => "transaction conflict, please retry".to_string(),
        Some("ItemCollectionSizeLimitExceededException") => {
            "item collection size limit exceeded".to_string()
        }
        Some("InternalServerError") => "DynamoDB internal server error".to_string(),
        _ => format!("{:?}", err),
    };
    RepositoryError::QueryFailed(format!("{operation} failed: {message}"))
}

pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> RepositoryError {
    transport_error(&err).unwrap_or_else(|| classify("GetItem", err.into_service_error()))
}

pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> RepositoryError {
    transport_error(&err).unwrap_or_else(|| classify("Query", err.into_service_error()))
}

pub fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
) -> RepositoryError {
    transport_error(&err).unwrap_or_else(|| classify("Scan", err.into_service_error()))
}

pub fn map_batch_get_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchGetItemError, R>,
) -> RepositoryError {
    transport_error(&err).unwrap_or_else(|| classify("BatchGetItem", err.into_service_error()))
}

/// Map a PutItem SDK error. A failed condition means the id or a unique
/// value is already taken.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => RepositoryError::AlreadyExists {
            entity_type,
            id: id.into(),
        },
        err => classify("PutItem", err),
    }
}

/// Map an UpdateItem SDK error.
///
/// A failed condition means the item is missing or has another type.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => RepositoryError::NotFound {
            entity_type,
            id: id.into(),
        },
        err => classify("UpdateItem", err),
    }
}

pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
) -> RepositoryError {
    transport_error(&err).unwrap_or_else(|| classify("DeleteItem", err.into_service_error()))
}

