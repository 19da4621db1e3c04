use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::storage::{RepositoryError, Result};

/// Highest part number a multipart upload accepts.
pub const MAX_PART_NUMBER: i32 = 10_000;

/// Handle to an in-progress multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
}

/// A part as reported by the client when completing an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

impl CompletedPart {
    pub fn new(part_number: i32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// A part as recorded by the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPart {
    pub part_number: i32,
    pub etag: String,
    pub size: u64,
}

/// Lifecycle of a multipart upload.
///
/// `Initiated` moves to `PartsUploading` on the first part, then to
/// `Completed`. Abort is allowed from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartState {
    Initiated,
    PartsUploading,
    Completed,
    Abandoned,
}

impl MultipartState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MultipartState::Completed | MultipartState::Abandoned)
    }

    pub fn part_uploaded(self) -> Result<Self> {
        match self {
            MultipartState::Initiated | MultipartState::PartsUploading => {
                Ok(MultipartState::PartsUploading)
            }
            terminal => Err(closed(terminal)),
        }
    }

    pub fn complete(self) -> Result<Self> {
        match self {
            MultipartState::PartsUploading => Ok(MultipartState::Completed),
            MultipartState::Initiated => Err(RepositoryError::InvalidMultipart(
                "no parts have been uploaded".to_string(),
            )),
            terminal => Err(closed(terminal)),
        }
    }

    pub fn abort(self) -> Result<Self> {
        match self {
            MultipartState::Initiated | MultipartState::PartsUploading => {
                Ok(MultipartState::Abandoned)
            }
            terminal => Err(closed(terminal)),
        }
    }
}

fn closed(state: MultipartState) -> RepositoryError {
    RepositoryError::InvalidMultipart(format!("upload is already {state:?}").to_lowercase())
}

/// Fails unless `part_number` is a valid S3 part number.
pub fn validate_part_number(part_number: i32) -> Result<()> {
    if !(1..=MAX_PART_NUMBER).contains(&part_number) {
        return Err(RepositoryError::InvalidMultipart(format!(
            "part number {part_number} is outside 1..={MAX_PART_NUMBER}"
        )));
    }
    Ok(())
}

/// Checks a completion request before it is sent to the store.
///
/// Parts must be non-empty, in strictly ascending order, within the part
/// number range, and carry an ETag.
pub fn validate_completed_parts(parts: &[CompletedPart]) -> Result<()> {
    if parts.is_empty() {
        return Err(RepositoryError::InvalidMultipart(
            "at least one part is required".to_string(),
        ));
    }

    let mut previous = 0;
    for part in parts {
        validate_part_number(part.part_number)?;
        if part.part_number <= previous {
            return Err(RepositoryError::InvalidMultipart(format!(
                "part {} is out of order",
                part.part_number
            )));
        }
        if part.etag.trim().is_empty() {
            return Err(RepositoryError::InvalidMultipart(format!(
                "part {} has no ETag",
                part.part_number
            )));
        }
        previous = part.part_number;
    }
    Ok(())
}

/// Checks a completion request against the parts the store holds.
pub fn reconcile_parts(requested: &[CompletedPart], stored: &[UploadedPart]) -> Result<()> {
    validate_completed_parts(requested)?;

    let stored: HashMap<i32, &str> = stored
        .iter()
        .map(|part| (part.part_number, part.etag.as_str()))
        .collect();

    for part in requested {
        match stored.get(&part.part_number) {
            None => {
                return Err(RepositoryError::InvalidMultipart(format!(
                    "part {} was never uploaded",
                    part.part_number
                )))
            }
            Some(etag) if normalize_etag(etag) != normalize_etag(&part.etag) => {
                return Err(RepositoryError::InvalidMultipart(format!(
                    "ETag mismatch for part {}",
                    part.part_number
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn normalize_etag(etag: &str) -> &str {
    etag.trim_matches('"')
}
