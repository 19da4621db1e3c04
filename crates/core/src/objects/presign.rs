use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::{content_disposition, validate_part_number};
use crate::storage::{RepositoryError, Result};

/// Shortest lifetime accepted for a presigned URL.
pub const MIN_PRESIGN_EXPIRY: Duration = Duration::from_secs(1);

/// Longest lifetime accepted for a presigned URL (SigV4 limit).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Header a client must send with the value a presigned upload was
/// signed for.
pub const CHECKSUM_SHA256_HEADER: &str = "x-amz-checksum-sha256";

/// Fails unless `expires_in` is within the accepted presign lifetime.
pub fn validate_expires_in(expires_in: Duration) -> Result<()> {
    if expires_in < MIN_PRESIGN_EXPIRY || expires_in > MAX_PRESIGN_EXPIRY {
        return Err(RepositoryError::Validation(format!(
            "expires_in must be between {}s and {}s, got {}s",
            MIN_PRESIGN_EXPIRY.as_secs(),
            MAX_PRESIGN_EXPIRY.as_secs(),
            expires_in.as_secs_f64()
        )));
    }
    Ok(())
}

/// Base64 SHA-256 digest in the form expected by `x-amz-checksum-sha256`.
pub fn checksum_sha256(data: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(data))
}

/// A blob to store, with the metadata browsers need to download it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUpload {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// Name offered to browsers when the object is downloaded.
    pub filename: Option<String>,
}

impl ObjectUpload {
    pub fn new(key: impl Into<String>, body: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body,
            content_type: content_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// `Content-Disposition` value stored with the object, if any.
    pub fn content_disposition(&self) -> Option<String> {
        self.filename.as_deref().map(content_disposition)
    }
}

/// What a presigned URL grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresignRequest {
    /// Download the object, optionally under a different file name.
    Get { download_name: Option<String> },
    /// Upload the object in one request.
    Put {
        content_type: String,
        /// Base64 SHA-256 the upload must match.
        checksum_sha256: Option<String>,
    },
    /// Upload one part of a multipart upload.
    UploadPart { upload_id: String, part_number: i32 },
}

impl PresignRequest {
    pub fn download() -> Self {
        PresignRequest::Get {
            download_name: None,
        }
    }

    pub fn download_as(name: impl Into<String>) -> Self {
        PresignRequest::Get {
            download_name: Some(name.into()),
        }
    }

    pub fn upload(content_type: impl Into<String>) -> Self {
        PresignRequest::Put {
            content_type: content_type.into(),
            checksum_sha256: None,
        }
    }

    pub fn upload_with_checksum(content_type: impl Into<String>, data: &[u8]) -> Self {
        PresignRequest::Put {
            content_type: content_type.into(),
            checksum_sha256: Some(checksum_sha256(data)),
        }
    }

    pub fn upload_part(upload_id: impl Into<String>, part_number: i32) -> Self {
        PresignRequest::UploadPart {
            upload_id: upload_id.into(),
            part_number,
        }
    }

    /// HTTP method the URL is signed for.
    pub fn method(&self) -> &'static str {
        match self {
            PresignRequest::Get { .. } => "GET",
            PresignRequest::Put { .. } | PresignRequest::UploadPart { .. } => "PUT",
        }
    }

    /// Headers the client must send verbatim for the signature to hold.
    pub fn signed_headers(&self) -> Vec<(String, String)> {
        match self {
            PresignRequest::Get { .. } | PresignRequest::UploadPart { .. } => Vec::new(),
            PresignRequest::Put {
                content_type,
                checksum_sha256,
            } => {
                let mut headers = vec![("content-type".to_string(), content_type.clone())];
                if let Some(checksum) = checksum_sha256 {
                    headers.push((CHECKSUM_SHA256_HEADER.to_string(), checksum.clone()));
                }
                headers
            }
        }
    }

    /// Checks request fields that the store would otherwise reject late.
    pub fn validate(&self) -> Result<()> {
        match self {
            PresignRequest::Get { .. } => Ok(()),
            PresignRequest::Put {
                content_type,
                checksum_sha256,
            } => {
                if content_type.trim().is_empty() {
                    return Err(RepositoryError::Validation(
                        "content type is required for uploads".to_string(),
                    ));
                }
                if let Some(checksum) = checksum_sha256 {
                    let valid = STANDARD
                        .decode(checksum)
                        .is_ok_and(|digest| digest.len() == 32);
                    if !valid {
                        return Err(RepositoryError::Validation(format!(
                            "{CHECKSUM_SHA256_HEADER} must be a base64 SHA-256 digest"
                        )));
                    }
                }
                Ok(())
            }
            PresignRequest::UploadPart {
                upload_id,
                part_number,
            } => {
                if upload_id.is_empty() {
                    return Err(RepositoryError::InvalidMultipart(
                        "upload ID is required".to_string(),
                    ));
                }
                validate_part_number(*part_number)
            }
        }
    }
}

/// A time-limited URL granting one operation on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub method: &'static str,
    /// Headers the client must include when using the URL.
    pub headers: Vec<(String, String)>,
    pub expires_at: DateTime<Utc>,
}

impl PresignedUrl {
    /// Returns true once the URL can no longer be used.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
