//! S3 object store.
//!
//! Blobs live in a single bucket under the keys derived by
//! `robostore_core::objects`. Clients upload and download through
//! presigned URLs; the store itself only moves bytes for server-side
//! writes such as artifact uploads.

mod error;

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use chrono::Utc;
use tracing::debug;

use robostore_core::objects::{
    content_disposition, reconcile_parts, validate_completed_parts, validate_expires_in,
    validate_part_number, CompletedPart, MultipartUpload, ObjectStore, ObjectUpload,
    PresignRequest, PresignedUrl, UploadedPart,
};
use robostore_core::storage::{RepositoryError, Result};

use error::{map_multipart_error, map_s3_error};

/// S3-based object store.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, upload: ObjectUpload) -> Result<()> {
        let disposition = upload.content_disposition();
        debug!(bucket = %self.bucket, key = %upload.key, bytes = upload.body.len(), "PutObject");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&upload.key)
            .content_type(&upload.content_type)
            .set_content_disposition(disposition)
            .body(ByteStream::from(upload.body))
            .send()
            .await
            .map_err(|e| map_s3_error(e, &upload.key))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_s3_error(e, key))?;

        let bytes = output.body.collect().await.map_err(|e| {
            RepositoryError::ConnectionFailed(format!("Failed to read S3 body for '{}': {}", key, e))
        })?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        debug!(bucket = %self.bucket, key, "DeleteObject");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_s3_error(e, key))?;

        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| map_s3_error(e, prefix))?;
            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => return Ok(keys),
            }
        }
    }

    async fn presign(
        &self,
        key: &str,
        request: &PresignRequest,
        expires_in: Duration,
    ) -> Result<PresignedUrl> {
        validate_expires_in(expires_in)?;
        request.validate()?;

        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| RepositoryError::Validation(format!("Invalid presign expiry: {e}")))?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in)
                .map_err(|e| RepositoryError::Validation(format!("Invalid presign expiry: {e}")))?;

        let presigned = match request {
            PresignRequest::Get { download_name } => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .set_response_content_disposition(
                    download_name.as_deref().map(content_disposition),
                )
                .presigned(config)
                .await
                .map_err(|e| map_s3_error(e, key))?,
            PresignRequest::Put {
                content_type,
                checksum_sha256,
            } => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type(content_type)
                .set_checksum_sha256(checksum_sha256.clone())
                .presigned(config)
                .await
                .map_err(|e| map_s3_error(e, key))?,
            PresignRequest::UploadPart {
                upload_id,
                part_number,
            } => self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(*part_number)
                .presigned(config)
                .await
                .map_err(|e| map_s3_error(e, key))?,
        };

        debug!(bucket = %self.bucket, key, method = request.method(), "presigned URL");
        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: request.method(),
            headers: signed_headers(presigned.headers()),
            expires_at,
        })
    }

    async fn create_multipart(&self, key: &str, content_type: &str) -> Result<MultipartUpload> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| map_s3_error(e, key))?;

        let upload_id = output.upload_id().ok_or_else(|| {
            RepositoryError::Internal(format!("CreateMultipartUpload returned no ID for '{key}'"))
        })?;
        debug!(bucket = %self.bucket, key, upload_id, "multipart upload created");

        Ok(MultipartUpload {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        })
    }

    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart> {
        validate_part_number(part_number)?;
        let size = body.len() as u64;

        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_multipart_error(e, upload))?;

        let etag = output.e_tag().ok_or_else(|| {
            RepositoryError::Internal(format!("UploadPart returned no ETag for part {part_number}"))
        })?;

        Ok(UploadedPart {
            part_number,
            etag: etag.to_string(),
            size,
        })
    }

    async fn list_parts(&self, upload: &MultipartUpload) -> Result<Vec<UploadedPart>> {
        let mut parts = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_parts()
                .bucket(&self.bucket)
                .key(&upload.key)
                .upload_id(&upload.upload_id)
                .set_part_number_marker(marker.take())
                .send()
                .await
                .map_err(|e| map_multipart_error(e, upload))?;

            parts.extend(output.parts().iter().filter_map(|part| {
                Some(UploadedPart {
                    part_number: part.part_number()?,
                    etag: part.e_tag()?.to_string(),
                    size: part.size().and_then(|s| u64::try_from(s).ok()).unwrap_or_default(),
                })
            }));

            match (output.is_truncated(), output.next_part_number_marker()) {
                (Some(true), Some(next)) => marker = Some(next.to_string()),
                _ => return Ok(parts),
            }
        }
    }

    async fn complete_multipart(
        &self,
        upload: &MultipartUpload,
        parts: &[CompletedPart],
    ) -> Result<()> {
        validate_completed_parts(parts)?;
        let stored = self.list_parts(upload).await?;
        reconcile_parts(parts, &stored)?;

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        S3CompletedPart::builder()
                            .part_number(part.part_number)
                            .e_tag(&part.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| map_multipart_error(e, upload))?;

        debug!(bucket = %self.bucket, key = %upload.key, parts = parts.len(), "multipart upload completed");
        Ok(())
    }

    async fn abort_multipart(&self, upload: &MultipartUpload) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| map_multipart_error(e, upload))?;

        debug!(bucket = %self.bucket, key = %upload.key, "multipart upload aborted");
        Ok(())
    }
}

/// Headers the signature covers, which the client must send verbatim.
/// `host` is left out since it comes from the URL.
fn signed_headers<'a>(headers: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<(String, String)> {
    headers
        .filter(|(name, _)| !name.eq_ignore_ascii_case("host"))
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect()
}
