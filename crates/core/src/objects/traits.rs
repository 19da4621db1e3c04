use std::time::Duration;

use async_trait::async_trait;

use super::{
    CompletedPart, MultipartUpload, ObjectUpload, PresignRequest, PresignedUrl, UploadedPart,
};
use crate::storage::Result;

/// Blob storage for artifact payloads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores an object, replacing any previous object under the same key.
    async fn put_object(&self, upload: ObjectUpload) -> Result<()>;

    /// Reads an object. Fails with `NotFound` if the key is missing.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Deletes an object. Deleting a missing key succeeds.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Lists every key under `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Signs a URL granting `request` on `key` for `expires_in`.
    async fn presign(
        &self,
        key: &str,
        request: &PresignRequest,
        expires_in: Duration,
    ) -> Result<PresignedUrl>;

    /// Starts a multipart upload.
    async fn create_multipart(&self, key: &str, content_type: &str) -> Result<MultipartUpload>;

    /// Uploads one part through the store itself rather than a presigned URL.
    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart>;

    /// Lists the parts the store holds for an upload.
    async fn list_parts(&self, upload: &MultipartUpload) -> Result<Vec<UploadedPart>>;

    /// Assembles the object from `parts`.
    ///
    /// Fails with `InvalidMultipart` without completing anything if the
    /// parts do not match what was uploaded.
    async fn complete_multipart(
        &self,
        upload: &MultipartUpload,
        parts: &[CompletedPart],
    ) -> Result<()>;

    /// Abandons an upload and discards its parts.
    async fn abort_multipart(&self, upload: &MultipartUpload) -> Result<()>;
}
