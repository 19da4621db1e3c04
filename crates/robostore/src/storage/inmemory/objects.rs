//! In-memory object store.
//!
//! Presigned URLs are real capabilities here: each one is recorded with its
//! grant and expiry, and [`InMemoryObjectStore::fetch_presigned`] and
//! [`InMemoryObjectStore::put_presigned`] refuse URLs that have expired or
//! are used for another operation. The store's clock can be moved forward
//! with [`InMemoryObjectStore::advance_clock`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use robostore_core::objects::{
    checksum_sha256, reconcile_parts, validate_expires_in, CompletedPart, MultipartState,
    MultipartUpload, ObjectStore, ObjectUpload, PresignRequest, PresignedUrl, UploadedPart,
    CHECKSUM_SHA256_HEADER,
};
use robostore_core::storage::{RepositoryError, Result};

/// A stored blob with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_disposition: Option<String>,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    content_type: String,
    state: MultipartState,
    parts: BTreeMap<i32, (String, Vec<u8>)>,
}

#[derive(Debug)]
struct IssuedUrl {
    key: String,
    request: PresignRequest,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    issued: HashMap<String, IssuedUrl>,
    clock_offset: chrono::Duration,
}

impl Default for State {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            uploads: HashMap::new(),
            issued: HashMap::new(),
            clock_offset: chrono::Duration::zero(),
        }
    }
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }

    fn upload_mut(&mut self, upload: &MultipartUpload) -> Result<&mut PendingUpload> {
        self.uploads
            .get_mut(&upload.upload_id)
            .filter(|pending| pending.key == upload.key)
            .ok_or_else(|| unknown_upload(upload))
    }
}

fn unknown_upload(upload: &MultipartUpload) -> RepositoryError {
    RepositoryError::InvalidMultipart(format!(
        "no upload {} for key {}",
        upload.upload_id, upload.key
    ))
}

fn etag(body: &[u8]) -> String {
    format!("\"{}\"", &hex::encode(Sha256::digest(body))[..32])
}

fn object_not_found(key: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: "Object",
        id: key.to_string(),
    }
}

/// In-memory object store for testing.
#[derive(Debug, Clone)]
pub struct InMemoryObjectStore {
    bucket: String,
    state: Arc<RwLock<State>>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new("robostore-artifacts")
    }
}

impl InMemoryObjectStore {
    /// Creates an empty store named `bucket`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Moves the store's clock forward.
    pub async fn advance_clock(&self, by: chrono::Duration) {
        let mut state = self.state.write().await;
        state.clock_offset += by;
    }

    /// Returns the stored object and its metadata.
    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        let state = self.state.read().await;
        state.objects.get(key).cloned()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.state.read().await.objects.len()
    }

    /// Returns true if no object is stored.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.objects.is_empty()
    }

    async fn redeem(&self, url: &str, method: &str) -> Result<(String, PresignRequest)> {
        let state = self.state.read().await;
        let issued = state
            .issued
            .get(url)
            .ok_or_else(|| RepositoryError::Unauthorized("Unknown presigned URL".to_string()))?;

        if issued.expires_at <= state.now() {
            return Err(RepositoryError::Unauthorized(
                "Presigned URL expired".to_string(),
            ));
        }
        if issued.request.method() != method {
            return Err(RepositoryError::Unauthorized(format!(
                "Presigned URL does not allow {method}"
            )));
        }
        Ok((issued.key.clone(), issued.request.clone()))
    }

    /// Downloads through a presigned GET URL.
    pub async fn fetch_presigned(&self, url: &str) -> Result<Vec<u8>> {
        let (key, _) = self.redeem(url, "GET").await?;
        self.get_object(&key).await
    }

    /// Uploads through a presigned PUT URL, sending `headers` with the body.
    ///
    /// Returns the ETag of the stored object or part.
    pub async fn put_presigned(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<String> {
        let (key, request) = self.redeem(url, "PUT").await?;
        let header = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };

        for (name, value) in request.signed_headers() {
            if header(&name) != Some(value.as_str()) {
                return Err(RepositoryError::Unauthorized(format!(
                    "Signed header {name} is missing or altered"
                )));
            }
        }

        match request {
            PresignRequest::Put {
                content_type,
                checksum_sha256: expected,
            } => {
                if let Some(expected) = expected {
                    if checksum_sha256(&body) != expected {
                        return Err(RepositoryError::Validation(format!(
                            "Body does not match {CHECKSUM_SHA256_HEADER}"
                        )));
                    }
                }
                let tag = etag(&body);
                self.put_object(ObjectUpload::new(key, body, content_type))
                    .await?;
                Ok(tag)
            }
            PresignRequest::UploadPart {
                upload_id,
                part_number,
            } => {
                let upload = MultipartUpload { key, upload_id };
                let part = self.upload_part(&upload, part_number, body).await?;
                Ok(part.etag)
            }
            PresignRequest::Get { .. } => Err(RepositoryError::Unauthorized(
                "Presigned URL does not allow PUT".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, upload: ObjectUpload) -> Result<()> {
        let content_disposition = upload.content_disposition();
        let mut state = self.state.write().await;
        state.objects.insert(
            upload.key,
            StoredObject {
                body: upload.body,
                content_type: upload.content_type,
                content_disposition,
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let state = self.state.read().await;
        state
            .objects
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| object_not_found(key))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.objects.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn presign(
        &self,
        key: &str,
        request: &PresignRequest,
        expires_in: Duration,
    ) -> Result<PresignedUrl> {
        validate_expires_in(expires_in)?;
        request.validate()?;

        let mut state = self.state.write().await;
        if let PresignRequest::UploadPart { upload_id, .. } = request {
            let upload = MultipartUpload {
                key: key.to_string(),
                upload_id: upload_id.clone(),
            };
            state.upload_mut(&upload)?;
        }

        let expires_at = state.now()
            + chrono::Duration::from_std(expires_in)
                .map_err(|e| RepositoryError::Validation(e.to_string()))?;
        let url = format!(
            "memory://{}/{}?X-Amz-Expires={}&X-Amz-Signature={}",
            self.bucket,
            key,
            expires_in.as_secs(),
            Uuid::new_v4().simple()
        );

        state.issued.insert(
            url.clone(),
            IssuedUrl {
                key: key.to_string(),
                request: request.clone(),
                expires_at,
            },
        );

        Ok(PresignedUrl {
            url,
            method: request.method(),
            headers: request.signed_headers(),
            expires_at,
        })
    }

    async fn create_multipart(&self, key: &str, content_type: &str) -> Result<MultipartUpload> {
        let upload = MultipartUpload {
            key: key.to_string(),
            upload_id: Uuid::new_v4().to_string(),
        };

        let mut state = self.state.write().await;
        state.uploads.insert(
            upload.upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                state: MultipartState::Initiated,
                parts: BTreeMap::new(),
            },
        );
        Ok(upload)
    }

    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart> {
        PresignRequest::upload_part(&upload.upload_id, part_number).validate()?;

        let mut state = self.state.write().await;
        let pending = state.upload_mut(upload)?;
        pending.state = pending.state.part_uploaded()?;

        let part = UploadedPart {
            part_number,
            etag: etag(&body),
            size: body.len() as u64,
        };
        pending
            .parts
            .insert(part_number, (part.etag.clone(), body));
        Ok(part)
    }

    async fn list_parts(&self, upload: &MultipartUpload) -> Result<Vec<UploadedPart>> {
        let mut state = self.state.write().await;
        let pending = state.upload_mut(upload)?;
        Ok(pending
            .parts
            .iter()
            .map(|(number, (etag, body))| UploadedPart {
                part_number: *number,
                etag: etag.clone(),
                size: body.len() as u64,
            })
            .collect())
    }

    async fn complete_multipart(
        &self,
        upload: &MultipartUpload,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let pending = state.upload_mut(upload)?;

        let stored: Vec<UploadedPart> = pending
            .parts
            .iter()
            .map(|(number, (etag, body))| UploadedPart {
                part_number: *number,
                etag: etag.clone(),
                size: body.len() as u64,
            })
            .collect();
        reconcile_parts(parts, &stored)?;
        pending.state = pending.state.complete()?;

        let mut body = Vec::new();
        for part in parts {
            if let Some((_, bytes)) = pending.parts.get(&part.part_number) {
                body.extend_from_slice(bytes);
            }
        }
        let content_type = pending.content_type.clone();

        state.uploads.remove(&upload.upload_id);
        state.objects.insert(
            upload.key.clone(),
            StoredObject {
                body,
                content_type,
                content_disposition: None,
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, upload: &MultipartUpload) -> Result<()> {
        let mut state = self.state.write().await;
        let pending = state.upload_mut(upload)?;
        pending.state.abort()?;
        state.uploads.remove(&upload.upload_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_list(url: &PresignedUrl) -> Vec<(String, String)> {
        url.headers.clone()
    }

    #[tokio::test]
    async fn test_put_records_content_disposition() {
        let store = InMemoryObjectStore::default();

        store
            .put_object(
                ObjectUpload::new("l1/a1/arm.stl", b"solid".to_vec(), "model/stl")
                    .with_filename("Arm.stl"),
            )
            .await
            .unwrap();

        let object = store.object("l1/a1/arm.stl").await.unwrap();
        assert_eq!(object.content_type, "model/stl");
        assert_eq!(
            object.content_disposition.as_deref(),
            Some("attachment; filename=\"Arm.stl\"")
        );
    }

    #[tokio::test]
    async fn test_get_missing_object_is_not_found() {
        let store = InMemoryObjectStore::default();

        let err = store.get_object("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.delete_object("missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let store = InMemoryObjectStore::default();
        for key in ["l1/a1/x", "l1/a2/y", "l2/a3/z"] {
            store
                .put_object(ObjectUpload::new(key, Vec::new(), "text/plain"))
                .await
                .unwrap();
        }

        assert_eq!(
            store.list_keys("l1/").await.unwrap(),
            vec!["l1/a1/x".to_string(), "l1/a2/y".to_string()]
        );
    }

    #[tokio::test]
    async fn test_presigned_download_expires() {
        let store = InMemoryObjectStore::default();
        store
            .put_object(ObjectUpload::new("k", b"data".to_vec(), "text/plain"))
            .await
            .unwrap();

        let url = store
            .presign("k", &PresignRequest::download(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.fetch_presigned(&url.url).await.unwrap(), b"data");

        store.advance_clock(chrono::Duration::seconds(61)).await;
        assert_eq!(
            store.fetch_presigned(&url.url).await,
            Err(RepositoryError::Unauthorized(
                "Presigned URL expired".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_presign_rejects_out_of_range_expiry() {
        let store = InMemoryObjectStore::default();

        let result = store
            .presign(
                "k",
                &PresignRequest::download(),
                Duration::from_secs(8 * 24 * 60 * 60),
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_presigned_upload_checks_method_and_checksum() {
        let store = InMemoryObjectStore::default();
        let request = PresignRequest::upload_with_checksum("model/stl", b"solid arm");
        let url = store
            .presign("l1/a1/arm.stl", &request, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.fetch_presigned(&url.url).await.is_err());
        assert!(store
            .put_presigned(&url.url, &[], b"solid arm".to_vec())
            .await
            .is_err());
        assert!(matches!(
            store
                .put_presigned(&url.url, &header_list(&url), b"tampered".to_vec())
                .await,
            Err(RepositoryError::Validation(_))
        ));

        store
            .put_presigned(&url.url, &header_list(&url), b"solid arm".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.get_object("l1/a1/arm.stl").await.unwrap(),
            b"solid arm"
        );
    }

    #[tokio::test]
    async fn test_multipart_through_presigned_parts() {
        let store = InMemoryObjectStore::default();
        let upload = store
            .create_multipart("l1/a1/scene.tgz", "application/gzip")
            .await
            .unwrap();

        let mut parts = Vec::new();
        for (number, chunk) in [(1, b"first-".to_vec()), (2, b"second".to_vec())] {
            let url = store
                .presign(
                    &upload.key,
                    &PresignRequest::upload_part(&upload.upload_id, number),
                    Duration::from_secs(60),
                )
                .await
                .unwrap();
            let etag = store.put_presigned(&url.url, &[], chunk).await.unwrap();
            parts.push(CompletedPart::new(number, etag));
        }

        assert_eq!(store.list_parts(&upload).await.unwrap().len(), 2);
        store.complete_multipart(&upload, &parts).await.unwrap();

        assert_eq!(
            store.get_object("l1/a1/scene.tgz").await.unwrap(),
            b"first-second"
        );
        assert!(store.list_parts(&upload).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_with_wrong_etag_leaves_upload_open() {
        let store = InMemoryObjectStore::default();
        let upload = store.create_multipart("k", "text/plain").await.unwrap();
        store.upload_part(&upload, 1, b"abc".to_vec()).await.unwrap();

        let result = store
            .complete_multipart(&upload, &[CompletedPart::new(1, "wrong")])
            .await;

        assert!(matches!(result, Err(RepositoryError::InvalidMultipart(_))));
        assert!(store.get_object("k").await.is_err());
        assert_eq!(store.list_parts(&upload).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_abort_discards_upload() {
        let store = InMemoryObjectStore::default();
        let upload = store.create_multipart("k", "text/plain").await.unwrap();

        store.abort_multipart(&upload).await.unwrap();

        assert!(matches!(
            store.abort_multipart(&upload).await,
            Err(RepositoryError::InvalidMultipart(_))
        ));
    }
}
