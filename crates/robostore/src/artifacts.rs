//! Artifact rows and their blobs, kept consistent across the table and the
//! object store.
//!
//! The table and the bucket share no transaction. Uploads write every blob
//! first and the row last, deleting the blobs again if the row cannot be
//! written. Deletes remove the blobs before the row, so a row never points
//! at blobs that were already reclaimed by a finished delete.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::future::{join_all, try_join_all};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use robostore_core::item::{sort_by_created_at, Item, Record};
use robostore_core::models::Artifact;
use robostore_core::objects::{ObjectStore, ObjectUpload, PresignRequest, PresignedUrl};
use robostore_core::storage::{RepositoryError, Result, TableBackend};

use crate::store::ItemStore;

/// One blob of an artifact being uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub filename: String,
    pub body: Vec<u8>,
    /// Overrides the content type implied by the artifact kind.
    pub content_type: Option<String>,
}

impl ArtifactFile {
    pub fn new(filename: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            body,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Artifact operations over an item store and an object store.
#[derive(Debug, Clone)]
pub struct ArtifactService<B, O> {
    items: ItemStore<B>,
    objects: O,
}

impl<B: TableBackend, O: ObjectStore> ArtifactService<B, O> {
    pub fn new(items: ItemStore<B>, objects: O) -> Self {
        Self { items, objects }
    }

    pub fn items(&self) -> &ItemStore<B> {
        &self.items
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    /// Stores the blobs of `artifact` and then its row.
    ///
    /// The file names become the artifact's `filenames`. If any blob or the
    /// row fails, the blobs already written are deleted and the original
    /// error is returned. A row rejected because the id was taken meanwhile
    /// keeps the blobs, which belong to the winning upload.
    pub async fn upload_artifact(&self, mut artifact: Artifact, files: Vec<ArtifactFile>) -> Result<Artifact> {
        if files.is_empty() {
            return Err(RepositoryError::Validation(format!(
                "Artifact {} has no files",
                artifact.id
            )));
        }
        artifact.filenames = files.iter().map(|f| f.filename.clone()).collect();
        validate_files(&artifact)?;

        if self.items.backend().get_record(&artifact.id).await?.is_some() {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "Artifact",
                id: artifact.id,
            });
        }

        let keys = artifact.object_keys();
        debug!(artifact_id = %artifact.id, blobs = keys.len(), "upload artifact blobs");

        let uploads = files.into_iter().zip(&keys).map(|(file, key)| {
            let content_type = file
                .content_type
                .unwrap_or_else(|| artifact.kind.content_type().to_string());
            self.objects.put_object(
                ObjectUpload::new(key.clone(), file.body, content_type).with_filename(file.filename),
            )
        });

        if let Err(err) = try_join_all(uploads).await {
            self.remove_blobs(&artifact.id, &keys).await;
            return Err(err);
        }

        if let Err(err) = self.items.add(&artifact, &[]).await {
            if err.is_conflict() {
                warn!(artifact_id = %artifact.id, "artifact id taken during upload, keeping blobs");
            } else {
                info!(artifact_id = %artifact.id, error = %err, "artifact row rejected, deleting blobs");
                self.remove_blobs(&artifact.id, &keys).await;
            }
            return Err(err);
        }

        Ok(artifact)
    }

    async fn remove_blobs(&self, artifact_id: &str, keys: &[String]) {
        let results = join_all(keys.iter().map(|key| self.objects.delete_object(key))).await;
        for (key, result) in keys.iter().zip(results) {
            if let Err(err) = result {
                warn!(artifact_id, key = %key, error = %err, "failed to delete artifact blob");
            }
        }
    }

    /// Deletes the blobs of an artifact and then its row.
    ///
    /// Only the owner may delete. Deleting a missing artifact fails with
    /// `NotFound`.
    pub async fn delete_artifact(&self, id: &str, user_id: &str) -> Result<()> {
        let artifact: Artifact = self.items.get_required(id).await?;
        artifact.ensure_can_write(user_id)?;

        try_join_all(
            artifact
                .object_keys()
                .iter()
                .map(|key| self.objects.delete_object(key)),
        )
        .await?;

        info!(artifact_id = id, "deleted artifact");
        self.items.delete(id).await
    }

    /// Renames an artifact owned by `user_id`.
    pub async fn rename_artifact(&self, id: &str, user_id: &str, name: &str) -> Result<Artifact> {
        self.update_owned(id, user_id, "name", json!(name)).await
    }

    /// Sets or clears the description of an artifact owned by `user_id`.
    pub async fn describe_artifact(
        &self,
        id: &str,
        user_id: &str,
        description: Option<&str>,
    ) -> Result<Artifact> {
        self.update_owned(id, user_id, "description", json!(description))
            .await
    }

    async fn update_owned(&self, id: &str, user_id: &str, field: &str, value: Value) -> Result<Artifact> {
        let artifact: Artifact = self.items.get_required(id).await?;
        artifact.ensure_can_write(user_id)?;

        let mut updates = Record::new();
        updates.insert(field.to_string(), value);
        self.items.update(id, updates).await
    }

    /// Signs a download URL for one blob of an artifact.
    ///
    /// Private artifacts can only be read by their owner. The URL makes the
    /// browser save the blob under its original file name.
    pub async fn artifact_download_url(
        &self,
        id: &str,
        user_id: Option<&str>,
        filename: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl> {
        let artifact: Artifact = self.items.get_required(id).await?;
        if !artifact.can_read(user_id) {
            return Err(RepositoryError::Unauthorized(format!(
                "Artifact {id} is private"
            )));
        }
        if !artifact.filenames.iter().any(|f| f == filename) {
            return Err(RepositoryError::NotFound {
                entity_type: "Artifact",
                id: format!("{id}/{filename}"),
            });
        }

        self.objects
            .presign(
                &artifact.object_key(filename),
                &PresignRequest::download_as(filename),
                expires_in,
            )
            .await
    }

    /// Lists the artifacts of a listing, oldest first.
    pub async fn list_listing_artifacts(&self, listing_id: &str) -> Result<Vec<Artifact>> {
        let mut artifacts: Vec<Artifact> = self
            .items
            .get_by_index("listing_id", listing_id, &[])
            .await?;
        sort_by_created_at(&mut artifacts);
        Ok(artifacts)
    }
}

fn validate_files(artifact: &Artifact) -> Result<()> {
    let mut seen = HashSet::new();
    if let Some(duplicate) = artifact.filenames.iter().find(|f| !seen.insert(f.as_str())) {
        return Err(RepositoryError::Validation(format!(
            "Artifact {} lists {duplicate} twice",
            artifact.id
        )));
    }
    artifact.validate()
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::storage::inmemory::{InMemoryObjectStore, InMemoryTable};
    use chrono::Utc;
    use robostore_core::item::record_id;
    use robostore_core::models::ArtifactKind;
    use robostore_core::storage::{ContinuationToken, FieldFilter, RawPage, TextFilter};

    fn service() -> ArtifactService<InMemoryTable, InMemoryObjectStore> {
        ArtifactService::new(
            ItemStore::new(InMemoryTable::new()),
            InMemoryObjectStore::new("artifacts"),
        )
    }

    fn mesh() -> Artifact {
        Artifact::new("u1", "Gripper mesh", ArtifactKind::Stl)
            .with_id("a1")
            .with_listing("l1")
    }

    fn files() -> Vec<ArtifactFile> {
        vec![
            ArtifactFile::new("gripper.stl", b"solid gripper".to_vec()),
            ArtifactFile::new("notes.txt", b"v2".to_vec()).with_content_type("text/plain"),
        ]
    }

    #[tokio::test]
    async fn test_upload_writes_blobs_and_row() {
        let service = service();

        let artifact = service.upload_artifact(mesh(), files()).await.unwrap();

        assert_eq!(artifact.filenames, vec!["gripper.stl", "notes.txt"]);
        let stored = service.objects().object("l1/a1/gripper.stl").await.unwrap();
        assert_eq!(stored.body, b"solid gripper".to_vec());
        assert_eq!(stored.content_type, "model/stl");
        assert_eq!(
            stored.content_disposition.as_deref(),
            Some("attachment; filename=\"gripper.stl\"")
        );
        let notes = service.objects().object("l1/a1/notes.txt").await.unwrap();
        assert_eq!(notes.content_type, "text/plain");

        let row: Artifact = service.items().get_required("a1").await.unwrap();
        assert_eq!(row, artifact);
    }

    #[tokio::test]
    async fn test_existing_id_keeps_blobs() {
        let service = service();
        service.upload_artifact(mesh(), files()).await.unwrap();

        let retry = service
            .upload_artifact(mesh(), vec![ArtifactFile::new("gripper.stl", b"x".to_vec())])
            .await;

        assert!(matches!(retry, Err(RepositoryError::AlreadyExists { .. })));
        let stored = service.objects().object("l1/a1/gripper.stl").await.unwrap();
        assert_eq!(stored.body, b"solid gripper".to_vec());
    }

    /// Table that accepts everything except new rows. With `conflict` set it
    /// answers as if another writer took the id first.
    #[derive(Debug, Clone, Default)]
    struct RejectingTable(InMemoryTable, bool);

    #[async_trait::async_trait]
    impl TableBackend for RejectingTable {
        async fn put_record(&self, item_type: &'static str, record: Record, _: &[&str]) -> Result<()> {
            if self.1 {
                return Err(RepositoryError::AlreadyExists {
                    entity_type: item_type,
                    id: record_id(&record).unwrap_or_default().to_string(),
                });
            }
            Err(RepositoryError::ConnectionFailed("table unavailable".to_string()))
        }

        async fn get_record(&self, id: &str) -> Result<Option<Record>> {
            self.0.get_record(id).await
        }

        async fn update_record(
            &self,
            item_type: &'static str,
            id: &str,
            set: Record,
            remove: &[String],
        ) -> Result<Record> {
            self.0.update_record(item_type, id, set, remove).await
        }

        async fn delete_record(&self, id: &str) -> Result<()> {
            self.0.delete_record(id).await
        }

        async fn query_type_page(
            &self,
            item_type: &str,
            filter: Option<&TextFilter>,
            evaluate: usize,
            start: Option<&ContinuationToken>,
        ) -> Result<RawPage> {
            self.0.query_type_page(item_type, filter, evaluate, start).await
        }

        async fn count_type(&self, item_type: &str, filter: Option<&TextFilter>) -> Result<usize> {
            self.0.count_type(item_type, filter).await
        }

        async fn batch_get_records(&self, ids: &[String]) -> Result<Vec<Record>> {
            self.0.batch_get_records(ids).await
        }

        async fn query_index(
            &self,
            attribute: &str,
            value: &str,
            item_type: &str,
            filters: &[FieldFilter],
        ) -> Result<Vec<Record>> {
            self.0.query_index(attribute, value, item_type, filters).await
        }

        async fn scan_attribute_in(
            &self,
            attribute: &str,
            values: &[String],
            item_type: &str,
        ) -> Result<Vec<Record>> {
            self.0.scan_attribute_in(attribute, values, item_type).await
        }
    }

    #[tokio::test]
    async fn test_failed_row_write_deletes_blobs() {
        let service = ArtifactService::new(
            ItemStore::new(RejectingTable::default()),
            InMemoryObjectStore::new("artifacts"),
        );

        let result = service.upload_artifact(mesh(), files()).await;

        assert!(matches!(result, Err(RepositoryError::ConnectionFailed(_))));
        assert!(service.objects().is_empty().await);
    }

    #[tokio::test]
    async fn test_id_taken_during_upload_keeps_blobs() {
        let service = ArtifactService::new(
            ItemStore::new(RejectingTable(InMemoryTable::new(), true)),
            InMemoryObjectStore::new("artifacts"),
        );

        let result = service.upload_artifact(mesh(), files()).await;

        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
        let stored = service.objects().object("l1/a1/gripper.stl").await.unwrap();
        assert_eq!(stored.body, b"solid gripper".to_vec());
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_file_lists() {
        let service = service();

        let empty = service.upload_artifact(mesh(), Vec::new()).await;
        assert!(matches!(empty, Err(RepositoryError::Validation(_))));

        let duplicate = service
            .upload_artifact(
                mesh(),
                vec![
                    ArtifactFile::new("a.stl", Vec::new()),
                    ArtifactFile::new("a.stl", Vec::new()),
                ],
            )
            .await;
        assert!(matches!(duplicate, Err(RepositoryError::Validation(_))));
        assert!(service.objects().is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let service = service();
        service.upload_artifact(mesh(), files()).await.unwrap();

        let denied = service.delete_artifact("a1", "u2").await;
        assert!(matches!(denied, Err(RepositoryError::Unauthorized(_))));

        service.delete_artifact("a1", "u1").await.unwrap();
        assert!(service.objects().is_empty().await);
        assert_eq!(service.items().get::<Artifact>("a1").await.unwrap(), None);

        let again = service.delete_artifact("a1", "u1").await;
        assert!(matches!(again, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_rename_and_describe() {
        let service = service();
        service.upload_artifact(mesh(), files()).await.unwrap();

        let renamed = service.rename_artifact("a1", "u1", "Gripper v2").await.unwrap();
        assert_eq!(renamed.name, "Gripper v2");

        let blank = service.rename_artifact("a1", "u1", " ").await;
        assert!(matches!(blank, Err(RepositoryError::Validation(_))));

        let described = service
            .describe_artifact("a1", "u1", Some("Two fingers"))
            .await
            .unwrap();
        assert_eq!(described.description.as_deref(), Some("Two fingers"));

        let cleared = service.describe_artifact("a1", "u1", None).await.unwrap();
        assert_eq!(cleared.description, None);

        let denied = service.rename_artifact("a1", "u2", "Mine now").await;
        assert!(matches!(denied, Err(RepositoryError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_download_url_checks_access() {
        let service = service();
        service.upload_artifact(mesh(), files()).await.unwrap();
        let ttl = Duration::from_secs(60);

        let url = service
            .artifact_download_url("a1", Some("u1"), "gripper.stl", ttl)
            .await
            .unwrap();
        assert_eq!(url.method, "GET");
        assert!(url.expires_at > Utc::now());
        assert_eq!(
            service.objects().fetch_presigned(&url.url).await.unwrap(),
            b"solid gripper".to_vec()
        );

        let anonymous = service
            .artifact_download_url("a1", None, "gripper.stl", ttl)
            .await;
        assert!(matches!(anonymous, Err(RepositoryError::Unauthorized(_))));

        let unknown = service
            .artifact_download_url("a1", Some("u1"), "missing.stl", ttl)
            .await;
        assert!(matches!(unknown, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_public_artifact_is_readable_by_anyone() {
        let service = service();
        service
            .upload_artifact(mesh().public(), files())
            .await
            .unwrap();

        let url = service
            .artifact_download_url("a1", None, "notes.txt", Duration::from_secs(60))
            .await;
        assert!(url.is_ok());
    }

    #[tokio::test]
    async fn test_list_listing_artifacts_oldest_first() {
        let service = service();
        let now = Utc::now();
        for (id, age) in [("a1", 1), ("a2", 10), ("a3", 5)] {
            let mut artifact = Artifact::new("u1", "image", ArtifactKind::Image)
                .with_id(id)
                .with_listing("l1");
            artifact.created_at = now - chrono::Duration::minutes(age);
            service
                .upload_artifact(artifact, vec![ArtifactFile::new("view.png", vec![1, 2, 3])])
                .await
                .unwrap();
        }

        let listed = service.list_listing_artifacts("l1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a3", "a1"]);
    }
}
