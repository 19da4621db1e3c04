use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::operations::validate_name;
use crate::item::{FieldKind, FieldSpec, Item};
use crate::objects::artifact_object_key;
use crate::storage::{RepositoryError, Result};

/// The kind of binary payload an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Urdf,
    Mjcf,
    Stl,
    Obj,
    Dae,
    Ply,
    Tgz,
    Zip,
    Video,
}

impl ArtifactKind {
    /// Returns the MIME type used when storing the blob.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image/png",
            ArtifactKind::Urdf | ArtifactKind::Mjcf => "application/xml",
            ArtifactKind::Stl => "model/stl",
            ArtifactKind::Obj => "model/obj",
            ArtifactKind::Dae => "model/vnd.collada+xml",
            ArtifactKind::Ply => "application/octet-stream",
            ArtifactKind::Tgz => "application/gzip",
            ArtifactKind::Zip => "application/zip",
            ArtifactKind::Video => "video/mp4",
        }
    }

    /// Returns the canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "png",
            ArtifactKind::Urdf => "urdf",
            ArtifactKind::Mjcf => "xml",
            ArtifactKind::Stl => "stl",
            ArtifactKind::Obj => "obj",
            ArtifactKind::Dae => "dae",
            ArtifactKind::Ply => "ply",
            ArtifactKind::Tgz => "tgz",
            ArtifactKind::Zip => "zip",
            ArtifactKind::Video => "mp4",
        }
    }

    /// Guesses the kind from a file name's extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            return Some(ArtifactKind::Tgz);
        }
        let extension = lower.rsplit_once('.').map(|(_, ext)| ext)?;
        match extension {
            "png" | "jpg" | "jpeg" | "webp" => Some(ArtifactKind::Image),
            "urdf" => Some(ArtifactKind::Urdf),
            "xml" | "mjcf" => Some(ArtifactKind::Mjcf),
            "stl" => Some(ArtifactKind::Stl),
            "obj" => Some(ArtifactKind::Obj),
            "dae" => Some(ArtifactKind::Dae),
            "ply" => Some(ArtifactKind::Ply),
            "zip" => Some(ArtifactKind::Zip),
            "mp4" | "webm" => Some(ArtifactKind::Video),
            _ => None,
        }
    }

    /// Serialized names of every kind.
    pub const ALL: &'static [&'static str] = &[
        "image", "urdf", "mjcf", "stl", "obj", "dae", "ply", "tgz", "zip", "video",
    ];
}

/// A binary object (image, mesh, archive, video) attached to a user and
/// optionally to a listing.
///
/// The row stores metadata only. The bytes live in the object store under
/// one key per entry of `filenames`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub user_id: String,
    pub listing_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub kind: ArtifactKind,
    /// Blob names stored under the artifact's key prefix.
    #[serde(default)]
    pub filenames: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// Creates a new private artifact owned by `user_id`.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, kind: ArtifactKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            listing_id: None,
            name: name.into(),
            description: None,
            kind,
            filenames: Vec::new(),
            is_public: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a specific ID for this artifact (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attaches the artifact to a listing.
    pub fn with_listing(mut self, listing_id: impl Into<String>) -> Self {
        self.listing_id = Some(listing_id.into());
        self
    }

    /// Marks the artifact readable by everyone.
    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    /// Object-store key of one of this artifact's blobs.
    pub fn object_key(&self, filename: &str) -> String {
        artifact_object_key(self.listing_id.as_deref(), &self.id, filename)
    }

    /// Object-store keys of every blob recorded on this artifact.
    pub fn object_keys(&self) -> Vec<String> {
        self.filenames
            .iter()
            .map(|filename| self.object_key(filename))
            .collect()
    }

    /// Returns true if `user_id` may read the artifact.
    pub fn can_read(&self, user_id: Option<&str>) -> bool {
        self.is_public || user_id == Some(self.user_id.as_str())
    }

    /// Fails unless `user_id` owns the artifact.
    pub fn ensure_can_write(&self, user_id: &str) -> Result<()> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(RepositoryError::Unauthorized(format!(
                "User {user_id} cannot modify artifact {}",
                self.id
            )))
        }
    }
}

impl Item for Artifact {
    const TYPE: &'static str = "Artifact";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("description", FieldKind::String),
        FieldSpec::required("is_public", FieldKind::Bool),
        FieldSpec::required("updated_at", FieldKind::Timestamp),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        validate_name("Artifact", &self.name, 256)?;
        if self
            .filenames
            .iter()
            .any(|f| f.is_empty() || f.contains('/'))
        {
            return Err(RepositoryError::Validation(format!(
                "Artifact {} has an invalid file name",
                self.id
            )));
        }
        Ok(())
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_under_listing() {
        let artifact = Artifact::new("u1", "Arm mesh", ArtifactKind::Stl)
            .with_id("a1")
            .with_listing("l1");

        assert_eq!(artifact.object_key("arm.stl"), "l1/a1/arm.stl");
    }

    #[test]
    fn test_object_key_without_listing() {
        let artifact = Artifact::new("u1", "Photo", ArtifactKind::Image).with_id("a1");

        assert_eq!(artifact.object_key("large.png"), "artifacts/a1/large.png");
    }

    #[test]
    fn test_object_keys_follow_filenames() {
        let mut artifact = Artifact::new("u1", "Photo", ArtifactKind::Image)
            .with_id("a1")
            .with_listing("l1");
        artifact.filenames = vec!["small.png".to_string(), "large.png".to_string()];

        assert_eq!(
            artifact.object_keys(),
            vec!["l1/a1/small.png".to_string(), "l1/a1/large.png".to_string()]
        );
    }

    #[test]
    fn test_ownership() {
        let artifact = Artifact::new("u1", "Photo", ArtifactKind::Image);

        assert!(artifact.can_read(Some("u1")));
        assert!(!artifact.can_read(Some("u2")));
        assert!(!artifact.can_read(None));
        assert!(artifact.ensure_can_write("u1").is_ok());
        assert!(matches!(
            artifact.ensure_can_write("u2"),
            Err(RepositoryError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_public_artifact_readable_by_anyone() {
        let artifact = Artifact::new("u1", "Photo", ArtifactKind::Image).public();

        assert!(artifact.can_read(None));
        assert!(artifact.ensure_can_write("u2").is_err());
    }

    #[test]
    fn test_kind_from_filename() {
        assert_eq!(
            ArtifactKind::from_filename("robot.URDF"),
            Some(ArtifactKind::Urdf)
        );
        assert_eq!(
            ArtifactKind::from_filename("meshes.tar.gz"),
            Some(ArtifactKind::Tgz)
        );
        assert_eq!(
            ArtifactKind::from_filename("photo.jpeg"),
            Some(ArtifactKind::Image)
        );
        assert_eq!(ArtifactKind::from_filename("README"), None);
        assert_eq!(ArtifactKind::from_filename("notes.txt"), None);
    }

    #[test]
    fn test_kind_names_match_serde() {
        let kinds = [
            ArtifactKind::Image,
            ArtifactKind::Urdf,
            ArtifactKind::Mjcf,
            ArtifactKind::Stl,
            ArtifactKind::Obj,
            ArtifactKind::Dae,
            ArtifactKind::Ply,
            ArtifactKind::Tgz,
            ArtifactKind::Zip,
            ArtifactKind::Video,
        ];
        for (kind, name) in kinds.iter().zip(ArtifactKind::ALL) {
            assert_eq!(serde_json::to_value(kind).unwrap(), *name);
        }
    }

    #[test]
    fn test_validate_rejects_nested_filenames() {
        let mut artifact = Artifact::new("u1", "Mesh", ArtifactKind::Stl);
        artifact.filenames = vec!["../escape.stl".to_string()];

        assert!(artifact.validate().is_err());
    }
}
