use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::item::{FieldKind, FieldSpec, Item};
use crate::storage::{RepositoryError, Result};

const SECRET_LEN: usize = 48;

/// Capability granted to an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

/// Credential mapping a hashed secret to a user.
///
/// The item ID is the SHA-256 hash of the secret, so a presented secret is
/// looked up with a single point read. The raw secret is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub user_id: String,
    pub permissions: BTreeSet<Permission>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Generate a random API key secret.
pub fn generate_api_key_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Hash an API key secret into its storage ID.
pub fn hash_api_key_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

impl ApiKey {
    /// Issue a new key. Returns the item to store and the raw secret to hand
    /// to the caller exactly once.
    pub fn issue(
        user_id: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> (Self, String) {
        let secret = generate_api_key_secret();
        let key = Self {
            id: hash_api_key_secret(&secret),
            user_id: user_id.into(),
            permissions: permissions.into_iter().collect(),
            expires_at: ttl.map(|ttl| now + ttl),
            created_at: now,
        };
        (key, secret)
    }

    /// Check if the key has expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns true if the key grants `permission`. `admin` grants everything.
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&Permission::Admin) || self.permissions.contains(&permission)
    }

    /// Fails if the key is expired or lacks `permission`.
    pub fn authorize(&self, permission: Permission, now: DateTime<Utc>) -> Result<()> {
        if self.is_expired(now) {
            return Err(RepositoryError::Unauthorized("API key expired".to_string()));
        }
        if !self.grants(permission) {
            return Err(RepositoryError::Unauthorized(format!(
                "API key lacks {permission:?} permission"
            )));
        }
        Ok(())
    }
}

impl Item for ApiKey {
    const TYPE: &'static str = "APIKey";
    const FIELDS: &'static [FieldSpec] =
        &[FieldSpec::optional("expires_at", FieldKind::Timestamp)];
    const SEARCH_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        if self.permissions.is_empty() {
            return Err(RepositoryError::Validation(
                "API key must grant at least one permission".to_string(),
            ));
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
    fn generate_api_key_secret_produces_alphanumeric() {
        let secret = generate_api_key_secret();
        assert_eq!(secret.len(), SECRET_LEN);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn hash_is_stable_hex_sha256() {
        assert_eq!(
            hash_api_key_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn issue_stores_only_the_hash() {
        let now = Utc::now();
        let (key, secret) = ApiKey::issue("u1", [Permission::Read], None, now);

        assert_eq!(key.id, hash_api_key_secret(&secret));
        assert_ne!(key.id, secret);
        assert_eq!(key.user_id, "u1");
        assert_eq!(key.expires_at, None);
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let (key, _) = ApiKey::issue("u1", [Permission::Read], Some(Duration::hours(1)), now);

        assert!(!key.is_expired(now));
        assert!(key.is_expired(now + Duration::hours(1)));
    }

    #[test]
    fn authorize_checks_permissions_and_expiry() {
        let now = Utc::now();
        let (key, _) = ApiKey::issue("u1", [Permission::Read], Some(Duration::minutes(5)), now);

        assert!(key.authorize(Permission::Read, now).is_ok());
        assert!(matches!(
            key.authorize(Permission::Write, now),
            Err(RepositoryError::Unauthorized(_))
        ));
        assert_eq!(
            key.authorize(Permission::Read, now + Duration::minutes(10)),
            Err(RepositoryError::Unauthorized("API key expired".to_string()))
        );
    }

    #[test]
    fn admin_grants_everything() {
        let (key, _) = ApiKey::issue("u1", [Permission::Admin], None, Utc::now());

        assert!(key.grants(Permission::Read));
        assert!(key.grants(Permission::Write));
    }

    #[test]
    fn validate_requires_a_permission() {
        let (key, _) = ApiKey::issue("u1", Vec::<Permission>::new(), None, Utc::now());
        assert!(key.validate().is_err());
    }
}
