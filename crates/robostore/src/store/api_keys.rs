use chrono::{Duration, Utc};
use tracing::{debug, info};

use robostore_core::models::{hash_api_key_secret, ApiKey, Permission};
use robostore_core::storage::{RepositoryError, Result, TableBackend};

use super::ItemStore;

impl<B: TableBackend> ItemStore<B> {
    /// Issues a key for `user_id` and returns it with its raw secret.
    ///
    /// Only the hash of the secret is stored. The secret cannot be
    /// recovered later.
    pub async fn issue_api_key(
        &self,
        user_id: &str,
        permissions: impl IntoIterator<Item = Permission>,
        ttl: Option<Duration>,
    ) -> Result<(ApiKey, String)> {
        let (key, secret) = ApiKey::issue(user_id, permissions, ttl, Utc::now());
        self.add(&key, &[]).await?;
        info!(user_id, expires_at = ?key.expires_at, "issued API key");
        Ok((key, secret))
    }

    /// Resolves a presented secret to its key and checks `permission`.
    pub async fn authenticate_api_key(&self, secret: &str, permission: Permission) -> Result<ApiKey> {
        let id = hash_api_key_secret(secret);
        debug!("authenticate API key");

        let key = self
            .get::<ApiKey>(&id)
            .await?
            .ok_or_else(|| RepositoryError::Unauthorized("Invalid API key".to_string()))?;
        key.authorize(permission, Utc::now())?;
        Ok(key)
    }

    /// Revokes the key for a presented secret. Unknown secrets are ignored.
    pub async fn revoke_api_key(&self, secret: &str) -> Result<()> {
        self.delete(&hash_api_key_secret(secret)).await
    }

    /// Lists the keys issued to `user_id`.
    pub async fn list_api_keys(&self, user_id: &str) -> Result<Vec<ApiKey>> {
        self.get_by_index("user_id", user_id, &[]).await
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::storage::inmemory::InMemoryTable;
    use serde_json::json;

    fn store() -> ItemStore<InMemoryTable> {
        ItemStore::new(InMemoryTable::new())
    }

    #[tokio::test]
    async fn test_issue_and_authenticate() {
        let store = store();
        let (key, secret) = store
            .issue_api_key("u1", [Permission::Read], None)
            .await
            .unwrap();

        assert_ne!(key.id, secret);
        let found = store
            .authenticate_api_key(&secret, Permission::Read)
            .await
            .unwrap();
        assert_eq!(found, key);

        let denied = store.authenticate_api_key(&secret, Permission::Write).await;
        assert!(matches!(denied, Err(RepositoryError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_unknown_secret_is_unauthorized() {
        let result = store()
            .authenticate_api_key("not-a-key", Permission::Read)
            .await;

        assert_eq!(
            result,
            Err(RepositoryError::Unauthorized("Invalid API key".to_string()))
        );
    }

    #[tokio::test]
    async fn test_expired_key_is_rejected() {
        let store = store();
        let (key, secret) = store
            .issue_api_key("u1", [Permission::Admin], Some(Duration::hours(1)))
            .await
            .unwrap();

        let past = (Utc::now() - Duration::minutes(1)).to_rfc3339();
        let mut updates = robostore_core::item::Record::new();
        updates.insert("expires_at".to_string(), json!(past));
        store.update::<ApiKey>(&key.id, updates).await.unwrap();

        let result = store.authenticate_api_key(&secret, Permission::Read).await;
        assert_eq!(
            result,
            Err(RepositoryError::Unauthorized("API key expired".to_string()))
        );
    }

    #[tokio::test]
    async fn test_revoke_and_list() {
        let store = store();
        let (_, first) = store.issue_api_key("u1", [Permission::Read], None).await.unwrap();
        store.issue_api_key("u1", [Permission::Write], None).await.unwrap();
        store.issue_api_key("u2", [Permission::Read], None).await.unwrap();

        assert_eq!(store.list_api_keys("u1").await.unwrap().len(), 2);

        store.revoke_api_key(&first).await.unwrap();
        store.revoke_api_key(&first).await.unwrap();

        assert_eq!(store.list_api_keys("u1").await.unwrap().len(), 1);
        let result = store.authenticate_api_key(&first, Permission::Read).await;
        assert!(matches!(result, Err(RepositoryError::Unauthorized(_))));
    }
}
