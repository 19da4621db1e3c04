use futures_util::future::try_join_all;
use tracing::debug;

use robostore_core::item::{from_record, Item};
use robostore_core::storage::{
    chunk_unique, group_by_attribute, FieldFilter, RepositoryError, Result, TableBackend,
};

use super::{ensure_indexed, ItemStore};

impl<B: TableBackend> ItemStore<B> {
    /// Gets every item of type `T` whose `attribute` equals `value`.
    ///
    /// `filters` narrow the match further. The backend follows its own
    /// pagination, so the result is complete.
    pub async fn get_by_index<T: Item>(
        &self,
        attribute: &str,
        value: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<T>> {
        ensure_indexed(attribute)?;
        debug!(item_type = T::TYPE, attribute, value, "query index");

        self.backend
            .query_index(attribute, value, T::TYPE, filters)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// Gets the single item of type `T` whose `attribute` equals `value`.
    ///
    /// More than one match means the attribute is not unique and fails
    /// with `Internal`.
    pub async fn get_unique_by_index<T: Item>(&self, attribute: &str, value: &str) -> Result<Option<T>> {
        let mut items = self.get_by_index::<T>(attribute, value, &[]).await?;
        match items.len() {
            0 => Ok(None),
            1 => Ok(items.pop()),
            n => Err(RepositoryError::Internal(format!(
                "{n} {} items share {attribute}={value}",
                T::TYPE
            ))),
        }
    }

    /// Same as [`get_unique_by_index`](Self::get_unique_by_index) but fails
    /// with `NotFound` when nothing matches.
    pub async fn get_unique_by_index_required<T: Item>(&self, attribute: &str, value: &str) -> Result<T> {
        self.get_unique_by_index(attribute, value)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: T::TYPE,
                id: format!("{attribute}={value}"),
            })
    }

    /// Gets the items matching each of `values`, one group per value in
    /// input order. Values without matches get an empty group.
    pub async fn get_batch_by_index<T: Item>(
        &self,
        attribute: &str,
        values: &[String],
        chunk_size: usize,
    ) -> Result<Vec<Vec<T>>> {
        ensure_indexed(attribute)?;
        let chunks = chunk_unique(values, chunk_size);
        debug!(item_type = T::TYPE, attribute, values = values.len(), chunks = chunks.len(), "batch query index");

        let fetched = try_join_all(
            chunks
                .iter()
                .map(|chunk| self.backend.scan_attribute_in(attribute, chunk, T::TYPE)),
        )
        .await?;

        group_by_attribute(values, attribute, fetched.into_iter().flatten().collect())
            .into_iter()
            .map(|group| group.into_iter().map(from_record).collect())
            .collect()
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::storage::inmemory::InMemoryTable;
    use chrono::{Duration, Utc};
    use robostore_core::item::sort_by_created_at;
    use robostore_core::models::{Artifact, ArtifactKind, Listing, Robot, User};

    async fn store_with_robots() -> ItemStore<InMemoryTable> {
        let store = ItemStore::new(InMemoryTable::new());
        for (id, user, listing) in [
            ("r1", "u1", "l1"),
            ("r2", "u1", "l2"),
            ("r3", "u2", "l1"),
            ("r4", "u2", "l3"),
        ] {
            store
                .add(&Robot::new(user, listing, format!("robot {id}")).with_id(id), &[])
                .await
                .unwrap();
        }
        store
            .add(&Listing::new("u1", "Arm").with_id("l1"), &[])
            .await
            .unwrap();
        store
    }

    fn ids(robots: &[Robot]) -> Vec<&str> {
        let mut ids: Vec<&str> = robots.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_get_by_index_matches_type_and_value() {
        let store = store_with_robots().await;

        let robots: Vec<Robot> = store.get_by_index("user_id", "u1", &[]).await.unwrap();
        assert_eq!(ids(&robots), vec!["r1", "r2"]);

        let listings: Vec<Listing> = store.get_by_index("user_id", "u1", &[]).await.unwrap();
        assert_eq!(listings.len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_index_with_filter() {
        let store = store_with_robots().await;

        let robots: Vec<Robot> = store
            .get_by_index("listing_id", "l1", &[FieldFilter::equals("user_id", "u2")])
            .await
            .unwrap();

        assert_eq!(ids(&robots), vec!["r3"]);
    }

    #[tokio::test]
    async fn test_get_by_index_requires_index() {
        let store = store_with_robots().await;

        let result = store.get_by_index::<Robot>("name", "robot r1", &[]).await;

        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unique_lookup() {
        let store = store_with_robots().await;
        store
            .add(&User::new("a@x.com", "alice").with_id("u1"), &[])
            .await
            .unwrap();

        let found: Option<User> = store.get_unique_by_index("username", "alice").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));

        let missing = store
            .get_unique_by_index_required::<User>("username", "bob")
            .await;
        assert_eq!(
            missing,
            Err(RepositoryError::NotFound {
                entity_type: "User",
                id: "username=bob".to_string()
            })
        );

        let ambiguous = store.get_unique_by_index::<Robot>("user_id", "u1").await;
        assert!(matches!(ambiguous, Err(RepositoryError::Internal(_))));
    }

    #[tokio::test]
    async fn test_batch_by_index_groups_in_input_order() {
        let store = store_with_robots().await;
        let values: Vec<String> = ["l3", "missing", "l1"].iter().map(|v| v.to_string()).collect();

        let groups: Vec<Vec<Robot>> = store
            .get_batch_by_index("listing_id", &values, 1)
            .await
            .unwrap();

        assert_eq!(groups.len(), 3);
        assert_eq!(ids(&groups[0]), vec!["r4"]);
        assert!(groups[1].is_empty());
        assert_eq!(ids(&groups[2]), vec!["r1", "r3"]);
    }

    #[tokio::test]
    async fn test_first_image_by_creation_time() {
        let store = ItemStore::new(InMemoryTable::new());
        let now = Utc::now();
        for (id, age) in [("a1", 1), ("a2", 5), ("a3", 3)] {
            let mut artifact = Artifact::new("u1", format!("image {id}"), ArtifactKind::Image)
                .with_id(id)
                .with_listing("l1");
            artifact.created_at = now - Duration::minutes(age);
            store.add(&artifact, &[]).await.unwrap();
        }

        let mut images: Vec<Artifact> = store.get_by_index("listing_id", "l1", &[]).await.unwrap();
        sort_by_created_at(&mut images);

        assert_eq!(images[0].id, "a2");
    }
}
