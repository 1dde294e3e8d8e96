//! Named Maps
//!
//! A map is a namespace inside the grid. Its entries live under `map/key`
//! grid keys, so every map shares the partitions, replication and
//! write-through of the grid. Records handed out by a [`GridMap`] carry the
//! key as seen inside the map.

use serde_json::Value;

use super::Coordinator;
use crate::error::Result;
use crate::record::{scoped_key, split_scoped_key, Record};

/// Operations on one named map.
pub struct GridMap<'a> {
    coordinator: &'a Coordinator,
    name: String,
}

impl<'a> GridMap<'a> {
    pub(crate) fn new(coordinator: &'a Coordinator, name: &str) -> Self {
        Self {
            coordinator,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn grid_key(&self, key: &str) -> Result<String> {
        scoped_key(&self.name, key)
    }

    fn local(&self, mut record: Record) -> Record {
        if let Some((_, key)) = split_scoped_key(&record.key) {
            record.key = key.to_string();
        }
        record
    }

    pub async fn get(&self, key: &str) -> Result<Option<Record>> {
        let record = self.coordinator.get(&self.grid_key(key)?).await?;
        Ok(record.map(|r| self.local(r)))
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.coordinator.contains(&self.grid_key(key)?).await
    }

    pub async fn put(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<Record> {
        let record = self.coordinator.put(&self.grid_key(key)?, value, ttl).await?;
        Ok(self.local(record))
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.coordinator.delete(&self.grid_key(key)?).await
    }

    /// See [`Coordinator::update_field`].
    pub async fn update_field(&self, key: &str, field: &str, value: Value) -> Result<Option<Record>> {
        let record = self
            .coordinator
            .update_field(&self.grid_key(key)?, field, value)
            .await?;
        Ok(record.map(|r| self.local(r)))
    }

    /// Live keys of this map, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let keys = self.coordinator.keys().await?;
        Ok(keys
            .iter()
            .filter_map(|key| split_scoped_key(key))
            .filter(|(map, _)| *map == self.name)
            .map(|(_, key)| key.to_string())
            .collect())
    }

    /// Every live record of this map, in key order.
    pub async fn entries(&self) -> Result<Vec<Record>> {
        let mut entries = Vec::new();
        for key in self.keys().await? {
            if let Some(record) = self.get(&key).await? {
                entries.push(record);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::coordinator::Coordinator;
    use crate::record::DEFAULT_MAP;
    use crate::store::{DocumentStore, MemoryDocumentStore};
    use serde_json::json;
    use std::sync::Arc;

    async fn node() -> (Arc<Coordinator>, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let config = Config {
            partition_count: 16,
            default_ttl: 0,
            ..Config::default()
        };
        let coordinator = Coordinator::start(&config, store.clone()).await.unwrap();
        (coordinator, store)
    }

    #[tokio::test]
    async fn test_maps_do_not_share_keys() {
        let (node, _) = node().await;
        let users = node.map("users").unwrap();
        let teams = node.map("teams").unwrap();

        users.put("1", json!({"name": "A"}), None).await.unwrap();
        teams.put("1", json!({"name": "Red"}), None).await.unwrap();

        let user = users.get("1").await.unwrap().unwrap();
        assert_eq!(user.key, "1");
        assert_eq!(user.value, json!({"name": "A"}));
        assert_eq!(teams.get("1").await.unwrap().unwrap().value, json!({"name": "Red"}));

        assert!(users.delete("1").await.unwrap());
        assert!(!users.contains("1").await.unwrap());
        assert!(teams.contains("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_and_entries_are_per_map() {
        let (node, store) = node().await;
        let users = node.map("users").unwrap();
        users.put("b", json!(2), None).await.unwrap();
        users.put("a", json!(1), None).await.unwrap();
        node.map(DEFAULT_MAP).unwrap().put("a", json!(0), None).await.unwrap();
        node.flush_pending().await.unwrap();

        assert_eq!(users.keys().await.unwrap(), vec!["a", "b"]);
        let values: Vec<_> = users
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.key, r.value))
            .collect();
        assert_eq!(values, vec![("a".to_string(), json!(1)), ("b".to_string(), json!(2))]);

        // Stored under the grid key.
        assert!(store.get("users/a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_field_in_map() {
        let (node, _) = node().await;
        let users = node.map("users").unwrap();
        users.put("1", json!({"name": "A"}), None).await.unwrap();

        let updated = users
            .update_field("1", "coins", json!(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.key, "1");
        assert_eq!(updated.value, json!({"name": "A", "coins": 10}));
        assert_eq!(users.update_field("2", "coins", json!(1)).await, Ok(None));
    }
}
