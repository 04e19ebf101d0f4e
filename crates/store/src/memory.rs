//! In-memory entity store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use tracing::trace;

use crate::{Entity, EntityStore, StoreError};

/// Map-backed store. Fault injection lets tests simulate store outages per
/// entity.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(Entity, String), serde_json::Value>>,
    failing_reads: Mutex<HashSet<Entity>>,
    failing_saves: Mutex<HashSet<Entity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get` against `entity` fail until cleared.
    pub fn fail_reads_for(&self, entity: Entity) {
        if let Ok(mut set) = self.failing_reads.lock() {
            set.insert(entity);
        }
    }

    /// Make every `save` against `entity` fail until cleared.
    pub fn fail_saves_for(&self, entity: Entity) {
        if let Ok(mut set) = self.failing_saves.lock() {
            set.insert(entity);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut set) = self.failing_reads.lock() {
            set.clear();
        }
        if let Ok(mut set) = self.failing_saves.lock() {
            set.clear();
        }
    }

    /// Number of records stored for `entity`.
    pub fn count(&self, entity: Entity) -> Result<usize, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.keys().filter(|(e, _)| *e == entity).count())
    }

    /// Ids stored for `entity`, sorted.
    pub fn ids(&self, entity: Entity) -> Result<Vec<String>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .keys()
            .filter(|(e, _)| *e == entity)
            .map(|(_, id)| id.clone())
            .collect())
    }

    fn is_failing(set: &Mutex<HashSet<Entity>>, entity: Entity) -> Result<bool, StoreError> {
        set.lock()
            .map(|s| s.contains(&entity))
            .map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, entity: Entity, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        if Self::is_failing(&self.failing_reads, entity)? {
            return Err(StoreError::Unavailable(format!("read {entity} {id}")));
        }
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(&(entity, id.to_string())).cloned())
    }

    async fn save(&self, entity: Entity, id: &str, body: serde_json::Value) -> Result<(), StoreError> {
        if Self::is_failing(&self.failing_saves, entity)? {
            return Err(StoreError::Unavailable(format!("save {entity} {id}")));
        }
        trace!(%entity, id, "memory store save");
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.insert((entity, id.to_string()), body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get(Entity::Reward, "A_1_0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = MemoryStore::new();
        store.save(Entity::Reward, "A_1_0", json!({"v": 1})).await.unwrap();
        store.save(Entity::Reward, "A_1_0", json!({"v": 2})).await.unwrap();
        assert_eq!(
            store.get(Entity::Reward, "A_1_0").await.unwrap(),
            Some(json!({"v": 2}))
        );
        assert_eq!(store.count(Entity::Reward).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entities_are_separate_namespaces() {
        let store = MemoryStore::new();
        store.save(Entity::SumRewardMonth, "A_2023_2", json!(1)).await.unwrap();
        assert!(store.get(Entity::SumBondedMonth, "A_2023_2").await.unwrap().is_none());
        assert_eq!(
            store.ids(Entity::SumRewardMonth).unwrap(),
            vec!["A_2023_2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.fail_saves_for(Entity::Bonded);
        assert!(store.save(Entity::Bonded, "x", json!(1)).await.is_err());
        assert!(store.save(Entity::Reward, "x", json!(1)).await.is_ok());

        store.fail_reads_for(Entity::Reward);
        assert!(store.get(Entity::Reward, "x").await.is_err());

        store.clear_faults();
        assert!(store.get(Entity::Reward, "x").await.unwrap().is_some());
        assert!(store.save(Entity::Bonded, "x", json!(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_reported() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.save(Entity::Reward, "A_1_0", json!(1)).await.unwrap();

        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.records.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(matches!(store.count(Entity::Reward), Err(StoreError::Poisoned)));
        assert!(matches!(store.ids(Entity::Reward), Err(StoreError::Poisoned)));
        assert!(matches!(
            store.get(Entity::Reward, "A_1_0").await,
            Err(StoreError::Poisoned)
        ));
    }
}
