//! Typed access to the entity store.

use std::sync::Arc;

use stakeledger_store::{Entity, EntityStore, Record};
use tracing::trace;

use crate::AggregatorError;

/// Typed get/save over an [`EntityStore`].
#[derive(Clone)]
pub struct StoreAccessor {
    store: Arc<dyn EntityStore>,
}

impl StoreAccessor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Fetch and decode a record. A miss is `Ok(None)`.
    pub async fn get<R: Record>(&self, entity: Entity, id: &str) -> Result<Option<R>, AggregatorError> {
        let Some(body) = self.store.get(entity, id).await? else {
            return Ok(None);
        };
        serde_json::from_value(body)
            .map(Some)
            .map_err(|source| AggregatorError::CorruptRecord {
                entity,
                id: id.to_string(),
                source,
            })
    }

    /// Whether a record exists, without decoding it.
    pub async fn exists(&self, entity: Entity, id: &str) -> Result<bool, AggregatorError> {
        Ok(self.store.get(entity, id).await?.is_some())
    }

    /// The stored record, or `init()` if there is none. The flag is `true`
    /// when the record was freshly initialized. Nothing is persisted.
    pub async fn get_or_create<R, I>(
        &self,
        entity: Entity,
        id: &str,
        init: I,
    ) -> Result<(R, bool), AggregatorError>
    where
        R: Record,
        I: FnOnce() -> R + Send,
    {
        match self.get(entity, id).await? {
            Some(record) => Ok((record, false)),
            None => {
                trace!(%entity, id, "initializing record");
                Ok((init(), true))
            }
        }
    }

    pub async fn save<R: Record>(&self, entity: Entity, record: &R) -> Result<(), AggregatorError> {
        let body = serde_json::to_value(record).map_err(stakeledger_store::StoreError::from)?;
        self.store.save(entity, record.id(), body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use stakeledger_store::{MemoryStore, PeriodAggregate};

    fn accessor() -> (Arc<MemoryStore>, StoreAccessor) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), StoreAccessor::new(store))
    }

    #[tokio::test]
    async fn test_get_or_create_does_not_persist() {
        let (store, accessor) = accessor();
        let ts = Utc.with_ymd_and_hms(2023, 3, 15, 0, 0, 0).unwrap();

        let (agg, created): (PeriodAggregate, bool) = accessor
            .get_or_create(Entity::SumRewardYear, "A_2023", || {
                PeriodAggregate::empty("A_2023", "A", 1, ts)
            })
            .await
            .unwrap();
        assert!(created);
        assert_eq!(agg.amount, stakeledger_core::Balance::default());
        assert_eq!(store.count(Entity::SumRewardYear).unwrap(), 0);

        accessor.save(Entity::SumRewardYear, &agg).await.unwrap();
        let (_, created): (PeriodAggregate, bool) = accessor
            .get_or_create(Entity::SumRewardYear, "A_2023", || unreachable!())
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_corrupt_body_is_reported() {
        let (store, accessor) = accessor();
        store
            .save(Entity::SumRewardMonth, "A_2023_2", json!({"amount": "not-a-number"}))
            .await
            .unwrap();

        let result = accessor
            .get::<PeriodAggregate>(Entity::SumRewardMonth, "A_2023_2")
            .await;
        assert!(matches!(result, Err(AggregatorError::CorruptRecord { .. })));
        assert!(accessor.exists(Entity::SumRewardMonth, "A_2023_2").await.unwrap());
    }
}
