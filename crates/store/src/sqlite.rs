//! SQLite-backed entity store.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::{Entity, EntityStore, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    entity TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (entity, id)
);";

/// Single-table store: one row per `(entity, id)` with a JSON body.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }
        debug!("opening sqlite store at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of rows stored for `entity`.
    pub fn count(&self, entity: Entity) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE entity = ?1",
            params![entity.table_name()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[async_trait::async_trait]
impl EntityStore for SqliteStore {
    async fn get(&self, entity: Entity, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE entity = ?1 AND id = ?2",
                params![entity.table_name(), id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, entity: Entity, id: &str, body: serde_json::Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(&body)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO records (entity, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(entity, id) DO UPDATE SET body = excluded.body",
            params![entity.table_name(), id, text],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get(Entity::SumRewardYear, "A_2023").await.unwrap().is_none());

        store
            .save(Entity::SumRewardYear, "A_2023", json!({"amount": "10"}))
            .await
            .unwrap();
        store
            .save(Entity::SumRewardYear, "A_2023", json!({"amount": "25"}))
            .await
            .unwrap();

        assert_eq!(
            store.get(Entity::SumRewardYear, "A_2023").await.unwrap(),
            Some(json!({"amount": "25"}))
        );
        assert_eq!(store.count(Entity::SumRewardYear).unwrap(), 1);
        assert_eq!(store.count(Entity::SumRewardMonth).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("ledger.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(Entity::Bonded, "X_100_1", json!({"amount": "500"})).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get(Entity::Bonded, "X_100_1").await.unwrap(),
            Some(json!({"amount": "500"}))
        );
    }
}
