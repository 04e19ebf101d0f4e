//! Stakeledger Store
//!
//! Keyed entity storage for the indexer. Records are addressed by
//! `(Entity, id)` and stored as JSON bodies; typed access lives in the
//! aggregator's accessor.
//!
//! Backends:
//! - [`MemoryStore`]: in-process map with fault injection, for tests and dry runs.
//! - [`SqliteStore`]: single-file persistent store.

pub mod entity;
pub mod memory;
pub mod records;
pub mod sqlite;

pub use entity::Entity;
pub use memory::MemoryStore;
pub use records::{OccurrenceRecord, PeriodAggregate, PeriodLinks, Record, SeenEventRecord};
pub use sqlite::SqliteStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Key-based get/save over JSON record bodies.
///
/// Implementations must make a successful `save` visible to every later
/// `get` with the same key.
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch the body stored under `(entity, id)`, if any.
    async fn get(&self, entity: Entity, id: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Insert or replace the body stored under `(entity, id)`.
    async fn save(&self, entity: Entity, id: &str, body: serde_json::Value) -> Result<(), StoreError>;
}
