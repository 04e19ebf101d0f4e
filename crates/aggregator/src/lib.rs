//! Stakeledger Aggregator
//!
//! Folds staking events (rewards, bonds, unbonds) into per-account running
//! totals by calendar year, month and day, plus one raw record per event.
//! Blocks arrive in order from the host, are decoded at the dispatcher
//! boundary and applied through a single keyed read-modify-write routine.

pub mod accessor;
pub mod decode;
pub mod dispatcher;
pub mod engine;
pub mod keys;
pub mod linker;
pub mod service;

pub use accessor::StoreAccessor;
pub use decode::{DecodeError, StakingEvent, StakingPayload};
pub use dispatcher::{BlockReport, DispatchConfig, Dispatcher, EventOutcome, ReplayPolicy, SectionFilter};
pub use engine::{Accumulator, Contribution};
pub use linker::PeriodLinker;
pub use service::{IndexerConfig, IndexerService};

use stakeledger_core::{EventKind, Granularity};
use stakeledger_store::{Entity, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("corrupt {entity} record {id}: {source}")]
    CorruptRecord {
        entity: Entity,
        id: String,
        source: serde_json::Error,
    },
    #[error("transaction count overflow on {entity} {id}")]
    CountOverflow { entity: Entity, id: String },
    #[error("no {granularity:?} aggregate is kept for {kind}")]
    UnsupportedGranularity {
        kind: EventKind,
        granularity: Granularity,
    },
}
