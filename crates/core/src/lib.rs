//! Stakeledger Core
//!
//! Domain types shared by every stakeledger crate: blocks and raw chain
//! events as delivered by the host, event kinds, calendar granularities and
//! occurrence identifiers.

pub mod amount;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors shared across crates.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Opaque account identifier (SS58 address as rendered by the chain).
pub type AccountId = String;

/// Block height.
pub type BlockNumber = u64;

/// Token amount in the chain's smallest unit. Unbounded; sums never overflow.
pub type Balance = num_bigint::BigUint;

/// Staking event kinds the indexer keeps records for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Reward,
    Bonded,
    Unbonded,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reward => "Reward",
            Self::Bonded => "Bonded",
            Self::Unbonded => "Unbonded",
        }
    }

    /// Granularities at which period aggregates are kept for this kind,
    /// in the order they must be updated.
    pub fn granularities(&self) -> &'static [Granularity] {
        match self {
            Self::Reward => &[Granularity::Year, Granularity::Month, Granularity::Day],
            Self::Bonded | Self::Unbonded => &[Granularity::Month],
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolution of a record key.
///
/// `Occurrence` names a single event; the others name calendar buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    Occurrence,
    Year,
    Month,
    Day,
}

/// Position of one event in the chain's event stream: block number plus the
/// index of the extrinsic that emitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccurrenceId {
    pub block_number: BlockNumber,
    pub index: u32,
}

impl OccurrenceId {
    pub fn new(block_number: BlockNumber, index: u32) -> Self {
        Self { block_number, index }
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.block_number, self.index)
    }
}

/// Execution phase an event was emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

impl Phase {
    pub fn extrinsic_index(&self) -> Option<u32> {
        match self {
            Self::ApplyExtrinsic(index) => Some(*index),
            _ => None,
        }
    }
}

/// One event as delivered by the host, before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Pallet the event belongs to (e.g. `staking`).
    pub section: String,
    /// Event variant name (e.g. `Rewarded`).
    pub method: String,
    pub phase: Phase,
    /// Event fields in declaration order.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A block with its timestamp and events in native order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: BlockNumber,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Block fields every record write is stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub number: BlockNumber,
    pub timestamp: DateTime<Utc>,
}

impl BlockContext {
    /// Context of the event at `position` in this block's event list.
    pub fn event(&self, position: u32) -> EventContext {
        EventContext {
            number: self.number,
            timestamp: self.timestamp,
            position,
        }
    }
}

/// Block context plus the event's position within the block. The position
/// is unique per block, unlike the extrinsic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    pub number: BlockNumber,
    pub timestamp: DateTime<Utc>,
    pub position: u32,
}

impl Block {
    pub fn context(&self) -> BlockContext {
        BlockContext {
            number: self.number,
            timestamp: self.timestamp,
        }
    }
}
