//! Stored record shapes.
//!
//! Bodies are serialized camelCase with amounts as decimal strings.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use stakeledger_core::amount::as_string;
use stakeledger_core::{AccountId, Balance, BlockNumber, EventKind};

/// Anything stored under a string id.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> &str;
}

/// Cross-granularity references held by day aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_month_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_year_id: Option<String>,
}

/// Running totals for one account at one granularity and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAggregate {
    pub id: String,
    pub account: AccountId,
    #[serde(with = "as_string")]
    pub amount: Balance,
    pub tx_count: u64,
    /// Block of the most recently processed contributing event.
    pub block_number: BlockNumber,
    /// Timestamp of the most recently processed contributing event.
    pub timestamp: DateTime<Utc>,
    /// Only set on day aggregates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<PeriodLinks>,
}

impl PeriodAggregate {
    /// Zero-valued aggregate stamped with the creating event's metadata.
    pub fn empty(
        id: impl Into<String>,
        account: impl Into<AccountId>,
        block_number: BlockNumber,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            account: account.into(),
            amount: Balance::default(),
            tx_count: 0,
            block_number,
            timestamp,
            links: None,
        }
    }
}

impl Record for PeriodAggregate {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One concrete staking event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceRecord {
    pub id: String,
    pub account: AccountId,
    #[serde(with = "as_string")]
    pub amount: Balance,
    pub block_number: BlockNumber,
    pub timestamp: DateTime<Utc>,
}

impl Record for OccurrenceRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Marks the event at `position` of block `block_number` as applied to the
/// aggregates. Only written under the skip-seen replay policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenEventRecord {
    pub id: String,
    pub kind: EventKind,
    pub account: AccountId,
    pub block_number: BlockNumber,
    pub position: u32,
    /// Id of the raw record the event was written to.
    pub occurrence_id: String,
}

impl Record for SeenEventRecord {
    fn id(&self) -> &str {
        &self.id
    }
}
