//! Accumulation engine.
//!
//! Every stored record is an instance of one keyed fold: load the record or
//! initialize it, apply a combiner, save. Period aggregates add the amount and
//! bump the count; raw occurrences overwrite.

use chrono::{DateTime, Utc};
use stakeledger_core::{AccountId, Balance, BlockNumber, EventKind, Granularity, OccurrenceId};
use stakeledger_store::{Entity, OccurrenceRecord, PeriodAggregate, Record, SeenEventRecord};
use tracing::debug;

use crate::accessor::StoreAccessor;
use crate::keys;
use crate::linker::PeriodLinker;
use crate::AggregatorError;

/// One decoded event's contribution to the records of its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub kind: EventKind,
    pub account: AccountId,
    pub amount: Balance,
    pub occurrence: OccurrenceId,
    /// Position of the event in its block's event list.
    pub position: u32,
    pub timestamp: DateTime<Utc>,
}

impl Contribution {
    pub fn block_number(&self) -> BlockNumber {
        self.occurrence.block_number
    }

    pub fn key(&self, granularity: Granularity) -> String {
        keys::derive_key(&self.account, self.occurrence, self.timestamp, granularity)
    }

    pub fn seen_key(&self) -> String {
        keys::seen_key(self.block_number(), self.position)
    }
}

/// Read-modify-write over aggregate and occurrence records.
#[derive(Clone)]
pub struct Accumulator {
    accessor: StoreAccessor,
    linker: PeriodLinker,
}

impl Accumulator {
    pub fn new(accessor: StoreAccessor) -> Self {
        Self {
            linker: PeriodLinker::new(accessor.clone()),
            accessor,
        }
    }

    /// Fold `contribution` into its aggregate at `granularity`.
    ///
    /// Amount and count accumulate; block number and timestamp are taken
    /// from the contribution regardless of ordering. Day aggregates get
    /// their period links re-resolved on every update.
    pub async fn accumulate(
        &self,
        granularity: Granularity,
        contribution: &Contribution,
    ) -> Result<PeriodAggregate, AggregatorError> {
        let kind = contribution.kind;
        let entity = Entity::aggregate(kind, granularity)
            .ok_or(AggregatorError::UnsupportedGranularity { kind, granularity })?;
        let id = contribution.key(granularity);

        let links = if granularity == Granularity::Day {
            Some(
                self.linker
                    .resolve(kind, &contribution.account, contribution.timestamp)
                    .await?,
            )
        } else {
            None
        };

        let block_number = contribution.block_number();
        let timestamp = contribution.timestamp;
        let initial_links = links.clone();

        let aggregate = self
            .fold(
                entity,
                &id,
                || {
                    let mut aggregate =
                        PeriodAggregate::empty(id.as_str(), contribution.account.as_str(), block_number, timestamp);
                    aggregate.links = initial_links;
                    aggregate
                },
                |aggregate: &mut PeriodAggregate| {
                    aggregate.tx_count = aggregate.tx_count.checked_add(1).ok_or_else(|| {
                        AggregatorError::CountOverflow {
                            entity,
                            id: aggregate.id.clone(),
                        }
                    })?;
                    aggregate.amount += &contribution.amount;
                    aggregate.block_number = block_number;
                    aggregate.timestamp = timestamp;
                    if links.is_some() {
                        aggregate.links = links;
                    }
                    Ok(())
                },
            )
            .await?;

        debug!(
            %entity,
            id = %aggregate.id,
            amount = %aggregate.amount,
            tx_count = aggregate.tx_count,
            "aggregate updated"
        );
        Ok(aggregate)
    }

    /// Write the raw occurrence record. Re-delivery overwrites amount, block
    /// and timestamp; nothing accumulates.
    pub async fn record_occurrence(
        &self,
        contribution: &Contribution,
    ) -> Result<OccurrenceRecord, AggregatorError> {
        let entity = Entity::occurrence(contribution.kind);
        let id = contribution.key(Granularity::Occurrence);
        let block_number = contribution.block_number();

        let record = self
            .fold(
                entity,
                &id,
                || OccurrenceRecord {
                    id: id.clone(),
                    account: contribution.account.clone(),
                    amount: Balance::default(),
                    block_number,
                    timestamp: contribution.timestamp,
                },
                |record: &mut OccurrenceRecord| {
                    record.amount = contribution.amount.clone();
                    record.block_number = block_number;
                    record.timestamp = contribution.timestamp;
                    Ok(())
                },
            )
            .await?;

        debug!(%entity, id = %record.id, amount = %record.amount, "occurrence recorded");
        Ok(record)
    }

    /// Whether the event at this block position was already applied.
    pub async fn event_seen(&self, contribution: &Contribution) -> Result<bool, AggregatorError> {
        self.accessor
            .exists(Entity::SeenEvent, &contribution.seen_key())
            .await
    }

    /// Record that the event at this block position has been applied.
    pub async fn mark_seen(&self, contribution: &Contribution) -> Result<(), AggregatorError> {
        let marker = SeenEventRecord {
            id: contribution.seen_key(),
            kind: contribution.kind,
            account: contribution.account.clone(),
            block_number: contribution.block_number(),
            position: contribution.position,
            occurrence_id: contribution.key(Granularity::Occurrence),
        };
        self.accessor.save(Entity::SeenEvent, &marker).await
    }

    async fn fold<R, I, C>(&self, entity: Entity, id: &str, init: I, combine: C) -> Result<R, AggregatorError>
    where
        R: Record,
        I: FnOnce() -> R + Send,
        C: FnOnce(&mut R) -> Result<(), AggregatorError> + Send,
    {
        let (mut record, _) = self.accessor.get_or_create(entity, id, init).await?;
        combine(&mut record)?;
        self.accessor.save(entity, &record).await?;
        Ok(record)
    }
}
