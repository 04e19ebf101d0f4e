//! Per-block event dispatch.
//!
//! Events are handled one at a time in block order. Failures never escape a
//! block: a failed record update is logged and counted, a malformed event is
//! logged and skipped.

use serde::{Deserialize, Serialize};
use stakeledger_core::{Block, EventContext, EventKind, Granularity, OccurrenceId};
use tracing::{debug, info, warn};

use crate::decode::{self, StakingEvent, StakingPayload};
use crate::engine::{Accumulator, Contribution};

/// How the event section tag is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionFilter {
    /// Only events whose section equals the configured one.
    #[default]
    Strict,
    /// Ignore the section and dispatch on the method name alone.
    Any,
}

/// What to do with an event delivered again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Fold it into the period aggregates again.
    #[default]
    Accumulate,
    /// Keep a marker per (block, event position); an event whose marker
    /// exists only rewrites its raw record.
    SkipSeen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub section: String,
    pub section_filter: SectionFilter,
    pub replay_policy: ReplayPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            section: "staking".to_string(),
            section_filter: SectionFilter::Strict,
            replay_policy: ReplayPolicy::Accumulate,
        }
    }
}

impl DispatchConfig {
    pub fn accepts_section(&self, section: &str) -> bool {
        match self.section_filter {
            SectionFilter::Strict => section == self.section,
            SectionFilter::Any => true,
        }
    }
}

/// Outcome counters for one or more blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub blocks: u64,
    pub events: u64,
    pub processed: u64,
    pub skipped: u64,
    pub malformed: u64,
    /// Events whose aggregates were left alone under `SkipSeen`.
    pub replayed: u64,
    pub failed_updates: u64,
}

impl BlockReport {
    pub fn merge(&mut self, other: &BlockReport) {
        self.blocks += other.blocks;
        self.events += other.events;
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.malformed += other.malformed;
        self.replayed += other.replayed;
        self.failed_updates += other.failed_updates;
    }
}

/// Outcome of handling one event of interest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub replayed: bool,
    pub failed_updates: u64,
}

/// Routes decoded staking events to the accumulation engine.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Accumulator,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(engine: Accumulator, config: DispatchConfig) -> Self {
        Self { engine, config }
    }

    /// Handle every event of `block` in order.
    pub async fn handle_block(&self, block: &Block) -> BlockReport {
        let ctx = block.context();
        let mut report = BlockReport {
            blocks: 1,
            ..Default::default()
        };

        for (position, raw) in block.events.iter().enumerate() {
            report.events += 1;

            if !self.config.accepts_section(&raw.section) {
                report.skipped += 1;
                continue;
            }

            match decode::decode(raw) {
                Ok(StakingEvent::Other) => {
                    debug!(block = block.number, position, method = %raw.method, "ignoring event");
                    report.skipped += 1;
                }
                Ok(event) => {
                    let outcome = self.handle_event(ctx.event(position as u32), event).await;
                    report.processed += 1;
                    report.replayed += u64::from(outcome.replayed);
                    report.failed_updates += outcome.failed_updates;
                }
                Err(e) => {
                    warn!(block = block.number, position, error = %e, "skipping malformed event");
                    report.malformed += 1;
                }
            }
        }

        if report.failed_updates > 0 {
            warn!(
                block = block.number,
                failed_updates = report.failed_updates,
                "block processed with failed updates"
            );
        }
        report
    }

    /// Handle one decoded event. `Other` is a no-op.
    pub async fn handle_event(&self, ctx: EventContext, event: StakingEvent) -> EventOutcome {
        match event {
            StakingEvent::Rewarded(payload) => self.handle_rewarded(ctx, payload).await,
            StakingEvent::Bonded(payload) => self.handle_bonded(ctx, payload).await,
            StakingEvent::Unbonded(payload) => self.handle_unbonded(ctx, payload).await,
            StakingEvent::Other => EventOutcome::default(),
        }
    }

    /// Reward: year, month and day aggregates, then the raw record.
    pub async fn handle_rewarded(&self, ctx: EventContext, payload: StakingPayload) -> EventOutcome {
        self.apply(EventKind::Reward, ctx, payload).await
    }

    /// Bonded: month aggregate, then the raw record.
    pub async fn handle_bonded(&self, ctx: EventContext, payload: StakingPayload) -> EventOutcome {
        self.apply(EventKind::Bonded, ctx, payload).await
    }

    /// Unbonded: month aggregate, then the raw record.
    pub async fn handle_unbonded(&self, ctx: EventContext, payload: StakingPayload) -> EventOutcome {
        self.apply(EventKind::Unbonded, ctx, payload).await
    }

    async fn apply(&self, kind: EventKind, ctx: EventContext, payload: StakingPayload) -> EventOutcome {
        let contribution = Contribution {
            kind,
            account: payload.account,
            amount: payload.amount,
            occurrence: OccurrenceId::new(ctx.number, payload.index),
            position: ctx.position,
            timestamp: ctx.timestamp,
        };
        info!(
            block = ctx.number,
            position = ctx.position,
            %kind,
            account = %contribution.account,
            amount = %contribution.amount,
            "staking event"
        );

        let mut outcome = EventOutcome::default();

        let skip_seen = self.config.replay_policy == ReplayPolicy::SkipSeen;
        if skip_seen {
            match self.engine.event_seen(&contribution).await {
                Ok(true) => outcome.replayed = true,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        block = ctx.number,
                        %kind,
                        account = %contribution.account,
                        error = %e,
                        "replay check failed, accumulating anyway"
                    );
                    outcome.failed_updates += 1;
                }
            }
        }

        if outcome.replayed {
            debug!(
                block = ctx.number,
                position = ctx.position,
                id = %contribution.key(Granularity::Occurrence),
                "event already applied, skipping aggregates"
            );
        } else {
            // Order matters: day links look up the month and year
            // aggregates written just before.
            for granularity in kind.granularities() {
                if let Err(e) = self.engine.accumulate(*granularity, &contribution).await {
                    warn!(
                        block = ctx.number,
                        %kind,
                        ?granularity,
                        account = %contribution.account,
                        error = %e,
                        "aggregate update failed"
                    );
                    outcome.failed_updates += 1;
                }
            }

            if skip_seen {
                if let Err(e) = self.engine.mark_seen(&contribution).await {
                    warn!(
                        block = ctx.number,
                        position = ctx.position,
                        error = %e,
                        "replay marker write failed"
                    );
                    outcome.failed_updates += 1;
                }
            }
        }

        if let Err(e) = self.engine.record_occurrence(&contribution).await {
            warn!(
                block = ctx.number,
                %kind,
                account = %contribution.account,
                error = %e,
                "occurrence write failed"
            );
            outcome.failed_updates += 1;
        }

        outcome
    }
}
