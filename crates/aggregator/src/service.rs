//! Top-level indexer service consuming an ordered block stream.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stakeledger_core::{Block, BlockNumber};
use stakeledger_store::EntityStore;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::accessor::StoreAccessor;
use crate::dispatcher::{BlockReport, DispatchConfig, Dispatcher, ReplayPolicy, SectionFilter};
use crate::engine::Accumulator;

/// Configuration for the indexer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Event section holding the staking events (default: `staking`).
    pub section: String,
    pub section_filter: SectionFilter,
    pub replay_policy: ReplayPolicy,
    /// Capacity of the inbound block channel (default: 256).
    pub channel_capacity: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            section: dispatch.section,
            section_filter: dispatch.section_filter,
            replay_policy: dispatch.replay_policy,
            channel_capacity: 256,
        }
    }
}

impl IndexerConfig {
    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            section: self.section.clone(),
            section_filter: self.section_filter,
            replay_policy: self.replay_policy,
        }
    }
}

/// Feeds blocks through the dispatcher strictly one at a time.
pub struct IndexerService {
    config: IndexerConfig,
    dispatcher: Dispatcher,
    last_block: Option<BlockNumber>,
    totals: BlockReport,
}

impl IndexerService {
    pub fn new(store: Arc<dyn EntityStore>, config: IndexerConfig) -> Self {
        let engine = Accumulator::new(StoreAccessor::new(store));
        let dispatcher = Dispatcher::new(engine, config.dispatch());
        Self {
            config,
            dispatcher,
            last_block: None,
            totals: BlockReport::default(),
        }
    }

    /// Number of the last block processed.
    pub fn last_block(&self) -> Option<BlockNumber> {
        self.last_block
    }

    /// Counters summed over every processed block.
    pub fn totals(&self) -> &BlockReport {
        &self.totals
    }

    /// Create a block channel sized from the config.
    pub fn channel(&self) -> (mpsc::Sender<Block>, mpsc::Receiver<Block>) {
        mpsc::channel(self.config.channel_capacity.max(1))
    }

    /// Process one block. Blocks that do not advance the height are still
    /// processed; the host owns ordering.
    pub async fn process_block(&mut self, block: &Block) -> BlockReport {
        if is_out_of_order(self.last_block, block.number) {
            warn!(
                block = block.number,
                last = ?self.last_block,
                "block does not advance height"
            );
        }

        let report = self.dispatcher.handle_block(block).await;
        self.last_block = Some(block.number);
        self.totals.merge(&report);
        report
    }

    /// Process every block already queued on `rx` without waiting.
    /// Returns the number of blocks processed.
    pub async fn drain(&mut self, rx: &mut mpsc::Receiver<Block>) -> usize {
        let mut processed = 0;
        while let Ok(block) = rx.try_recv() {
            self.process_block(&block).await;
            processed += 1;
        }
        processed
    }

    /// Run until the sending side of `rx` is dropped. Returns the totals.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<Block>) -> BlockReport {
        info!(
            section = %self.config.section,
            section_filter = ?self.config.section_filter,
            replay_policy = ?self.config.replay_policy,
            "indexer service starting"
        );

        while let Some(block) = rx.recv().await {
            self.process_block(&block).await;
        }

        info!(
            last_block = ?self.last_block,
            blocks = self.totals.blocks,
            processed = self.totals.processed,
            failed_updates = self.totals.failed_updates,
            "block channel closed, indexer stopping"
        );
        self.totals
    }
}

fn is_out_of_order(last: Option<BlockNumber>, next: BlockNumber) -> bool {
    matches!(last, Some(prev) if next <= prev)
}
