//! The watcher: correlates executed actions with the blocks that include them.
//!
//! # Handlers
//!
//! - `on_applied_transaction`: filter the transaction's action tree and queue
//!   relevant actions under its id (latest execution wins).
//! - `on_accepted_block`: move queued actions of every included transaction
//!   into one `BlockMessage` and publish it, even when nothing matched.
//! - `on_irreversible_block`: publish the ids finalized in the block.
//!
//! All three run to completion on the caller's thread; the watcher owns its
//! queue outright, so no locking is involved.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::decoder::ActionDecoder;
use crate::error::WatcherError;
use crate::filter::ActionFilter;
use crate::message::{ActionNotification, BlockMessage, IrreversibleBlockMessage, TransactionMessage};
use crate::publisher::Publisher;
use crate::queue::PendingQueue;
use crate::source::{ChainEvent, EventSource};
use crate::types::{Action, SignedBlock, TransactionId, TransactionTrace};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

pub struct Watcher {
    filter: ActionFilter,
    decoder: ActionDecoder,
    queue: PendingQueue,
    publisher: Publisher,
    age_limit: Option<Duration>,
    pending_horizon: Option<u32>,
    /// Number of the most recent accepted block.
    head_block: u32,
    clock: Clock,
}

impl Watcher {
    pub fn new(
        filter: ActionFilter,
        decoder: ActionDecoder,
        publisher: Publisher,
        age_limit: Option<Duration>,
    ) -> Self {
        Self {
            filter,
            decoder,
            queue: PendingQueue::new(),
            publisher,
            age_limit,
            pending_horizon: None,
            head_block: 0,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the wall clock used by the age gate.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_pending_horizon(mut self, blocks: Option<u32>) -> Self {
        self.pending_horizon = blocks;
        self
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Route one host event to its handler.
    pub fn dispatch(&mut self, event: &ChainEvent) -> Result<(), WatcherError> {
        match event {
            ChainEvent::AppliedTransaction(trace) => {
                self.on_applied_transaction(trace);
                Ok(())
            }
            ChainEvent::AcceptedBlock(block) => self.on_accepted_block(block),
            ChainEvent::IrreversibleBlock(block) => self.on_irreversible_block(block),
        }
    }

    /// Drain `source`, handling each event before pulling the next.
    ///
    /// Stops at the first transport failure. Returns the number of events handled.
    pub async fn run<S: EventSource + ?Sized>(&mut self, source: &mut S) -> Result<u64, WatcherError> {
        let mut handled = 0u64;
        while let Some(event) = source.next_event().await? {
            if let Err(e) = self.dispatch(&event) {
                tracing::error!(error = %e, handled, "Watcher stopped");
                return Err(e);
            }
            handled += 1;
        }
        tracing::info!(handled, pending = self.queue.len(), "Event source exhausted");
        Ok(handled)
    }

    // ─── Applied transactions ────────────────────────────────────────────────

    pub fn on_applied_transaction(&mut self, trace: &TransactionTrace) {
        if !trace.is_executed() {
            return;
        }

        if let Some(failed) = &trace.failed_dtrx_trace {
            if self.queue.remove(&failed.id).is_some() {
                tracing::info!(
                    tx_id = %failed.id,
                    "Deferred transaction failed; dropped its pending actions"
                );
                return;
            }
        }

        if let Some(replaced) = self.queue.remove(&trace.id) {
            self.log_fork(&trace.id, &replaced.actions, trace);
        }

        for top in &trace.action_traces {
            for at in top.walk() {
                if !self.filter.is_relevant(at, &trace.id) {
                    continue;
                }
                self.log_queued(&trace.id, &at.act);
                self.queue.push(&trace.id, at.act.clone(), self.head_block);
            }
        }
    }

    fn log_queued(&self, tx_id: &TransactionId, act: &Action) {
        tracing::info!(
            tx_id = %tx_id,
            action = %act.name,
            account = %act.account,
            actor = %actor(act),
            "Queued action"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(tx_id = %tx_id, action = %act.name, data = %self.decoder.describe(act), "Queued action data");
        }
    }

    fn log_fork(&self, tx_id: &TransactionId, replaced: &[Action], incoming: &TransactionTrace) {
        tracing::warn!(
            tx_id = %tx_id,
            replaced = replaced.len(),
            "Transaction re-executed before inclusion; replacing its pending actions"
        );
        for act in replaced {
            tracing::warn!(
                tx_id = %tx_id,
                action = %act.name,
                account = %act.account,
                actor = %actor(act),
                data = %self.decoder.describe(act),
                "Replaced action"
            );
        }
        for at in &incoming.action_traces {
            tracing::warn!(
                tx_id = %tx_id,
                action = %at.act.name,
                account = %at.act.account,
                actor = %actor(&at.act),
                data = %self.decoder.describe(&at.act),
                "Incoming action"
            );
        }
    }

    // ─── Accepted blocks ─────────────────────────────────────────────────────

    pub fn on_accepted_block(&mut self, block: &SignedBlock) -> Result<(), WatcherError> {
        self.head_block = block.block_num;

        if self.is_too_old(block) {
            tracing::debug!(block_num = block.block_num, "Block older than age limit; not notifying");
            self.prune_pending();
            return Ok(());
        }

        let mut msg = BlockMessage::new(block.block_num, block.timestamp);
        for tx_id in block.transaction_ids() {
            let Some(entry) = self.queue.remove(&tx_id) else {
                continue;
            };
            let actions = entry
                .actions
                .iter()
                .map(|act| self.notification(&tx_id, act))
                .collect();
            tracing::info!(
                block_num = block.block_num,
                tx_id = %tx_id,
                pending = self.queue.len(),
                "Matched transaction in accepted block"
            );
            msg.transactions.push(TransactionMessage { tx_id, actions });
        }

        self.prune_pending();
        self.publisher.publish(&msg)
    }

    fn notification(&self, tx_id: &TransactionId, act: &Action) -> ActionNotification {
        let data = match self.decoder.action_data(act) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    tx_id = %tx_id,
                    account = %act.account,
                    action = %act.name,
                    error = %e,
                    "Could not decode action data; notifying without it"
                );
                None
            }
        };
        ActionNotification::new(act, data)
    }

    fn is_too_old(&self, block: &SignedBlock) -> bool {
        let Some(limit) = self.age_limit else {
            return false;
        };
        let age = (self.clock)() - block.timestamp;
        chrono::Duration::from_std(limit).is_ok_and(|limit| age > limit)
    }

    fn prune_pending(&mut self) {
        let Some(horizon) = self.pending_horizon else {
            return;
        };
        for tx_id in self.queue.prune(self.head_block, horizon) {
            tracing::warn!(
                tx_id = %tx_id,
                head_block = self.head_block,
                horizon,
                "Dropping pending transaction never included in a block"
            );
        }
    }

    // ─── Irreversible blocks ─────────────────────────────────────────────────

    pub fn on_irreversible_block(&mut self, block: &SignedBlock) -> Result<(), WatcherError> {
        let msg = IrreversibleBlockMessage::new(block.block_num, block.timestamp, block.transaction_ids());
        self.publisher.publish(&msg)
    }
}

fn actor(act: &Action) -> String {
    act.first_actor().map(|a| a.to_string()).unwrap_or_default()
}
