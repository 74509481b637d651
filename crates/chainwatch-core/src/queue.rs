//! Pending transaction queue: relevant actions waiting for their block.
//!
//! Holds at most one entry per transaction id. Entries are created by the
//! first relevant action of a transaction and leave the queue when the
//! transaction lands in an accepted block, is replaced by a re-execution, or
//! turns out to be a failed deferred transaction.

use std::collections::HashMap;

use crate::types::{Action, TransactionId};

/// The relevant actions accumulated for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Actions in the order they were queued.
    pub actions: Vec<Action>,
    /// Last accepted block number when the entry was created.
    pub queued_at_block: u32,
}

/// Correlation state keyed by transaction id.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: HashMap<TransactionId, PendingEntry>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tx_id: &TransactionId) -> bool {
        self.entries.contains_key(tx_id)
    }

    /// The queued actions for `tx_id`, if any.
    pub fn actions(&self, tx_id: &TransactionId) -> Option<&[Action]> {
        self.entries.get(tx_id).map(|e| e.actions.as_slice())
    }

    /// Append `action` to the entry for `tx_id`, creating it if needed.
    pub fn push(&mut self, tx_id: &TransactionId, action: Action, head_block: u32) {
        self.entries
            .entry(tx_id.clone())
            .or_insert_with(|| PendingEntry {
                actions: Vec::new(),
                queued_at_block: head_block,
            })
            .actions
            .push(action);
    }

    /// Remove and return the entry for `tx_id`.
    pub fn remove(&mut self, tx_id: &TransactionId) -> Option<PendingEntry> {
        self.entries.remove(tx_id)
    }

    /// Drop entries queued more than `horizon` blocks before `head_block`.
    ///
    /// Returns the ids that were dropped.
    pub fn prune(&mut self, head_block: u32, horizon: u32) -> Vec<TransactionId> {
        let mut dropped = Vec::new();
        self.entries.retain(|id, entry| {
            let keep = head_block.saturating_sub(entry.queued_at_block) <= horizon;
            if !keep {
                dropped.push(id.clone());
            }
            keep
        });
        dropped.sort();
        dropped
    }
}
