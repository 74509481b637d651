//! Host event stream abstraction.
//!
//! The host node owns dispatch order; the watcher only asks for the next
//! event and handles it to completion before asking again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WatcherError;
use crate::types::{SignedBlock, TransactionTrace};

/// One notification from the host node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChainEvent {
    /// A transaction finished executing (speculatively or in a block).
    AppliedTransaction(TransactionTrace),
    /// A block was accepted by the node.
    AcceptedBlock(SignedBlock),
    /// A block became irreversible.
    IrreversibleBlock(SignedBlock),
}

/// A sequential supply of chain events.
#[async_trait]
pub trait EventSource: Send {
    /// The next event, or `None` once the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<ChainEvent>, WatcherError>;
}

/// Adapts any iterator of events into an [`EventSource`].
pub struct IterSource<I>(I);

impl<I> IterSource<I>
where
    I: Iterator<Item = ChainEvent> + Send,
{
    pub fn new(events: impl IntoIterator<IntoIter = I>) -> Self {
        Self(events.into_iter())
    }
}

#[async_trait]
impl<I> EventSource for IterSource<I>
where
    I: Iterator<Item = ChainEvent> + Send,
{
    async fn next_event(&mut self) -> Result<Option<ChainEvent>, WatcherError> {
        Ok(self.0.next())
    }
}
