//! chainwatch-core: the correlation engine behind the block watcher.
//!
//! # Architecture
//!
//! ```text
//! EventSource ──► Watcher::dispatch
//!                    ├── on_applied_transaction → ActionFilter → PendingQueue
//!                    ├── on_accepted_block      → PendingQueue (match + evict)
//!                    │                            → ActionDecoder → Publisher
//!                    └── on_irreversible_block  → Publisher
//! ```
//!
//! The node's ABI registry and the outbound transport are collaborators,
//! reached through the [`AbiProvider`] and [`MessageSink`] traits.

pub mod builder;
pub mod config;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod message;
pub mod name;
pub mod publisher;
pub mod queue;
pub mod source;
pub mod types;
pub mod watcher;

pub use builder::WatcherBuilder;
pub use config::WatcherConfig;
pub use decoder::{AbiProvider, ActionDecoder, ActionSerializer, NoAbis};
pub use error::{ConfigError, DecodeError, PayloadError, TransportError, WatcherError};
pub use filter::{ActionFilter, WatchEntry, WatchSet};
pub use message::{ActionNotification, BlockMessage, IrreversibleBlockMessage, MsgType, TransactionMessage};
pub use name::Name;
pub use publisher::{MessageSink, Publisher};
pub use queue::PendingQueue;
pub use source::{ChainEvent, EventSource};
pub use types::{
    Action, ActionTrace, PackedTransaction, PermissionLevel, SignedBlock, TransactionId,
    TransactionRef, TransactionStatus, TransactionTrace,
};
pub use watcher::Watcher;
