//! Fluent builder API for creating watchers.
//!
//! # Example
//!
//! ```rust,no_run
//! use chainwatch_core::{MessageSink, TransportError, WatcherBuilder};
//!
//! struct Discard;
//!
//! impl MessageSink for Discard {
//!     fn send(&mut self, _frame: &[u8]) -> Result<(), TransportError> { Ok(()) }
//!     fn endpoint(&self) -> &str { "discard" }
//! }
//!
//! let watcher = WatcherBuilder::new()
//!     .watch("chintaiqueue")
//!     .watch("chintaibank:")
//!     .age_limit_secs(-1)
//!     .build(Box::new(Discard))
//!     .unwrap();
//! ```

use std::sync::Arc;

use crate::config::WatcherConfig;
use crate::decoder::{AbiProvider, ActionDecoder, NoAbis};
use crate::error::ConfigError;
use crate::filter::ActionFilter;
use crate::publisher::{MessageSink, Publisher};
use crate::watcher::Watcher;

/// Fluent builder for [`Watcher`].
pub struct WatcherBuilder {
    config: WatcherConfig,
    provider: Arc<dyn AbiProvider>,
}

impl Default for WatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: WatcherConfig::default(),
            provider: Arc::new(NoAbis),
        }
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a `receiver[:action]` watch specification.
    pub fn watch(mut self, spec: impl Into<String>) -> Self {
        self.config.watch.push(spec.into());
        self
    }

    /// Set the block age limit in seconds (negative = no limit).
    pub fn age_limit_secs(mut self, secs: i64) -> Self {
        self.config.age_limit_secs = secs;
        self
    }

    /// Set the per-action decode budget in milliseconds.
    pub fn decode_budget_ms(mut self, ms: u64) -> Self {
        self.config.decode_budget_ms = ms;
        self
    }

    /// Drop pending entries left unmatched for more than `blocks` accepted blocks.
    pub fn pending_horizon_blocks(mut self, blocks: u32) -> Self {
        self.config.pending_horizon_blocks = Some(blocks);
        self
    }

    /// Set the ABI registry used to decode action payloads.
    pub fn abi_provider(mut self, provider: Arc<dyn AbiProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Return the accumulated configuration.
    pub fn build_config(self) -> WatcherConfig {
        self.config
    }

    /// Validate the configuration and build a watcher publishing to `sink`.
    pub fn build(self, sink: Box<dyn MessageSink>) -> Result<Watcher, ConfigError> {
        let watch = self.config.watch_set()?;
        if watch.is_empty() {
            tracing::warn!("Watch-set is empty; only block heartbeats will be published");
        }
        for entry in &watch {
            tracing::info!(receiver = %entry.receiver, action = %entry.action, "Watching");
        }

        let decoder = ActionDecoder::new(self.provider, self.config.decode_budget());
        let watcher = Watcher::new(
            ActionFilter::new(watch),
            decoder,
            Publisher::new(sink),
            self.config.age_limit(),
        )
        .with_pending_horizon(self.config.pending_horizon_blocks);
        Ok(watcher)
    }
}
