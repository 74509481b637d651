//! Watcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decoder::DEFAULT_DECODE_BUDGET;
use crate::error::ConfigError;
use crate::filter::{WatchEntry, WatchSet};
use crate::name::Name;

/// Default outbound bind address.
pub const DEFAULT_SENDER_BIND: &str = "tcp://127.0.0.1:5556";

/// Default age limit for accepted-block notifications, in seconds.
pub const DEFAULT_AGE_LIMIT_SECS: i64 = 60;

/// Configuration for a watcher instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Outbound transport bind address. Empty disables the watcher.
    #[serde(default = "default_sender_bind")]
    pub sender_bind: String,
    /// Blocks older than this many seconds produce no notification.
    /// Negative means no limit.
    #[serde(default = "default_age_limit")]
    pub age_limit_secs: i64,
    /// `receiver[:action]` watch specifications.
    #[serde(default)]
    pub watch: Vec<String>,
    /// Time budget for one ABI lookup plus payload decode.
    #[serde(default = "default_decode_budget_ms")]
    pub decode_budget_ms: u64,
    /// Drop pending entries that stay unmatched for more than this many
    /// accepted blocks. `None` keeps them until matched or failed.
    #[serde(default)]
    pub pending_horizon_blocks: Option<u32>,
}

fn default_sender_bind() -> String {
    DEFAULT_SENDER_BIND.to_string()
}

fn default_age_limit() -> i64 {
    DEFAULT_AGE_LIMIT_SECS
}

fn default_decode_budget_ms() -> u64 {
    DEFAULT_DECODE_BUDGET.as_millis() as u64
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            sender_bind: default_sender_bind(),
            age_limit_secs: default_age_limit(),
            watch: Vec::new(),
            decode_budget_ms: default_decode_budget_ms(),
            pending_horizon_blocks: None,
        }
    }
}

impl WatcherConfig {
    /// Returns `false` when no sender bind address is configured.
    pub fn is_enabled(&self) -> bool {
        !self.sender_bind.trim().is_empty()
    }

    /// The age limit, or `None` when blocks of any age are reported.
    pub fn age_limit(&self) -> Option<Duration> {
        u64::try_from(self.age_limit_secs).ok().map(Duration::from_secs)
    }

    pub fn decode_budget(&self) -> Duration {
        Duration::from_millis(self.decode_budget_ms)
    }

    /// Parse every watch specification into the ordered watch-set.
    pub fn watch_set(&self) -> Result<WatchSet, ConfigError> {
        self.watch.iter().map(|s| parse_watch(s)).collect()
    }
}

/// Parse a `receiver[:action]` watch specification.
///
/// `receiver` and `receiver:` both watch every action of `receiver`.
pub fn parse_watch(spec: &str) -> Result<WatchEntry, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidWatch {
        spec: spec.to_string(),
        reason,
    };

    let fields: Vec<&str> = spec.split(':').collect();
    if fields.len() > 2 {
        return Err(invalid(format!(
            "expected receiver[:action], found {} fields",
            fields.len()
        )));
    }

    let receiver: Name = fields[0].trim().parse().map_err(|e: ConfigError| invalid(e.to_string()))?;
    if receiver.is_empty() {
        return Err(invalid("receiver must not be empty".into()));
    }

    let action = match fields.get(1) {
        Some(a) => a.trim().parse().map_err(|e: ConfigError| invalid(e.to_string()))?,
        None => Name::EMPTY,
    };

    Ok(WatchEntry::new(receiver, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn defaults() {
        let cfg = WatcherConfig::default();
        assert_eq!(cfg.sender_bind, "tcp://127.0.0.1:5556");
        assert_eq!(cfg.age_limit(), Some(Duration::from_secs(60)));
        assert_eq!(cfg.decode_budget(), Duration::from_secs(5));
        assert!(cfg.is_enabled());
    }

    #[test]
    fn decode_budget_default_follows_decoder() {
        let from_file: WatcherConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(from_file.decode_budget(), DEFAULT_DECODE_BUDGET);
        assert_eq!(WatcherConfig::default().decode_budget(), DEFAULT_DECODE_BUDGET);
    }

    #[test]
    fn negative_age_limit_is_unbounded() {
        let cfg = WatcherConfig { age_limit_secs: -1, ..Default::default() };
        assert_eq!(cfg.age_limit(), None);
    }

    #[test]
    fn empty_bind_disables() {
        let cfg = WatcherConfig { sender_bind: "  ".into(), ..Default::default() };
        assert!(!cfg.is_enabled());
    }

    #[test]
    fn parse_watch_forms() {
        assert_eq!(parse_watch("alice").unwrap(), WatchEntry::any_action(n("alice")));
        assert_eq!(parse_watch("alice:").unwrap(), WatchEntry::any_action(n("alice")));
        assert_eq!(
            parse_watch("alice:transfer").unwrap(),
            WatchEntry::new(n("alice"), n("transfer"))
        );
    }

    #[test]
    fn parse_watch_rejects_bad_specs() {
        assert!(parse_watch("a:b:c").is_err());
        assert!(parse_watch(":transfer").is_err());
        assert!(parse_watch("").is_err());
        assert!(parse_watch("Alice:transfer").is_err());
    }

    #[test]
    fn watch_set_is_ordered_and_deduplicated() {
        let cfg = WatcherConfig {
            watch: vec!["bob".into(), "alice:".into(), "alice".into()],
            ..Default::default()
        };
        let set = cfg.watch_set().unwrap();
        let receivers: Vec<String> = set.iter().map(|e| e.receiver.to_string()).collect();
        assert_eq!(receivers, vec!["alice", "bob"]);
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: WatcherConfig = serde_json::from_str(r#"{"watch":["alice"]}"#).unwrap();
        assert_eq!(cfg.age_limit_secs, 60);
        assert_eq!(cfg.watch, vec!["alice".to_string()]);
        assert_eq!(cfg.pending_horizon_blocks, None);
    }
}
