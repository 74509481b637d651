//! Action relevance filtering.
//!
//! Two layers: a fixed allow-list of action names keeps volume bounded to
//! known event kinds, and the operator's watch-set scopes output to specific
//! accounts.

use std::collections::BTreeSet;

use crate::name::Name;
use crate::types::{ActionTrace, TransactionId};

/// Action names the watcher reports on.
pub const RELEVANT_ACTIONS: &[&str] = &[
    "extensions",
    "undelegatebw",
    "delegatebw",
    "reminactive",
    "chinrefund",
    "delaycancel",
    "chinundel",
    "prepare",
    "activate",
    "uninit",
    "init",
    "freeze",
    "cancelorder",
    "cancelorderc",
    "processpool",
    "transfer",
    "sortdeftrx",
    "cdeferred",
    "liveundel",
];

/// `(action, receiver)` pairs that only ever occur by mistake.
const MISROUTED: &[(&str, &str)] = &[("chinundel", "eosio")];

// ─── WatchEntry ──────────────────────────────────────────────────────────────

/// One `receiver[:action]` watch specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchEntry {
    pub receiver: Name,
    /// [`Name::EMPTY`] means any action on `receiver`.
    pub action: Name,
}

impl WatchEntry {
    pub fn new(receiver: Name, action: Name) -> Self {
        Self { receiver, action }
    }

    /// An entry matching every action on `receiver`.
    pub fn any_action(receiver: Name) -> Self {
        Self::new(receiver, Name::EMPTY)
    }
}

/// The operator's ordered watch-set. Immutable once built.
pub type WatchSet = BTreeSet<WatchEntry>;

// ─── ActionFilter ────────────────────────────────────────────────────────────

/// Decides whether an action trace belongs in the pending queue.
#[derive(Debug, Clone)]
pub struct ActionFilter {
    watch: WatchSet,
    allowed: BTreeSet<Name>,
    misrouted: Vec<(Name, Name)>,
}

impl ActionFilter {
    pub fn new(watch: WatchSet) -> Self {
        Self {
            watch,
            allowed: RELEVANT_ACTIONS.iter().map(|a| parse_const(a)).collect(),
            misrouted: MISROUTED
                .iter()
                .map(|(action, receiver)| (parse_const(action), parse_const(receiver)))
                .collect(),
        }
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch
    }

    /// Returns `true` if `trace` should be queued under `tx_id`.
    pub fn is_relevant(&self, trace: &ActionTrace, tx_id: &TransactionId) -> bool {
        let act = &trace.act;
        if !self.allowed.contains(&act.name) {
            return false;
        }

        let watched = |account: Name| self.watch.contains(&WatchEntry::any_action(account));
        let by_actor = act.first_actor().is_some_and(|actor| watched(actor));
        if !by_actor && !watched(trace.receiver) {
            return false;
        }

        if self.misrouted.contains(&(act.name, trace.receiver)) {
            tracing::warn!(
                tx_id = %tx_id,
                action = %act.name,
                receiver = %trace.receiver,
                "Ignoring misrouted action"
            );
            return false;
        }

        true
    }
}

fn parse_const(s: &str) -> Name {
    // Constants above are valid names; an invalid one would be a typo caught by tests.
    s.parse().unwrap_or(Name::EMPTY)
}
