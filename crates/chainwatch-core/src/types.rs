//! Host-side execution types: action traces, transaction traces, blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::name::Name;

// ─── Identifiers ──────────────────────────────────────────────────────────────

/// A transaction id (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

// ─── Actions ──────────────────────────────────────────────────────────────────

/// An `(actor, permission)` pair authorizing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

/// A single contract invocation with its raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The contract invoked.
    pub account: Name,
    pub name: Name,
    #[serde(default)]
    pub authorization: Vec<PermissionLevel>,
    /// Raw payload, hex encoded on the wire.
    #[serde(default, with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Action {
    /// The first authorizing actor, if the action carries any authorization.
    pub fn first_actor(&self) -> Option<Name> {
        self.authorization.first().map(|p| p.actor)
    }
}

/// One executed action plus the inline actions it triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTrace {
    /// The account whose code ran for this trace (the receipt receiver).
    pub receiver: Name,
    pub act: Action,
    #[serde(default)]
    pub inline_traces: Vec<ActionTrace>,
}

impl ActionTrace {
    /// Depth-first, parent-before-children iterator over this trace and all
    /// of its inline traces.
    pub fn walk(&self) -> TraceWalk<'_> {
        TraceWalk { stack: vec![self] }
    }
}

/// Preorder iterator returned by [`ActionTrace::walk`].
pub struct TraceWalk<'a> {
    stack: Vec<&'a ActionTrace>,
}

impl<'a> Iterator for TraceWalk<'a> {
    type Item = &'a ActionTrace;

    fn next(&mut self) -> Option<Self::Item> {
        let trace = self.stack.pop()?;
        self.stack.extend(trace.inline_traces.iter().rev());
        Some(trace)
    }
}

// ─── Transactions ─────────────────────────────────────────────────────────────

/// Final status recorded in a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Succeeded, no error handler executed.
    Executed,
    /// Objectively failed (not executed), error handler executed.
    SoftFail,
    /// Objectively failed and error handler objectively failed.
    HardFail,
    /// Scheduled for delayed execution.
    Delayed,
    /// Expired; CPU and NET billed to the payer.
    Expired,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "executed"),
            Self::SoftFail => write!(f, "soft_fail"),
            Self::HardFail => write!(f, "hard_fail"),
            Self::Delayed => write!(f, "delayed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceiptHeader {
    pub status: TransactionStatus,
}

/// The result of executing one transaction, as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTrace {
    pub id: TransactionId,
    #[serde(default)]
    pub receipt: Option<TransactionReceiptHeader>,
    #[serde(default)]
    pub action_traces: Vec<ActionTrace>,
    /// Set when executing this transaction retired a deferred transaction
    /// that failed.
    #[serde(default)]
    pub failed_dtrx_trace: Option<Box<TransactionTrace>>,
}

impl TransactionTrace {
    /// Returns `true` if the trace carries a receipt with `executed` status.
    pub fn is_executed(&self) -> bool {
        matches!(
            self.receipt,
            Some(TransactionReceiptHeader { status: TransactionStatus::Executed })
        )
    }
}

/// A signed transaction in its packed wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedTransaction {
    #[serde(default)]
    pub signatures: Vec<String>,
    /// The serialized (uncompressed) transaction.
    #[serde(with = "hex_bytes")]
    pub packed_trx: Vec<u8>,
}

impl PackedTransaction {
    /// The transaction id: SHA-256 of the serialized transaction.
    pub fn id(&self) -> TransactionId {
        TransactionId(hex::encode(Sha256::digest(&self.packed_trx)))
    }
}

/// A transaction as referenced from a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TransactionRef {
    /// A deferred transaction, referenced by id only.
    Deferred(TransactionId),
    /// A regular transaction carried in full.
    Packed(PackedTransaction),
}

impl TransactionRef {
    pub fn id(&self) -> TransactionId {
        match self {
            Self::Deferred(id) => id.clone(),
            Self::Packed(trx) => trx.id(),
        }
    }
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

/// The parts of a signed block the watcher reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block_num: u32,
    /// RFC 3339, or the node's zone-less `2018-06-09T11:56:30.500` (UTC).
    #[serde(deserialize_with = "block_time::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub transactions: Vec<TransactionRef>,
}

impl SignedBlock {
    /// Ids of every transaction in the block, in block order.
    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.transactions.iter().map(TransactionRef::id).collect()
    }
}

// ─── Serde helpers ────────────────────────────────────────────────────────────

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod block_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const NODE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&s) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&s, NODE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn trace(receiver: &str, name: &str, inline: Vec<ActionTrace>) -> ActionTrace {
        ActionTrace {
            receiver: n(receiver),
            act: Action {
                account: n(receiver),
                name: n(name),
                authorization: vec![],
                data: vec![],
            },
            inline_traces: inline,
        }
    }

    #[test]
    fn walk_is_depth_first_parent_first() {
        let root = trace(
            "a",
            "root",
            vec![
                trace("b", "left", vec![trace("c", "leftleaf", vec![])]),
                trace("d", "right", vec![]),
            ],
        );
        let order: Vec<String> = root.walk().map(|t| t.act.name.to_string()).collect();
        assert_eq!(order, vec!["root", "left", "leftleaf", "right"]);
    }

    #[test]
    fn packed_transaction_id_is_sha256_of_payload() {
        let trx = PackedTransaction {
            signatures: vec![],
            packed_trx: b"abc".to_vec(),
        };
        assert_eq!(
            trx.id().as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn transaction_ref_resolves_both_kinds() {
        let deferred = TransactionRef::Deferred(TransactionId::new("ABCDEF"));
        assert_eq!(deferred.id().as_str(), "abcdef");

        let packed = TransactionRef::Packed(PackedTransaction {
            signatures: vec![],
            packed_trx: vec![],
        });
        assert_eq!(
            packed.id().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn trace_without_receipt_is_not_executed() {
        let json = r#"{"id":"t1","action_traces":[]}"#;
        let trace: TransactionTrace = serde_json::from_str(json).unwrap();
        assert!(!trace.is_executed());
    }

    #[test]
    fn action_data_is_hex_on_the_wire() {
        let json = r#"{"account":"eosio.token","name":"transfer","authorization":[{"actor":"bob","permission":"active"}],"data":"0x0102ff"}"#;
        let act: Action = serde_json::from_str(json).unwrap();
        assert_eq!(act.data, vec![1, 2, 255]);
        assert_eq!(act.first_actor(), Some(n("bob")));
        let back = serde_json::to_value(&act).unwrap();
        assert_eq!(back["data"], "0102ff");
    }

    #[test]
    fn transaction_id_is_lowercased_on_the_wire() {
        let id: TransactionId = serde_json::from_str(r#""BA7816BF""#).unwrap();
        assert_eq!(id.as_str(), "ba7816bf");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""ba7816bf""#);

        let trace: TransactionTrace =
            serde_json::from_str(r#"{"id":"ABCDEF","action_traces":[]}"#).unwrap();
        assert_eq!(trace.id, TransactionId::new("abcdef"));
    }

    #[test]
    fn block_timestamp_accepts_both_formats() {
        let zoned: SignedBlock =
            serde_json::from_str(r#"{"block_num":1,"timestamp":"2018-06-09T11:56:30.500Z"}"#).unwrap();
        let node: SignedBlock =
            serde_json::from_str(r#"{"block_num":1,"timestamp":"2018-06-09T11:56:30.500"}"#).unwrap();
        assert_eq!(zoned.timestamp, node.timestamp);
        assert_eq!(node.timestamp.timestamp_millis(), 1_528_545_390_500);

        let bad = serde_json::from_str::<SignedBlock>(r#"{"block_num":1,"timestamp":"yesterday"}"#);
        assert!(bad.is_err());
    }
}
