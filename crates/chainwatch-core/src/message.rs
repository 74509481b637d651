//! Outbound message types.
//!
//! Every message carries an explicit `msg_type` tag so consumers can decode
//! the stream without out-of-band context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::name::Name;
use crate::types::{Action, PermissionLevel, TransactionId};

/// Discriminates the two outbound message kinds. Serialized as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Block,
    IrreversibleBlock,
}

impl MsgType {
    pub fn code(self) -> u32 {
        match self {
            Self::Block => 0,
            Self::IrreversibleBlock => 1,
        }
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::IrreversibleBlock => write!(f, "irreversible_block"),
        }
    }
}

impl Serialize for MsgType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for MsgType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u32::deserialize(deserializer)? {
            0 => Ok(Self::Block),
            1 => Ok(Self::IrreversibleBlock),
            other => Err(serde::de::Error::custom(format!("unknown msg_type {other}"))),
        }
    }
}

/// Anything the publisher can put on the wire.
pub trait OutboundMessage: Serialize {
    fn msg_type(&self) -> MsgType;
    fn block_num(&self) -> u32;
}

// ─── Block messages ───────────────────────────────────────────────────────────

/// One relevant action, with its payload decoded when possible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNotification {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    /// `null` when the payload was skipped or could not be decoded.
    pub action_data: Option<Value>,
}

impl ActionNotification {
    pub fn new(act: &Action, action_data: Option<Value>) -> Self {
        Self {
            account: act.account,
            name: act.name,
            authorization: act.authorization.clone(),
            action_data,
        }
    }
}

/// The relevant actions of one transaction included in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMessage {
    pub tx_id: TransactionId,
    pub actions: Vec<ActionNotification>,
}

/// Sent once for every accepted block that passes the age gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub block_num: u32,
    #[serde(with = "fc_time")]
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<TransactionMessage>,
    pub msg_type: MsgType,
}

impl BlockMessage {
    pub fn new(block_num: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            block_num,
            timestamp,
            transactions: Vec::new(),
            msg_type: MsgType::Block,
        }
    }
}

impl OutboundMessage for BlockMessage {
    fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    fn block_num(&self) -> u32 {
        self.block_num
    }
}

/// Sent for every block that becomes irreversible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrreversibleBlockMessage {
    pub block_num: u32,
    #[serde(with = "fc_time")]
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<TransactionId>,
    pub msg_type: MsgType,
}

impl IrreversibleBlockMessage {
    pub fn new(block_num: u32, timestamp: DateTime<Utc>, transactions: Vec<TransactionId>) -> Self {
        Self {
            block_num,
            timestamp,
            transactions,
            msg_type: MsgType::IrreversibleBlock,
        }
    }
}

impl OutboundMessage for IrreversibleBlockMessage {
    fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    fn block_num(&self) -> u32 {
        self.block_num
    }
}

/// Millisecond-precision UTC timestamps without a zone suffix,
/// e.g. `2018-06-09T11:56:30.500`.
pub mod fc_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
