//! Action payload decoding against the node's ABI registry.
//!
//! The registry itself is a collaborator: the watcher only needs "give me a
//! serializer for this account" and "turn these bytes for this action into a
//! structured value". Concrete registries live in `chainwatch-abi`.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{DecodeError, PayloadError};
use crate::name::Name;
use crate::types::Action;

/// Actions whose payload is large binary and never decoded.
pub const OPAQUE_ACTIONS: &[&str] = &["processpool"];

/// Default time budget for one ABI lookup plus deserialization.
pub const DEFAULT_DECODE_BUDGET: Duration = Duration::from_secs(5);

/// Decodes raw action payloads for a single account.
pub trait ActionSerializer: Send + Sync {
    /// The struct type declared for `action`, if the ABI has one.
    fn action_type(&self, action: Name) -> Option<String>;

    /// Deserialize `data` as `type_name`, giving up once `deadline` passes.
    fn binary_to_value(
        &self,
        type_name: &str,
        data: &[u8],
        deadline: Instant,
    ) -> Result<Value, PayloadError>;
}

/// Looks up the serializer for an account.
pub trait AbiProvider: Send + Sync {
    /// Returns `None` when no ABI is registered for `account`.
    fn serializer(&self, account: Name, budget: Duration) -> Option<Arc<dyn ActionSerializer>>;
}

/// A provider with no ABIs at all. Every decode fails with `SchemaUnavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAbis;

impl AbiProvider for NoAbis {
    fn serializer(&self, _account: Name, _budget: Duration) -> Option<Arc<dyn ActionSerializer>> {
        None
    }
}

/// Turns raw actions into structured `action_data` values.
#[derive(Clone)]
pub struct ActionDecoder {
    provider: Arc<dyn AbiProvider>,
    budget: Duration,
    opaque: Vec<Name>,
}

impl ActionDecoder {
    pub fn new(provider: Arc<dyn AbiProvider>, budget: Duration) -> Self {
        Self {
            provider,
            budget,
            opaque: OPAQUE_ACTIONS.iter().filter_map(|a| a.parse().ok()).collect(),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Decode `data` as the payload of `account::action`.
    pub fn decode(&self, account: Name, action: Name, data: &[u8]) -> Result<Value, DecodeError> {
        let deadline = Instant::now() + self.budget;
        let serializer = self
            .provider
            .serializer(account, self.budget)
            .ok_or_else(|| DecodeError::SchemaUnavailable { account: account.to_string() })?;
        let type_name = serializer.action_type(action).ok_or_else(|| DecodeError::UnknownAction {
            account: account.to_string(),
            action: action.to_string(),
        })?;

        serializer
            .binary_to_value(&type_name, data, deadline)
            .map_err(|e| match e {
                PayloadError::Malformed(reason) => DecodeError::Malformed {
                    account: account.to_string(),
                    action: action.to_string(),
                    reason,
                },
                PayloadError::DeadlineExceeded => DecodeError::BudgetExceeded {
                    account: account.to_string(),
                    action: action.to_string(),
                    budget_ms: self.budget.as_millis() as u64,
                },
            })
    }

    /// Returns `true` if `act` carries no payload worth decoding.
    pub fn skips(&self, act: &Action) -> bool {
        act.data.is_empty() || self.opaque.contains(&act.name)
    }

    /// The `action_data` value for a notification: `None` for skipped
    /// actions, the decoded payload otherwise.
    pub fn action_data(&self, act: &Action) -> Result<Option<Value>, DecodeError> {
        if self.skips(act) {
            return Ok(None);
        }
        self.decode(act.account, act.name, &act.data).map(Some)
    }

    /// Best-effort rendering of an action's payload for log lines.
    pub fn describe(&self, act: &Action) -> String {
        match self.action_data(act) {
            Ok(Some(value)) => value.to_string(),
            Ok(None) => String::new(),
            Err(e) => format!("<undecodable: {e}>"),
        }
    }
}

impl std::fmt::Debug for ActionDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDecoder")
            .field("budget", &self.budget)
            .field("opaque", &self.opaque)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Serializer for a single `transfer` action whose payload is UTF-8 text.
    struct TextAbi;

    impl ActionSerializer for TextAbi {
        fn action_type(&self, action: Name) -> Option<String> {
            (action.to_string() == "transfer").then(|| "transfer".to_string())
        }

        fn binary_to_value(
            &self,
            _type_name: &str,
            data: &[u8],
            deadline: Instant,
        ) -> Result<Value, PayloadError> {
            if Instant::now() >= deadline {
                return Err(PayloadError::DeadlineExceeded);
            }
            let memo = std::str::from_utf8(data).map_err(|e| PayloadError::Malformed(e.to_string()))?;
            Ok(json!({ "memo": memo }))
        }
    }

    struct OnlyAlice;

    impl AbiProvider for OnlyAlice {
        fn serializer(&self, account: Name, _budget: Duration) -> Option<Arc<dyn ActionSerializer>> {
            (account.to_string() == "alice").then(|| Arc::new(TextAbi) as Arc<dyn ActionSerializer>)
        }
    }

    fn n(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn act(account: &str, name: &str, data: &[u8]) -> Action {
        Action {
            account: n(account),
            name: n(name),
            authorization: vec![],
            data: data.to_vec(),
        }
    }

    fn decoder() -> ActionDecoder {
        ActionDecoder::new(Arc::new(OnlyAlice), DEFAULT_DECODE_BUDGET)
    }

    #[test]
    fn decodes_known_action() {
        let v = decoder().action_data(&act("alice", "transfer", b"hi")).unwrap();
        assert_eq!(v, Some(json!({ "memo": "hi" })));
    }

    #[test]
    fn missing_schema_and_unknown_action() {
        let d = decoder();
        let err = d.decode(n("bob"), n("transfer"), b"x").unwrap_err();
        assert!(matches!(err, DecodeError::SchemaUnavailable { .. }));
        let err = d.decode(n("alice"), n("freeze"), b"x").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownAction { .. }));
    }

    #[test]
    fn malformed_payload_carries_context() {
        let err = decoder().decode(n("alice"), n("transfer"), &[0xff, 0xfe]).unwrap_err();
        match err {
            DecodeError::Malformed { account, action, .. } => {
                assert_eq!(account, "alice");
                assert_eq!(action, "transfer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_budget_surfaces_as_budget_exceeded() {
        let d = ActionDecoder::new(Arc::new(OnlyAlice), Duration::ZERO);
        let err = d.decode(n("alice"), n("transfer"), b"hi").unwrap_err();
        assert!(matches!(err, DecodeError::BudgetExceeded { budget_ms: 0, .. }));
    }

    #[test]
    fn opaque_and_empty_payloads_are_skipped() {
        let d = decoder();
        assert_eq!(d.action_data(&act("bob", "processpool", b"\x01\x02")).unwrap(), None);
        assert_eq!(d.action_data(&act("bob", "transfer", b"")).unwrap(), None);
    }

    #[test]
    fn describe_never_fails() {
        let d = decoder();
        assert_eq!(d.describe(&act("alice", "transfer", b"hi")), r#"{"memo":"hi"}"#);
        assert!(d.describe(&act("bob", "transfer", b"hi")).starts_with("<undecodable"));
    }
}
