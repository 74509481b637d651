//! End-to-end correlation scenarios: applied transactions, accepted blocks,
//! irreversible blocks, and what ends up on the wire.

use chainwatch_core::{
    source::IterSource, Action, ActionTrace, ChainEvent, MessageSink, PermissionLevel,
    SignedBlock, TransactionId, TransactionRef, TransactionStatus, TransactionTrace,
    TransportError, Watcher, WatcherBuilder,
};
use chainwatch_core::types::{PackedTransaction, TransactionReceiptHeader};
use chainwatch_sink::MemorySink;
use chrono::{Duration, Utc};
use serde_json::json;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn watcher(age_limit: i64) -> (Watcher, MemorySink) {
    let sink = MemorySink::new();
    let watcher = WatcherBuilder::new()
        .watch("alice")
        .age_limit_secs(age_limit)
        .build(Box::new(sink.clone()))
        .unwrap();
    (watcher, sink)
}

fn action(receiver: &str, name: &str, actor: &str) -> ActionTrace {
    ActionTrace {
        receiver: receiver.parse().unwrap(),
        act: Action {
            account: receiver.parse().unwrap(),
            name: name.parse().unwrap(),
            authorization: vec![PermissionLevel {
                actor: actor.parse().unwrap(),
                permission: "active".parse().unwrap(),
            }],
            data: vec![],
        },
        inline_traces: vec![],
    }
}

fn applied(id: &str, status: TransactionStatus, traces: Vec<ActionTrace>) -> TransactionTrace {
    TransactionTrace {
        id: TransactionId::new(id),
        receipt: Some(TransactionReceiptHeader { status }),
        action_traces: traces,
        failed_dtrx_trace: None,
    }
}

fn block(num: u32, ids: &[&str]) -> SignedBlock {
    SignedBlock {
        block_num: num,
        timestamp: Utc::now(),
        transactions: ids
            .iter()
            .map(|id| TransactionRef::Deferred(TransactionId::new(*id)))
            .collect(),
    }
}

fn queued_names(w: &Watcher, id: &str) -> Vec<String> {
    w.pending()
        .actions(&TransactionId::new(id))
        .map(|acts| acts.iter().map(|a| a.name.to_string()).collect())
        .unwrap_or_default()
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn transfer_to_watched_receiver_is_reported_in_its_block() {
    let (mut w, sink) = watcher(-1);
    w.on_applied_transaction(&applied(
        "t1",
        TransactionStatus::Executed,
        vec![action("alice", "transfer", "bob")],
    ));
    assert_eq!(queued_names(&w, "t1"), vec!["transfer"]);

    w.on_accepted_block(&block(1, &["t1"])).unwrap();

    let msgs = sink.messages();
    assert_eq!(msgs.len(), 1);
    let msg = &msgs[0];
    assert_eq!(msg["msg_type"], 0);
    assert_eq!(msg["block_num"], 1);
    assert_eq!(msg["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(msg["transactions"][0]["tx_id"], "t1");
    let actions = msg["transactions"][0]["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["name"], "transfer");
    assert_eq!(actions[0]["account"], "alice");
    assert_eq!(actions[0]["authorization"][0]["actor"], "bob");
    assert!(actions[0]["action_data"].is_null());
    assert!(!w.pending().contains(&TransactionId::new("t1")));
}

#[test]
fn re_execution_replaces_pending_actions() {
    let (mut w, _sink) = watcher(-1);
    w.on_applied_transaction(&applied(
        "t1",
        TransactionStatus::Executed,
        vec![action("alice", "transfer", "bob"), action("alice", "freeze", "bob")],
    ));
    w.on_applied_transaction(&applied(
        "t1",
        TransactionStatus::Executed,
        vec![action("alice", "init", "bob")],
    ));
    assert_eq!(queued_names(&w, "t1"), vec!["init"]);
    assert_eq!(w.pending().len(), 1);
}

#[test]
fn non_executed_transactions_leave_the_queue_untouched() {
    let (mut w, _sink) = watcher(-1);
    w.on_applied_transaction(&applied(
        "t1",
        TransactionStatus::Executed,
        vec![action("alice", "transfer", "bob")],
    ));

    for status in [
        TransactionStatus::SoftFail,
        TransactionStatus::HardFail,
        TransactionStatus::Delayed,
        TransactionStatus::Expired,
    ] {
        w.on_applied_transaction(&applied("t1", status, vec![action("alice", "init", "bob")]));
        w.on_applied_transaction(&applied("t9", status, vec![action("alice", "init", "bob")]));
    }

    let mut no_receipt = applied("t1", TransactionStatus::Executed, vec![]);
    no_receipt.receipt = None;
    w.on_applied_transaction(&no_receipt);

    assert_eq!(queued_names(&w, "t1"), vec!["transfer"]);
    assert!(!w.pending().contains(&TransactionId::new("t9")));
}

#[test]
fn irrelevant_actions_never_touch_the_queue() {
    let (mut w, _sink) = watcher(-1);
    w.on_applied_transaction(&applied(
        "t1",
        TransactionStatus::Executed,
        vec![
            action("carol", "transfer", "dave"),
            action("alice", "voteproducer", "bob"),
        ],
    ));
    assert!(w.pending().is_empty());
}

#[test]
fn every_accepted_block_produces_exactly_one_message() {
    let (mut w, sink) = watcher(-1);
    for num in 1..=3 {
        w.on_accepted_block(&block(num, &["unrelated"])).unwrap();
    }
    let msgs = sink.messages();
    assert_eq!(msgs.len(), 3);
    for (i, msg) in msgs.iter().enumerate() {
        assert_eq!(msg["block_num"], i as u64 + 1);
        assert_eq!(msg["transactions"], json!([]));
    }
}

#[test]
fn matched_transaction_is_not_reported_twice() {
    let (mut w, sink) = watcher(-1);
    let trace = applied("t1", TransactionStatus::Executed, vec![action("alice", "transfer", "bob")]);

    w.on_applied_transaction(&trace);
    w.on_accepted_block(&block(1, &["t1"])).unwrap();
    w.on_accepted_block(&block(2, &["t1"])).unwrap();

    // A fresh execution after inclusion is a new entry and surfaces only later.
    w.on_applied_transaction(&trace);
    w.on_accepted_block(&block(3, &["t1"])).unwrap();

    let msgs = sink.messages();
    assert_eq!(msgs[0]["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(msgs[1]["transactions"].as_array().unwrap().len(), 0);
    assert_eq!(msgs[2]["transactions"].as_array().unwrap().len(), 1);
}

#[test]
fn failed_deferred_transaction_is_never_reported() {
    let (mut w, sink) = watcher(-1);
    w.on_applied_transaction(&applied(
        "dtrx",
        TransactionStatus::Executed,
        vec![action("alice", "cdeferred", "bob")],
    ));

    let mut onerror = applied("t2", TransactionStatus::Executed, vec![]);
    onerror.failed_dtrx_trace = Some(Box::new(applied("dtrx", TransactionStatus::HardFail, vec![])));
    w.on_applied_transaction(&onerror);

    w.on_accepted_block(&block(1, &["dtrx", "t2"])).unwrap();
    assert_eq!(sink.messages()[0]["transactions"], json!([]));
}

#[test]
fn blocks_older_than_age_limit_are_skipped() {
    let (mut w, sink) = watcher(30);
    w.on_applied_transaction(&applied(
        "t1",
        TransactionStatus::Executed,
        vec![action("alice", "transfer", "bob")],
    ));

    let mut old = block(2, &["t1"]);
    old.timestamp = Utc::now() - Duration::seconds(120);
    w.on_accepted_block(&old).unwrap();
    assert!(sink.messages().is_empty());
    // skipped blocks do not evict
    assert!(w.pending().contains(&TransactionId::new("t1")));

    w.on_accepted_block(&block(3, &["t1"])).unwrap();
    assert_eq!(sink.messages().len(), 1);
}

#[test]
fn irreversible_block_lists_every_transaction() {
    let (mut w, sink) = watcher(30);
    let mut b = block(7, &["t2", "t3"]);
    // irreversibility is never age gated
    b.timestamp = Utc::now() - Duration::days(1);
    w.on_irreversible_block(&b).unwrap();

    let msgs = sink.messages();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["msg_type"], 1);
    assert_eq!(msgs[0]["transactions"], json!(["t2", "t3"]));
    assert!(w.pending().is_empty());
}

#[test]
fn irreversible_block_resolves_packed_and_deferred_ids() {
    let (mut w, sink) = watcher(-1);
    let packed = PackedTransaction {
        signatures: vec![],
        packed_trx: b"abc".to_vec(),
    };
    let b = SignedBlock {
        block_num: 8,
        timestamp: Utc::now(),
        transactions: vec![
            TransactionRef::Deferred(TransactionId::new("t1")),
            TransactionRef::Packed(packed),
        ],
    };
    w.on_irreversible_block(&b).unwrap();

    assert_eq!(
        sink.messages()[0]["transactions"],
        json!(["t1", "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"])
    );
}

#[test]
fn uppercase_trace_id_matches_packed_reference() {
    let (mut w, sink) = watcher(-1);
    let applied: ChainEvent = serde_json::from_value(json!({
        "event": "applied_transaction",
        "data": {
            "id": "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD",
            "receipt": {"status": "executed"},
            "action_traces": [{
                "receiver": "alice",
                "act": {
                    "account": "alice",
                    "name": "transfer",
                    "authorization": [{"actor": "bob", "permission": "active"}],
                    "data": ""
                },
                "inline_traces": []
            }]
        }
    }))
    .unwrap();
    let accepted: ChainEvent = serde_json::from_value(json!({
        "event": "accepted_block",
        "data": {
            "block_num": 5,
            "timestamp": Utc::now().to_rfc3339(),
            "transactions": [{"type": "packed", "value": {"signatures": [], "packed_trx": "616263"}}]
        }
    }))
    .unwrap();

    w.dispatch(&applied).unwrap();
    w.dispatch(&accepted).unwrap();

    let msgs = sink.messages();
    assert_eq!(msgs[0]["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(
        msgs[0]["transactions"][0]["tx_id"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert!(w.pending().is_empty());
}

#[test]
fn packed_transactions_resolve_to_their_digest() {
    let (mut w, sink) = watcher(-1);
    let packed = PackedTransaction {
        signatures: vec![],
        packed_trx: b"abc".to_vec(),
    };
    let id = packed.id();
    w.on_applied_transaction(&applied(
        id.as_str(),
        TransactionStatus::Executed,
        vec![action("alice", "transfer", "bob")],
    ));

    let b = SignedBlock {
        block_num: 4,
        timestamp: Utc::now(),
        transactions: vec![TransactionRef::Packed(packed)],
    };
    w.on_accepted_block(&b).unwrap();
    assert_eq!(sink.messages()[0]["transactions"][0]["tx_id"], id.as_str());
}

#[tokio::test]
async fn run_drains_a_source_in_order() {
    let (mut w, sink) = watcher(-1);
    let events = vec![
        ChainEvent::AppliedTransaction(applied(
            "t1",
            TransactionStatus::Executed,
            vec![action("alice", "transfer", "bob")],
        )),
        ChainEvent::AcceptedBlock(block(1, &["t1"])),
        ChainEvent::IrreversibleBlock(block(1, &["t1"])),
    ];
    let handled = w.run(&mut IterSource::new(events)).await.unwrap();
    assert_eq!(handled, 3);

    let msgs = sink.messages();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0]["msg_type"], 0);
    assert_eq!(msgs[1]["msg_type"], 1);
}

#[tokio::test]
async fn run_stops_on_transport_failure() {
    struct Broken;
    impl MessageSink for Broken {
        fn send(&mut self, _frame: &[u8]) -> Result<(), TransportError> {
            Err(TransportError::Closed("consumer went away".into()))
        }
        fn endpoint(&self) -> &str {
            "broken"
        }
    }

    let mut w = WatcherBuilder::new().watch("alice").build(Box::new(Broken)).unwrap();
    let events = vec![
        ChainEvent::AcceptedBlock(block(1, &[])),
        ChainEvent::AcceptedBlock(block(2, &[])),
    ];
    let err = w.run(&mut IterSource::new(events)).await.unwrap_err();
    assert!(err.is_transport());
}
