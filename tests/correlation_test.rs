//! Correlation scenarios, driven through the public engine API.

use serde_json::Map;
use std::thread;
use std::time::Duration;

use txbridge::channel::{notification_channel, NotificationSender};
use txbridge::client::DeployRequest;
use txbridge::config::WorkflowConfig;
use txbridge::engine::{
    AuditLogPlan, CorrelationEngine, CorrelationState, DropReason, EngineError, Handled,
};
use txbridge::envelope::Envelope;
use txbridge::lifecycle::{Shutdown, ShutdownCoordinator};
use txbridge::subscriber::StreamSubscriber;

mod common;
use common::{Call, FeedMode, MockFeed, RecordingClient};

fn envelope(frame: serde_json::Value) -> Envelope {
    Envelope::from_value(frame).unwrap()
}

fn plan() -> AuditLogPlan {
    AuditLogPlan::new(&WorkflowConfig::default(), "0xsource", "0xaudit")
}

fn deploy_request(label: &str) -> DeployRequest {
    DeployRequest {
        label: label.to_string(),
        contract_name: label.to_string(),
        source_path: None,
        inputs: Map::new(),
    }
}

fn engine(
    keys: &[&str],
    rounds: u64,
) -> (CorrelationEngine<RecordingClient>, NotificationSender, Shutdown) {
    let (tx, rx) = notification_channel();
    let shutdown = Shutdown::new();
    let engine = CorrelationEngine::new(
        RecordingClient::new(keys),
        rx,
        shutdown.clone(),
        common::engine_config(rounds),
    );
    (engine, tx, shutdown)
}

#[test]
fn test_match_triggers_one_dependent_action() {
    let (mut engine, tx, _shutdown) = engine(&["tx1", "f1"], 1);
    let mut plan = plan();

    engine.step(&mut plan).unwrap();
    tx.push(envelope(common::event_frame("tx1", "ContractIncremented"))).unwrap();

    let report = engine.run(&mut plan).unwrap();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].key.as_str(), "tx1");
    assert_eq!(report.matches[0].follow_up.as_str(), "f1");
    assert_eq!(engine.state(), CorrelationState::Idle);

    let invokes = engine.client().invokes();
    assert_eq!(invokes.len(), 2);
    assert_eq!(invokes[0].method, "setContractInformation");
    assert_eq!(invokes[1].method, "addAuditLog");
    assert_eq!(invokes[1].target, "0xaudit");
    assert_eq!(invokes[1].params["_newNote"], "NewNote1580000000");
    assert_eq!(invokes[1].params["_changedBy"], "0xabc");
    assert_eq!(invokes[1].params["_incrementValue"], 42);
    assert_eq!(invokes[1].params["_timestamp"], 1_580_000_000);
}

#[test]
fn test_stale_key_leaves_engine_waiting() {
    let (mut engine, tx, _shutdown) = engine(&["tx1"], 1);
    let mut plan = plan();

    engine.step(&mut plan).unwrap();
    tx.push(envelope(common::event_frame("tx0", "ContractIncremented"))).unwrap();

    let outcome = engine.step(&mut plan).unwrap();
    assert_eq!(outcome.handled, Handled::Dropped(DropReason::UnknownKey));
    assert_eq!(engine.state(), CorrelationState::AwaitingMatch(vec!["tx1".into()]));
    assert_eq!(engine.client().invokes().len(), 1);
}

#[test]
fn test_deployment_confirmations_in_reverse_order() {
    let (mut engine, tx, _shutdown) = engine(&["d1", "d2"], 1);
    tx.push(envelope(common::deployment_frame("d2", "0xaudit"))).unwrap();
    tx.push(envelope(common::deployment_frame("d1", "0xsource"))).unwrap();

    let deployments = engine
        .deploy(&[deploy_request("source"), deploy_request("audit")])
        .unwrap();

    assert_eq!(deployments.len(), 2);
    assert_eq!(deployments[0].target.as_deref(), Some("0xsource"));
    assert_eq!(deployments[1].target.as_deref(), Some("0xaudit"));
}

#[test]
fn test_deployment_phase_drops_everything_else() {
    let (mut engine, tx, _shutdown) = engine(&["d1"], 1);
    tx.push(envelope(common::event_frame("d1", "ContractIncremented"))).unwrap();
    tx.push(envelope(serde_json::json!({"type": "gasprice", "value": 3}))).unwrap();
    tx.push(envelope(common::deployment_frame("dX", "0xother"))).unwrap();
    tx.push(envelope(common::deployment_frame("d1", "0xsource"))).unwrap();

    let deployments = engine.deploy(&[deploy_request("source")]).unwrap();
    assert_eq!(deployments[0].key.as_str(), "d1");
    assert_eq!(engine.client().calls().len(), 1);
    assert!(matches!(engine.client().calls()[0], Call::Deploy(_)));
}

#[test]
fn test_key_matched_at_most_once() {
    let (mut engine, tx, _shutdown) = engine_with_pending("tx1", "f1");
    let mut plan = plan();
    tx.push(envelope(common::event_frame("tx1", "ContractIncremented"))).unwrap();
    tx.push(envelope(common::event_frame("tx1", "ContractIncremented"))).unwrap();

    assert!(matches!(engine.step(&mut plan).unwrap().handled, Handled::Matched { .. }));
    assert_eq!(
        engine.step(&mut plan).unwrap().handled,
        Handled::Dropped(DropReason::AlreadyConsumed)
    );
    assert_eq!(engine.client().invokes().len(), 2);
    assert_eq!(engine.completed(), 1);
}

/// Engine with one submitted action `key` whose follow-up will get `follow_up`.
fn engine_with_pending(
    key: &str,
    follow_up: &str,
) -> (CorrelationEngine<RecordingClient>, NotificationSender, Shutdown) {
    let (mut engine, tx, shutdown) = engine(&[key, follow_up], 1);
    engine.step(&mut plan()).unwrap();
    (engine, tx, shutdown)
}

#[test]
fn test_wrong_event_and_unrecognized_are_dropped() {
    let (mut engine, tx, _shutdown) = engine_with_pending("tx1", "f1");
    let mut plan = plan();

    tx.push(envelope(common::event_frame("tx1", "OtherEvent"))).unwrap();
    tx.push(envelope(serde_json::json!({"type": "gasprice"}))).unwrap();
    tx.push(envelope(common::deployment_frame("tx1", "0x1"))).unwrap();

    assert_eq!(engine.step(&mut plan).unwrap().handled, Handled::Dropped(DropReason::WrongKind));
    assert_eq!(engine.step(&mut plan).unwrap().handled, Handled::Dropped(DropReason::Unrecognized));
    assert_eq!(engine.step(&mut plan).unwrap().handled, Handled::Dropped(DropReason::WrongKind));
    assert_eq!(engine.state(), CorrelationState::AwaitingMatch(vec!["tx1".into()]));
}

#[test]
fn test_interrupt_before_match_performs_no_dependent_action() {
    let (mut engine, tx, shutdown) = engine_with_pending("tx1", "f1");

    // The confirmation is queued, but shutdown wins at the next wait return.
    tx.push(envelope(common::event_frame("tx1", "ContractIncremented"))).unwrap();
    shutdown.trigger();

    let err = engine.run(&mut plan()).unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(engine.client().invokes().len(), 1);
    assert_eq!(engine.completed(), 0);
}

#[test]
fn test_action_error_propagates() {
    let (mut engine, _tx, _shutdown) = engine(&[], 1);
    let err = engine.step(&mut plan()).unwrap_err();
    assert!(matches!(err, EngineError::Action(_)));
}

#[test]
fn test_end_to_end_over_websocket() {
    let feed = MockFeed::start(FeedMode::Ack);
    let handle = feed.handle();

    let shutdown = Shutdown::new();
    let (tx, rx) = notification_channel();
    let subscriber = StreamSubscriber::new(common::stream_config(&feed.url), tx, shutdown.clone())
        .with_read_key("read-key");
    let coordinator = ShutdownCoordinator::start(subscriber, shutdown.clone()).unwrap();

    let client = RecordingClient::new(&["d1", "d2", "tx1", "f1", "tx2", "f2"]).on_submit(
        move |call, key| match call {
            Call::Deploy(request) => {
                handle.send(common::deployment_frame(key.as_str(), &format!("0x{}", request.label)))
            }
            Call::Invoke(request) if request.method == "setContractInformation" => {
                handle.send_raw("not json");
                handle.send(serde_json::json!({"type": "heartbeat"}));
                handle.send(common::event_frame(key.as_str(), "ContractIncremented"))
            }
            Call::Invoke(_) => {}
        },
    );
    let mut engine = CorrelationEngine::new(client, rx, shutdown.clone(), common::engine_config(2));
    assert!(feed.wait_for(|v| v["command"] == "register" && v["key"] == "read-key", Duration::from_secs(5)));

    let deployments = engine
        .deploy(&[deploy_request("source"), deploy_request("audit")])
        .unwrap();
    let mut plan = AuditLogPlan::new(
        &WorkflowConfig::default(),
        deployments[0].require_target().unwrap(),
        deployments[1].require_target().unwrap(),
    );
    let report = engine.run(&mut plan).unwrap();

    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.matches[1].follow_up.as_str(), "f2");
    let invokes = engine.client().invokes();
    assert_eq!(invokes.len(), 4);
    assert_eq!(invokes[0].target, "0xsource");
    assert_eq!(invokes[1].target, "0xaudit");

    assert!(feed.wait_for(|v| v["command"] == "heartbeat" && v["sessionID"] == "session-1", Duration::from_secs(5)));

    coordinator.shutdown(Duration::from_secs(5)).unwrap();
    assert!(shutdown.is_triggered());
}

#[test]
fn test_shutdown_mid_loop_joins_subscriber() {
    let feed = MockFeed::start(FeedMode::Ack);
    let shutdown = Shutdown::new();
    let (tx, rx) = notification_channel();
    let subscriber = StreamSubscriber::new(common::stream_config(&feed.url), tx, shutdown.clone())
        .with_read_key("read-key");
    let coordinator = ShutdownCoordinator::start(subscriber, shutdown.clone()).unwrap();

    let mut engine = CorrelationEngine::new(
        RecordingClient::new(&["tx1", "f1"]),
        rx,
        shutdown.clone(),
        common::engine_config(1),
    );

    let trigger = shutdown.clone();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        trigger.trigger();
    });

    let err = engine.run(&mut plan()).unwrap_err();
    stopper.join().unwrap();

    assert!(err.is_interrupted());
    assert_eq!(engine.client().invokes().len(), 1);
    assert!(matches!(engine.state(), CorrelationState::AwaitingMatch(_)));

    coordinator.join(Duration::from_secs(5)).unwrap();
    drop(feed);
}
