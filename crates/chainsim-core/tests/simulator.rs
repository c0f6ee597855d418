//! Simulator-level behaviour: height bookkeeping, broadcast ordering,
//! subscription cleanup and the control surface.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainsim_core::{
    ControlError, ErrorConfig, Heights, MemorySink, NotificationKind, SimConfig, Simulator, Sink, SinkError,
    SinkId, SubscriptionId,
};

fn simulator() -> Arc<Simulator> {
    Arc::new(Simulator::new(&SimConfig::default()).unwrap())
}

fn sink() -> (Arc<MemorySink>, Arc<dyn Sink>) {
    let mem = Arc::new(MemorySink::new());
    let sink: Arc<dyn Sink> = mem.clone();
    (mem, sink)
}

#[test]
fn n_advances_move_height_by_n() {
    let sim = simulator();
    let chain = sim.chain("1").unwrap().clone();
    for _ in 0..99 {
        sim.advance(&chain).unwrap();
    }
    assert_eq!(chain.state().heights(), Heights { latest: 100, safe: 68, finalized: 36 });
}

#[test]
fn chains_advance_independently() {
    let sim = simulator();
    let eth = sim.chain("ethereum").unwrap().clone();
    sim.advance(&eth);
    assert_eq!(sim.chain("1").unwrap().state().height(), 2);
    assert_eq!(sim.chain("10").unwrap().state().height(), 1);
}

/// Appends `(sink, subscription)` for every frame to a log shared by
/// several sinks, so delivery order can be checked across all of them.
struct RecordingSink {
    id: SinkId,
    log: Arc<Mutex<Vec<(SinkId, String)>>>,
}

impl Sink for RecordingSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn write(&self, frame: &str) -> Result<(), SinkError> {
        let msg: serde_json::Value = serde_json::from_str(frame).unwrap();
        let sub = msg["params"]["subscription"].as_str().unwrap().to_string();
        self.log.lock().unwrap().push((self.id, sub));
        Ok(())
    }

    fn close(&self) {}
}

#[test]
fn advance_notifies_in_ascending_id_order() {
    let sim = simulator();
    let log = Arc::new(Mutex::new(Vec::new()));
    let recording = |log: &Arc<Mutex<Vec<(SinkId, String)>>>| -> Arc<dyn Sink> {
        Arc::new(RecordingSink { id: SinkId::next(), log: Arc::clone(log) })
    };
    let first = recording(&log);
    let other = recording(&log);
    for s in [&first, &other, &first] {
        sim.subscriptions().subscribe("1", NotificationKind::NewHeads, s);
    }
    let chain = sim.chain("1").unwrap().clone();
    sim.advance(&chain);

    let deliveries = log.lock().unwrap().clone();
    let expected = vec![
        (first.id(), "0x1".to_string()),
        (other.id(), "0x2".to_string()),
        (first.id(), "0x3".to_string()),
    ];
    assert_eq!(deliveries, expected);
}

#[test]
fn advance_at_max_height_is_a_noop() {
    let sim = simulator();
    sim.set_height("1", u64::MAX).unwrap();
    let chain = sim.chain("1").unwrap().clone();
    let (mem, sink) = sink();
    sim.subscriptions().subscribe("1", NotificationKind::NewHeads, &sink);

    assert_eq!(sim.advance(&chain), None);
    assert!(mem.frames().is_empty());
    assert_eq!(chain.state().height(), u64::MAX);
}

#[test]
fn reorg_broadcasts_lower_height_once() {
    let sim = simulator();
    sim.set_height("1", 100).unwrap();
    let (mem, sink) = sink();
    sim.subscriptions().subscribe("1", NotificationKind::NewHeads, &sink);

    assert_eq!(sim.reorg("1", 10).unwrap(), Some(90));
    let msgs = mem.messages();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["params"]["result"]["number"], "0x5a");
    assert_eq!(sim.chain("1").unwrap().state().heights(), Heights::at(90));

    mem.clear();
    assert_eq!(sim.reorg("1", 150).unwrap(), None);
    assert!(mem.frames().is_empty());
    assert_eq!(sim.chain("1").unwrap().state().height(), 90);
}

#[test]
fn cleanup_sink_stops_delivery() {
    let sim = simulator();
    let (mem, sink) = sink();
    for kind in [NotificationKind::NewHeads, NotificationKind::Logs] {
        sim.subscriptions().subscribe("1", kind, &sink);
    }
    sim.subscriptions().subscribe("501", NotificationKind::SlotNotification, &sink);

    assert_eq!(sim.subscriptions().cleanup_sink(sink.id()), 3);
    sim.set_height("1", 50).unwrap();
    assert!(mem.frames().is_empty());
}

#[test]
fn unsubscribe_succeeds_once() {
    let sim = simulator();
    let (_mem, sink) = sink();
    let id = sim.subscriptions().subscribe("1", NotificationKind::NewHeads, &sink);
    assert!(sim.subscriptions().unsubscribe(id).is_ok());
    assert!(sim.subscriptions().unsubscribe(id).is_err());
    assert!(sim.subscriptions().unsubscribe(SubscriptionId(999)).is_err());
}

#[test]
fn interrupt_wins_over_resume() {
    let sim = simulator();
    let chain = sim.chain("1").unwrap().clone();
    sim.pause("1").unwrap();
    sim.interrupt("1").unwrap();
    sim.resume("1").unwrap();
    assert_eq!(sim.advance(&chain), None);
    sim.resume_from_interrupt("1").unwrap();
    assert_eq!(sim.advance(&chain), Some(2));
}

#[test]
fn pause_all_with_empty_selector() {
    let sim = simulator();
    assert_eq!(sim.pause("").unwrap(), 15);
    assert!(sim.chains().iter().all(|c| c.state().is_paused()));
    sim.resume("").unwrap();
    assert!(sim.chains().iter().all(|c| !c.state().is_paused()));
}

#[test]
fn control_validation_errors() {
    let sim = simulator();
    assert!(matches!(sim.pause("nope"), Err(ControlError::UnknownChain(_))));
    assert!(matches!(sim.set_interval("1", Duration::ZERO), Err(ControlError::InvalidInterval)));
    assert!(matches!(sim.set_error_probability("1", 1.5), Err(ControlError::InvalidProbability(_))));
    assert!(matches!(sim.add_error_preset("1", "nope", 0.1), Err(ControlError::UnknownPreset(_))));
    assert!(matches!(
        sim.remove_error("1", 0),
        Err(ControlError::IndexOutOfRange { index: 0, len: 0 })
    ));
    assert!(matches!(sim.set_custom_response("1", "{", vec![]), Err(ControlError::InvalidCustomResponse(_))));
}

#[test]
fn error_list_editing() {
    let sim = simulator();
    sim.add_error("1", ErrorConfig::new(-32001, "a", 0.1)).unwrap();
    sim.add_error_preset("1", "nonce_too_low", 0.2).unwrap();
    let listed = sim.list_errors("1").unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].message, "nonce too low");

    assert_eq!(sim.remove_error("1", 0).unwrap().message, "a");
    sim.clear_errors("1").unwrap();
    assert!(sim.list_errors("1").unwrap().is_empty());
}

#[test]
fn drop_all_closes_subscriber_sinks() {
    let sim = simulator();
    let (mem, sink) = sink();
    sim.subscriptions().subscribe("1", NotificationKind::NewHeads, &sink);
    sim.subscriptions().subscribe("501", NotificationKind::RootNotification, &sink);
    assert_eq!(sim.drop_all(), 2);
    assert!(mem.is_closed());
    assert!(sim.subscriptions().is_empty());
}

#[test]
fn logs_per_block_skips_solana() {
    let sim = simulator();
    assert_eq!(sim.set_logs_per_block("", 2).unwrap(), 14);
    assert_eq!(sim.set_logs_per_block("501", 2).unwrap(), 0);
    assert_eq!(sim.chain("1").unwrap().as_evm().unwrap().logs_per_block(), 2);
}

#[test]
fn export_reflects_live_state() {
    let sim = simulator();
    sim.set_height("8453", 1234).unwrap();
    sim.set_interval("501", Duration::from_millis(200)).unwrap();
    sim.add_error_preset("8453", "limit_exceeded", 0.5).unwrap();

    let exported = sim.export_config();
    let base = &exported.evm_chains["base"];
    assert_eq!(base.initial_height, 1234);
    assert_eq!(base.error_configs.len(), 1);
    assert_eq!(exported.solana.as_ref().unwrap().slot_interval_ms, 200);

    let reloaded = SimConfig::from_yaml(&exported.to_yaml().unwrap()).unwrap();
    assert_eq!(reloaded, exported);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_clocks() {
    let sim = simulator();
    let handles = sim.start();
    tokio::time::sleep(Duration::from_millis(500)).await;
    sim.shutdown();
    for handle in handles {
        handle.await.unwrap();
    }
    let arbitrum = sim.chain("42161").unwrap().state().height();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(sim.chain("42161").unwrap().state().height(), arbitrum);
}
