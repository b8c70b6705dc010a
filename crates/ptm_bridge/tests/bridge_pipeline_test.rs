use async_trait::async_trait;
use common::domain::{
    DomainResult, InboundEvent, ModuleIdentity, OutputMessage, OutputSink, DEVICE_TOPIC_FILTER,
    LEAF_DEVICE_ID_PROPERTY, MODULE_ID_PROPERTY,
};
use common::mqtt::{MqttConnectionConfig, MqttSubscriberConfig};
use ptm_bridge::{BridgeTranslator, PtmBridge, PtmBridgeConfig};
use ptm_runner::Runner;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sink that records every delivery for inspection
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(OutputMessage, String)>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<(OutputMessage, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutputSink for RecordingSink {
    async fn send_to_output(&self, message: &OutputMessage, output_name: &str) -> DomainResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), output_name.to_string()));
        Ok(())
    }
}

async fn run_events(events: Vec<InboundEvent>) -> Vec<(OutputMessage, String)> {
    let sink = Arc::new(RecordingSink::default());
    let translator = BridgeTranslator::new(sink.clone(), ModuleIdentity::new("ptm-module").unwrap());

    let (tx, rx) = mpsc::channel(16);
    for event in events {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    translator.run(CancellationToken::new(), rx).await.unwrap();
    sink.sent()
}

#[tokio::test]
async fn test_well_formed_message_is_forwarded_with_metadata() {
    let sent = run_events(vec![InboundEvent::new(
        "device/client0/message",
        &br#"{"param1": 42, "param2": 0.5}"#[..],
    )])
    .await;

    assert_eq!(sent.len(), 1);
    let (message, output_name) = &sent[0];
    assert_eq!(output_name, "ptm_output");

    let body: serde_json::Value = serde_json::from_slice(&message.body).unwrap();
    assert_eq!(
        body,
        json!({
            "topic": "device/client0/message",
            "payload": {"param1": 42, "param2": 0.5}
        })
    );
    assert_eq!(message.property(LEAF_DEVICE_ID_PROPERTY), Some("client0"));
    assert_eq!(message.property(MODULE_ID_PROPERTY), Some("ptm-module"));
}

#[tokio::test]
async fn test_malformed_events_are_dropped_and_processing_continues() {
    let sent = run_events(vec![
        InboundEvent::new("bad-topic", &br#"{"param1": 1}"#[..]),
        InboundEvent::new("device/client0/message", &b"not-json"[..]),
        InboundEvent::new("device/client1/message", &br#"{"param1": 2}"#[..]),
    ])
    .await;

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.property(LEAF_DEVICE_ID_PROPERTY), Some("client1"));
}

#[tokio::test]
async fn test_module_id_is_constant_across_events() {
    let events = (0..5)
        .map(|i| InboundEvent::new(format!("device/dev{}/message", i), format!("{{\"n\": {}}}", i)))
        .collect();

    let sent = run_events(events).await;

    assert_eq!(sent.len(), 5);
    for (i, (message, _)) in sent.iter().enumerate() {
        assert_eq!(message.property(MODULE_ID_PROPERTY), Some("ptm-module"));
        assert_eq!(message.property(LEAF_DEVICE_ID_PROPERTY), Some(format!("dev{}", i).as_str()));
    }
}

#[tokio::test]
async fn test_bridge_processes_stop_on_shutdown_without_broker() {
    let config = PtmBridgeConfig {
        subscriber: MqttSubscriberConfig {
            connection: MqttConnectionConfig::new("ptm-test", "127.0.0.1", 1),
            topic_filter: DEVICE_TOPIC_FILTER.to_string(),
            reconnect_delay: Duration::from_millis(20),
        },
        channel_capacity: 8,
    };
    let bridge = PtmBridge::new(
        config,
        Arc::new(RecordingSink::default()),
        ModuleIdentity::new("ptm-module").unwrap(),
    );

    let token = CancellationToken::new();
    let mut runner = Runner::new().with_cancellation_token(token.clone());
    for (name, process) in bridge.into_runner_processes() {
        runner = runner.with_boxed_process(name, process);
    }

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), runner.run()).await;

    assert!(matches!(result, Ok(Ok(()))));
}
