use crate::translator::BridgeTranslator;
use common::domain::{InboundEvent, ModuleIdentity, OutputSink};
use common::mqtt::{MqttSubscriber, MqttSubscriberConfig};
use ptm_runner::{AppProcess, BoxedTask};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct PtmBridgeConfig {
    pub subscriber: MqttSubscriberConfig,
    /// Inbound events buffered between the MQTT event loop and the translator
    pub channel_capacity: usize,
}

/// Transport adapter and translator joined by a single-consumer channel
pub struct PtmBridge {
    subscriber: MqttSubscriber,
    translator: BridgeTranslator,
    events_rx: mpsc::Receiver<InboundEvent>,
}

impl PtmBridge {
    pub fn new(config: PtmBridgeConfig, sink: Arc<dyn OutputSink>, identity: ModuleIdentity) -> Self {
        debug!(
            topic_filter = %config.subscriber.topic_filter,
            channel_capacity = config.channel_capacity,
            "initializing PTM bridge"
        );

        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity.max(1));

        Self {
            subscriber: MqttSubscriber::new(config.subscriber, events_tx),
            translator: BridgeTranslator::new(sink, identity),
            events_rx,
        }
    }

    /// The MQTT subscriber and the translator loop, named for the runner
    pub fn into_runner_processes(self) -> Vec<(&'static str, AppProcess)> {
        let subscriber = self.subscriber;
        let translator = self.translator;
        let events_rx = self.events_rx;

        let subscriber_process: AppProcess =
            Box::new(move |ctx: CancellationToken| -> BoxedTask {
                Box::pin(async move { subscriber.run(ctx).await })
            });
        let translator_process: AppProcess =
            Box::new(move |ctx: CancellationToken| -> BoxedTask {
                Box::pin(async move { translator.run(ctx, events_rx).await })
            });

        vec![
            ("mqtt_subscriber", subscriber_process),
            ("bridge_translator", translator_process),
        ]
    }
}
