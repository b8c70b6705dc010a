use crate::domain::{DomainError, InboundEvent};
use crate::mqtt::{MqttConnectionConfig, MqttSession, SessionAction};
use rumqttc::{AsyncClient, Event, Packet, Publish, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Capacity of the rumqttc request channel between client and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct MqttSubscriberConfig {
    pub connection: MqttConnectionConfig,
    pub topic_filter: String,
    /// Pause before polling the event loop again after a transport error
    pub reconnect_delay: Duration,
}

/// Transport adapter that turns broker PUBLISH packets into [`InboundEvent`]s.
///
/// Drives the rumqttc event loop on a single task, re-subscribes after every
/// (re)connect and pushes events into a single-consumer channel.
pub struct MqttSubscriber {
    config: MqttSubscriberConfig,
    events_tx: mpsc::Sender<InboundEvent>,
}

impl MqttSubscriber {
    pub fn new(config: MqttSubscriberConfig, events_tx: mpsc::Sender<InboundEvent>) -> Self {
        Self { config, events_tx }
    }

    /// Run until cancelled or until the consumer side of the channel is dropped
    #[instrument(
        name = "mqtt_subscriber",
        skip_all,
        fields(
            client_id = %self.config.connection.client_id,
            host = %self.config.connection.host,
            port = self.config.connection.port,
        )
    )]
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let options = self.config.connection.to_mqtt_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let mut session = MqttSession::subscribing(&self.config.topic_filter);

        info!(topic_filter = %self.config.topic_filter, "starting MQTT subscriber");

        loop {
            let event = tokio::select! {
                _ = ctx.cancelled() => {
                    debug!("shutdown signal received");
                    let _ = client.try_disconnect();
                    break;
                }
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if let Some(action) = session.on_connack(ack.code) {
                        apply_action(&client, action)?;
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    session.on_suback(&ack);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let event = inbound_event(publish);
                    debug!(
                        topic = %event.topic,
                        payload_size = event.payload.len(),
                        "received MQTT publish"
                    );

                    let sent = tokio::select! {
                        _ = ctx.cancelled() => break,
                        sent = self.events_tx.send(event) => sent,
                    };
                    if sent.is_err() {
                        info!("event consumer closed, stopping MQTT subscriber");
                        let _ = client.try_disconnect();
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    session.on_disconnect();
                }
                Ok(_) => {}
                Err(e) => {
                    session.on_disconnect();
                    error!(
                        error = %e,
                        retry_in = ?self.config.reconnect_delay,
                        "MQTT connection error"
                    );

                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                    }
                }
            }
        }

        info!("MQTT subscriber stopped");
        Ok(())
    }
}

fn apply_action(client: &AsyncClient, action: SessionAction) -> Result<(), DomainError> {
    match action {
        SessionAction::Subscribe(filter) => {
            // The event loop runs on this task, so a blocking subscribe would never be polled
            client
                .try_subscribe(&filter, QoS::AtLeastOnce)
                .map_err(|e| {
                    DomainError::TransportError(anyhow::anyhow!(
                        "Failed to subscribe to {}: {}",
                        filter,
                        e
                    ))
                })?;
            info!(topic_filter = %filter, "subscribing to MQTT topic");
            Ok(())
        }
    }
}

fn inbound_event(publish: Publish) -> InboundEvent {
    InboundEvent::new(publish.topic, publish.payload)
}
