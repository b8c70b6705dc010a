//! Output sink backed by the IoT Edge hub's MQTT endpoint.
//!
//! A module sends to a named output by publishing to
//! `devices/{device_id}/modules/{module_id}/messages/events/` followed by a
//! URL-encoded property bag. The output name travels as the `$.on` system
//! property and every message property is appended as `key=value`.

use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, OutputMessage, OutputSink};
use common::mqtt::{MqttConnectionConfig, MqttSession};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// RFC 3986 unreserved characters stay readable in the property bag
const PROPERTY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// System property naming the output a module message is routed to
const OUTPUT_NAME_SYSTEM_PROPERTY: &str = "$.on";

const REQUEST_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct EdgeHubSinkConfig {
    pub connection: MqttConnectionConfig,
    /// Edge device the module runs on (`IOTEDGE_DEVICEID`)
    pub device_id: String,
    /// Module sending the messages (`IOTEDGE_MODULEID`)
    pub module_id: String,
    pub reconnect_delay: Duration,
}

/// Fire-and-forget sink: a send succeeds once rumqttc has queued the publish
pub struct EdgeHubOutputSink {
    client: AsyncClient,
    events_topic: String,
}

/// Drives the sink's MQTT event loop; must run for queued messages to leave the process
pub struct EdgeHubConnection {
    client: AsyncClient,
    eventloop: EventLoop,
    reconnect_delay: Duration,
}

impl EdgeHubOutputSink {
    pub fn new(config: &EdgeHubSinkConfig) -> DomainResult<(Self, EdgeHubConnection)> {
        let options = config.connection.to_mqtt_options()?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let events_topic = format!(
            "devices/{}/modules/{}/messages/events/",
            config.device_id, config.module_id
        );

        info!(
            host = %config.connection.host,
            port = config.connection.port,
            events_topic = %events_topic,
            "created edge hub output sink"
        );

        let sink = Self {
            client: client.clone(),
            events_topic,
        };
        let connection = EdgeHubConnection {
            client,
            eventloop,
            reconnect_delay: config.reconnect_delay,
        };

        Ok((sink, connection))
    }

    fn topic_for(&self, message: &OutputMessage, output_name: &str) -> String {
        output_topic(&self.events_topic, message, output_name)
    }
}

#[async_trait]
impl OutputSink for EdgeHubOutputSink {
    async fn send_to_output(&self, message: &OutputMessage, output_name: &str) -> DomainResult<()> {
        let topic = self.topic_for(message, output_name);

        self.client
            .publish(&topic, QoS::AtLeastOnce, false, message.body.to_vec())
            .await
            .map_err(|e| DomainError::OutputSendFailed {
                output: output_name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            topic = %topic,
            size_bytes = message.body.len(),
            "queued message for edge hub"
        );

        Ok(())
    }
}

impl EdgeHubConnection {
    #[instrument(name = "edge_hub_connection", skip_all)]
    pub async fn run(mut self, ctx: CancellationToken) -> anyhow::Result<()> {
        let mut session = MqttSession::publish_only();

        loop {
            let event = tokio::select! {
                _ = ctx.cancelled() => {
                    debug!("shutdown signal received");
                    let _ = self.client.try_disconnect();
                    break;
                }
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    session.on_connack(ack.code);
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    debug!(pkid = ack.pkid, "edge hub acknowledged message");
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    session.on_disconnect();
                }
                Ok(_) => {}
                Err(e) => {
                    session.on_disconnect();
                    error!(
                        error = %e,
                        retry_in = ?self.reconnect_delay,
                        "edge hub connection error"
                    );

                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }

        info!("edge hub connection stopped");
        Ok(())
    }
}

/// Build the events topic with the output name and message properties appended
fn output_topic(events_topic: &str, message: &OutputMessage, output_name: &str) -> String {
    let mut topic = format!(
        "{}{}={}",
        events_topic,
        OUTPUT_NAME_SYSTEM_PROPERTY,
        utf8_percent_encode(output_name, PROPERTY_ENCODE_SET)
    );

    for (key, value) in &message.properties {
        topic.push('&');
        topic.push_str(&utf8_percent_encode(key, PROPERTY_ENCODE_SET).to_string());
        topic.push('=');
        topic.push_str(&utf8_percent_encode(value, PROPERTY_ENCODE_SET).to_string());
    }

    topic
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::PTM_OUTPUT_NAME;

    fn test_config() -> EdgeHubSinkConfig {
        EdgeHubSinkConfig {
            connection: MqttConnectionConfig::new("edge-device/ptm", "127.0.0.1", 1),
            device_id: "edge-device".to_string(),
            module_id: "ptm".to_string(),
            reconnect_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_output_topic_carries_output_and_properties() {
        let message = OutputMessage::new(&b"{}"[..])
            .with_property("leafdeviceid", "client0")
            .with_property("moduleid", "ptm");

        let topic = output_topic(
            "devices/edge-device/modules/ptm/messages/events/",
            &message,
            PTM_OUTPUT_NAME,
        );

        assert_eq!(
            topic,
            "devices/edge-device/modules/ptm/messages/events/$.on=ptm_output&leafdeviceid=client0&moduleid=ptm"
        );
    }

    #[test]
    fn test_output_topic_encodes_reserved_characters() {
        let message = OutputMessage::new(&b"{}"[..]).with_property("leafdeviceid", "a&b=c/d");

        let topic = output_topic("base/", &message, "out");

        assert_eq!(topic, "base/$.on=out&leafdeviceid=a%26b%3Dc%2Fd");
    }

    #[tokio::test]
    async fn test_send_queues_publish() {
        let (sink, _connection) = EdgeHubOutputSink::new(&test_config()).unwrap();
        let message = OutputMessage::new(&b"{\"a\":1}"[..]).with_property("moduleid", "ptm");

        let result = sink.send_to_output(&message, PTM_OUTPUT_NAME).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_fails_when_connection_is_gone() {
        let (sink, connection) = EdgeHubOutputSink::new(&test_config()).unwrap();
        drop(connection);

        let result = sink
            .send_to_output(&OutputMessage::new(&b"{}"[..]), PTM_OUTPUT_NAME)
            .await;

        assert!(matches!(
            result,
            Err(DomainError::OutputSendFailed { output, .. }) if output == PTM_OUTPUT_NAME
        ));
    }

    #[tokio::test]
    async fn test_connection_stops_on_cancellation() {
        let (_sink, connection) = EdgeHubOutputSink::new(&test_config()).unwrap();
        let ctx = CancellationToken::new();
        ctx.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), connection.run(ctx)).await;

        assert!(matches!(result, Ok(Ok(()))));
    }
}
