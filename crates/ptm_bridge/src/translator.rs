use common::domain::{
    decode_payload, DeviceId, DomainResult, InboundEvent, ModuleIdentity, OutboundEnvelope,
    OutputMessage, OutputSink, PTM_OUTPUT_NAME,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// What happened to a single inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Exactly one message was handed to the output sink
    Forwarded,
    /// Malformed topic or payload; nothing was sent
    Dropped,
    /// The sink rejected the message; it is not retried
    SendFailed,
}

/// Converts inbound device publishes into enriched messages on `ptm_output`.
///
/// Stateless per event: the only shared state is the module identity captured
/// at construction.
pub struct BridgeTranslator {
    sink: Arc<dyn OutputSink>,
    identity: ModuleIdentity,
}

impl BridgeTranslator {
    pub fn new(sink: Arc<dyn OutputSink>, identity: ModuleIdentity) -> Self {
        Self { sink, identity }
    }

    /// Extract the device ID and decode the payload into an envelope
    pub fn translate(&self, event: &InboundEvent) -> DomainResult<(DeviceId, OutboundEnvelope)> {
        let device_id = DeviceId::from_topic(&event.topic)?;
        let payload = decode_payload(&event.payload)?;

        Ok((
            device_id,
            OutboundEnvelope {
                topic: event.topic.clone(),
                payload,
            },
        ))
    }

    /// Serialize the envelope, attach `leafdeviceid`/`moduleid` and send it to `ptm_output`
    pub async fn forward(&self, device_id: &DeviceId, envelope: &OutboundEnvelope) -> DomainResult<()> {
        let message = OutputMessage::new(envelope.to_bytes()?).with_identity(device_id, &self.identity);

        debug!(
            output = PTM_OUTPUT_NAME,
            size_bytes = message.body.len(),
            "forwarding envelope"
        );

        self.sink.send_to_output(&message, PTM_OUTPUT_NAME).await
    }

    /// Handle one inbound event. Failures are logged and never propagate, so a
    /// bad event cannot stop the consumer loop.
    ///
    /// Creates a new independent trace for each message.
    pub async fn handle_message(&self, event: &InboundEvent) -> MessageOutcome {
        let span = info_span!(
            parent: Span::none(),
            "mqtt_message",
            topic = %event.topic,
            payload_size = event.payload.len(),
            received_at = %event.received_at,
            device_id = tracing::field::Empty,
        );

        async {
            info!("received MQTT message");

            let (device_id, envelope) = match self.translate(event) {
                Ok(translated) => translated,
                Err(e) => {
                    warn!(error = %e, "dropping MQTT message");
                    return MessageOutcome::Dropped;
                }
            };

            Span::current().record("device_id", device_id.as_str());
            debug!(device_id = %device_id, "parsed device message");

            match self.forward(&device_id, &envelope).await {
                Ok(()) => {
                    debug!(output = PTM_OUTPUT_NAME, "message forwarded");
                    MessageOutcome::Forwarded
                }
                Err(e) => {
                    error!(
                        error = %e,
                        output = PTM_OUTPUT_NAME,
                        "failed to forward message, message lost"
                    );
                    MessageOutcome::SendFailed
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Consume events one at a time until cancelled or the producer side closes
    pub async fn run(
        &self,
        ctx: CancellationToken,
        mut events_rx: mpsc::Receiver<InboundEvent>,
    ) -> anyhow::Result<()> {
        info!(module_id = %self.identity, output = PTM_OUTPUT_NAME, "bridge translator started");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    debug!("shutdown signal received");
                    break;
                }
                event = events_rx.recv() => match event {
                    Some(event) => {
                        self.handle_message(&event).await;
                    }
                    None => {
                        info!("event channel closed");
                        break;
                    }
                }
            }
        }

        info!("bridge translator stopped");
        Ok(())
    }
}
