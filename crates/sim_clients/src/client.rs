use crate::reading::TelemetryReading;
use common::mqtt::{MqttConnectionConfig, MqttSession};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, Instrument};

/// Pause before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SimulatedClientConfig {
    pub connection: MqttConnectionConfig,
    /// Time between two readings from this client
    pub interval: Duration,
}

/// Topic a simulated device publishes its readings to
pub fn device_topic(client_id: &str) -> String {
    format!("device/{}/message", client_id)
}

/// Run one simulated device until cancelled.
///
/// The event loop runs in its own task so a connect or TLS handshake that
/// outlasts the publish interval is never interrupted by a tick. The publish
/// timer only reads the connected flag it maintains.
#[instrument(name = "simulated_client", skip_all, fields(client_id = %config.connection.client_id))]
pub async fn run_simulated_client(
    ctx: CancellationToken,
    config: SimulatedClientConfig,
) -> anyhow::Result<()> {
    let client_id = config.connection.client_id.clone();
    let topic = device_topic(&client_id);
    let options = config.connection.to_mqtt_options()?;
    let (client, eventloop) = AsyncClient::new(options, 10);
    let (connected_tx, connected_rx) = watch::channel(false);

    info!("creating client");

    let network = tokio::spawn(
        drive_event_loop(ctx.clone(), eventloop, connected_tx).in_current_span(),
    );

    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.try_disconnect();
                break;
            }
            _ = ticker.tick() => {
                if !*connected_rx.borrow() {
                    error!("{} is not connected to the broker!", client_id);
                    continue;
                }

                let reading = TelemetryReading::generate(&mut rand::thread_rng());
                let payload = match reading.to_json() {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(error = %e, "failed to serialize reading");
                        continue;
                    }
                };

                match client.try_publish(&topic, QoS::AtMostOnce, false, payload.clone()) {
                    Ok(()) => info!(topic = %topic, payload = %payload, "message sent"),
                    Err(e) => error!(topic = %topic, error = %e, "failed to publish message"),
                }
            }
        }
    }

    if let Err(e) = network.await {
        error!(error = %e, "event loop task failed");
    }

    info!("client stopped");
    Ok(())
}

/// Poll the client's event loop until cancelled, publishing the session's
/// connected state on every transition.
async fn drive_event_loop(
    ctx: CancellationToken,
    mut eventloop: EventLoop,
    connected_tx: watch::Sender<bool>,
) {
    let mut session = MqttSession::publish_only();

    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        session.on_connack(ack.code);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        info!(topic = %publish.topic, payload_size = publish.payload.len(), "message received");
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        session.on_disconnect();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        session.on_disconnect();
                        connected_tx.send_replace(false);
                        error!(error = %e, "bad connection");

                        tokio::select! {
                            _ = ctx.cancelled() => break,
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                        continue;
                    }
                }

                connected_tx.send_if_modified(|connected| {
                    let changed = *connected != session.is_connected();
                    *connected = session.is_connected();
                    changed
                });
            }
        }
    }

    connected_tx.send_replace(false);
}
