mod config;

use common::domain::{ModuleIdentity, OutputSink, DEVICE_TOPIC_FILTER};
use common::mqtt::{MqttConnectionConfig, MqttSubscriberConfig};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use crate::config::{EdgeRuntimeConfig, ServiceConfig};
use ptm_bridge::{EdgeHubConnection, EdgeHubOutputSink, EdgeHubSinkConfig, PtmBridge, PtmBridgeConfig};
use ptm_runner::Runner;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    // Read once; shared read-only for the process lifetime
    let identity = match ModuleIdentity::from_env() {
        Ok(identity) => identity,
        Err(e) => {
            error!(error = %e, "missing module identity, refusing to start");
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let edge_runtime = match EdgeRuntimeConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load IoT Edge runtime configuration");
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    info!(
        module_id = %identity,
        device_id = %edge_runtime.deviceid,
        mqtt_host = %config.mqtt_host,
        mqtt_port = config.mqtt_port,
        otel_enabled = config.otel_enabled,
        "Starting ptm-module"
    );
    debug!("Configuration: {:?}", config);

    let (sink, edge_hub_connection) = match create_edge_hub_sink(&config, &edge_runtime, &identity) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %format!("{:#}", e), "failed to create edge hub output sink");
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let bridge = PtmBridge::new(
        PtmBridgeConfig {
            subscriber: MqttSubscriberConfig {
                connection: device_broker_config(&config),
                topic_filter: DEVICE_TOPIC_FILTER.to_string(),
                reconnect_delay: Duration::from_secs(config.mqtt_reconnect_delay_secs),
            },
            channel_capacity: config.channel_capacity,
        },
        sink,
        identity,
    );

    let mut runner = Runner::new()
        .with_app_process("edge_hub_connection", move |ctx| edge_hub_connection.run(ctx))
        .with_closer(move || async move {
            info!("Shutting down telemetry");
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    for (name, process) in bridge.into_runner_processes() {
        runner = runner.with_boxed_process(name, process);
    }

    match runner.run().await {
        Ok(()) => {
            eprintln!("ptm-module exiting normally");
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("ptm-module exiting with error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn create_edge_hub_sink(
    config: &ServiceConfig,
    edge_runtime: &EdgeRuntimeConfig,
    identity: &ModuleIdentity,
) -> anyhow::Result<(Arc<dyn OutputSink>, EdgeHubConnection)> {
    let sink_config = edge_hub_sink_config(config, edge_runtime, identity);
    let (sink, connection) = EdgeHubOutputSink::new(&sink_config).with_context(|| {
        format!(
            "edge hub at {}:{}",
            sink_config.connection.host, sink_config.connection.port
        )
    })?;

    Ok((Arc::new(sink), connection))
}

fn device_broker_config(config: &ServiceConfig) -> MqttConnectionConfig {
    MqttConnectionConfig::new(&config.mqtt_client_id, &config.mqtt_host, config.mqtt_port)
        .with_keep_alive_secs(config.mqtt_keep_alive_secs)
        .with_ca_cert(&config.mqtt_ca_cert_path)
}

fn edge_hub_sink_config(
    config: &ServiceConfig,
    edge_runtime: &EdgeRuntimeConfig,
    identity: &ModuleIdentity,
) -> EdgeHubSinkConfig {
    let client_id = format!("{}/{}", edge_runtime.deviceid, identity.module_id());
    let mut connection =
        MqttConnectionConfig::new(client_id, &config.edge_hub_host, config.edge_hub_port)
            .with_keep_alive_secs(config.mqtt_keep_alive_secs);

    if let Some(ca_path) = &config.edge_hub_ca_cert_path {
        connection = connection.with_ca_cert(ca_path);
    }
    if let Some(username) = &config.edge_hub_username {
        connection = connection.with_credentials(
            username,
            config.edge_hub_password.clone().unwrap_or_default(),
        );
    }

    EdgeHubSinkConfig {
        connection,
        device_id: edge_runtime.deviceid.clone(),
        module_id: identity.module_id().to_string(),
        reconnect_delay: Duration::from_secs(config.mqtt_reconnect_delay_secs),
    }
}
