use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Device-facing MQTT broker
    /// Broker host the field devices publish to
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,

    /// Broker TLS port
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    /// Client ID used by the bridge's subscription session
    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    /// MQTT keep-alive in seconds
    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// CA certificate trusted for the broker's TLS certificate
    #[serde(default = "default_mqtt_ca_cert_path")]
    pub mqtt_ca_cert_path: String,

    /// Delay before reconnecting after a transport error
    #[serde(default = "default_mqtt_reconnect_delay_secs")]
    pub mqtt_reconnect_delay_secs: u64,

    /// Inbound events buffered between transport and translator
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    // Edge hub output
    /// Edge hub host the module sends its output to
    #[serde(default = "default_edge_hub_host")]
    pub edge_hub_host: String,

    /// Edge hub MQTT TLS port
    #[serde(default = "default_edge_hub_port")]
    pub edge_hub_port: u16,

    /// CA certificate for the edge hub; plain TCP when unset
    #[serde(default)]
    pub edge_hub_ca_cert_path: Option<String>,

    /// Edge hub username, `{hub}/{device}/{module}/?api-version=...`
    #[serde(default)]
    pub edge_hub_username: Option<String>,

    /// Edge hub password (SAS token)
    #[serde(default)]
    pub edge_hub_password: Option<String>,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

/// Values the IoT Edge runtime injects into every module container
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EdgeRuntimeConfig {
    /// Edge device hosting this module
    #[serde(default = "default_device_id")]
    pub deviceid: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// Device broker defaults
fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    8884
}

fn default_mqtt_client_id() -> String {
    "ptm-bridge".to_string()
}

fn default_mqtt_keep_alive_secs() -> u64 {
    60
}

fn default_mqtt_ca_cert_path() -> String {
    "/app/ca.crt".to_string()
}

fn default_mqtt_reconnect_delay_secs() -> u64 {
    5
}

fn default_channel_capacity() -> usize {
    100
}

// Edge hub defaults
fn default_edge_hub_host() -> String {
    "edgeHub".to_string()
}

fn default_edge_hub_port() -> u16 {
    8883
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "ptm-module".to_string()
}

fn default_device_id() -> String {
    "edge-device".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("PTM"))
            .build()?
            .try_deserialize()
    }
}

impl EdgeRuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("IOTEDGE"))
            .build()?
            .try_deserialize()
    }
}
