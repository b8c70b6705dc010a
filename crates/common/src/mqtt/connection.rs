use crate::domain::{DomainError, DomainResult};
use rumqttc::{MqttOptions, TlsConfiguration, Transport};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Settings for one MQTT session
#[derive(Debug, Clone)]
pub struct MqttConnectionConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// CA certificate used to verify the broker; TLS is enabled when set
    pub ca_cert_path: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MqttConnectionConfig {
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            keep_alive_secs: 60,
            ca_cert_path: None,
            username: None,
            password: None,
        }
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn with_keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build rumqttc options, loading the CA certificate so TLS trust is in
    /// place before the first connect.
    pub fn to_mqtt_options(&self) -> DomainResult<MqttOptions> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options.set_clean_session(true);

        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }

        if let Some(ca_path) = &self.ca_cert_path {
            let ca = std::fs::read(ca_path).map_err(|e| {
                DomainError::InvalidConfig(format!(
                    "failed to read CA certificate {}: {}",
                    ca_path.display(),
                    e
                ))
            })?;

            debug!(
                client_id = %self.client_id,
                ca_cert_path = %ca_path.display(),
                "configured TLS transport"
            );

            options.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: None,
            }));
        }

        Ok(options)
    }
}
