use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Logging and OTLP export settings for one process.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Reported as `service.name` on exported spans and logs.
    pub service_name: String,
    pub otel_endpoint: String,
    /// Console JSON logging is always on; this only adds the OTLP exporters.
    pub otel_enabled: bool,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl TelemetryConfig {
    /// Console-only logging for `service_name` at `log_level`.
    pub fn for_service(service_name: impl Into<String>, log_level: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: log_level.into(),
            ..Self::default()
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "ptm".to_string(),
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

/// OTLP providers that must be flushed before the process exits.
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}

impl TelemetryProviders {
    /// Flush pending spans and log records. Errors go to stderr since the
    /// tracing pipeline is the thing being torn down.
    pub fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
        if let Err(e) = self.logger_provider.shutdown() {
            eprintln!("Error shutting down logger provider: {:?}", e);
        }
    }
}
