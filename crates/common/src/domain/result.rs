use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed topic '{0}': expected at least two '/'-separated segments with a device ID at index 1")]
    MalformedTopic(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Envelope serialization error: {0}")]
    EnvelopeSerialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to send message to output '{output}': {reason}")]
    OutputSendFailed { output: String, reason: String },

    #[error("Transport error: {0}")]
    TransportError(#[from] anyhow::Error),
}
