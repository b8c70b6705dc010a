use crate::domain::{DeviceId, DomainResult, ModuleIdentity};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;

/// Output channel the bridge forwards enriched messages to
pub const PTM_OUTPUT_NAME: &str = "ptm_output";

/// Metadata key carrying the originating leaf device ID
pub const LEAF_DEVICE_ID_PROPERTY: &str = "leafdeviceid";

/// Metadata key carrying the bridge's own module ID
pub const MODULE_ID_PROPERTY: &str = "moduleid";

/// Message handed to an output sink: a serialized body plus string metadata
/// carried out-of-band from the body.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMessage {
    pub body: Bytes,
    pub properties: BTreeMap<String, String>,
}

impl OutputMessage {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Attach `leafdeviceid` and `moduleid`
    pub fn with_identity(self, device_id: &DeviceId, identity: &ModuleIdentity) -> Self {
        self.with_property(LEAF_DEVICE_ID_PROPERTY, device_id.as_str())
            .with_property(MODULE_ID_PROPERTY, identity.module_id())
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Trait for delivering messages to a named output channel
///
/// Implementations should:
/// - Deliver the body unchanged
/// - Carry every property as message metadata, not inside the body
/// - Return error if the message cannot be handed to the transport
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Send a single message to the named output
    ///
    /// # Arguments
    /// * `message` - Body and metadata to deliver
    /// * `output_name` - Logical output channel
    ///
    /// # Returns
    /// () once the transport accepted the message, DomainError on failure
    async fn send_to_output(&self, message: &OutputMessage, output_name: &str) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_identity_sets_both_properties() {
        let device_id = DeviceId::from_topic("device/client0/message").unwrap();
        let identity = ModuleIdentity::new("ptm").unwrap();

        let message = OutputMessage::new(&b"{}"[..]).with_identity(&device_id, &identity);

        assert_eq!(message.property(LEAF_DEVICE_ID_PROPERTY), Some("client0"));
        assert_eq!(message.property(MODULE_ID_PROPERTY), Some("ptm"));
        assert_eq!(message.properties.len(), 2);
    }

    #[test]
    fn test_with_property_overwrites() {
        let message = OutputMessage::new(Bytes::new())
            .with_property("k", "a")
            .with_property("k", "b");
        assert_eq!(message.property("k"), Some("b"));
    }
}
