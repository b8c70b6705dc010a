use crate::domain::{DomainError, DomainResult};
use std::fmt;

/// Identity of the leaf device that published a message.
///
/// Taken positionally from the MQTT topic: segment index 1 when the topic is
/// split on `/`, so `device/client0/message` yields `client0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Extract the device ID from a `device/<device_id>/message` style topic.
    ///
    /// # Returns
    /// * `Ok(DeviceId)` - Segment at index 1
    /// * `Err(DomainError::MalformedTopic)` - Fewer than two segments, or an empty segment
    ///
    /// # Examples
    /// ```
    /// use common::domain::DeviceId;
    ///
    /// let device_id = DeviceId::from_topic("device/client0/message").unwrap();
    /// assert_eq!(device_id.as_str(), "client0");
    /// ```
    pub fn from_topic(topic: &str) -> DomainResult<Self> {
        match topic.split('/').nth(1) {
            Some(segment) if !segment.is_empty() => Ok(Self(segment.to_string())),
            _ => Err(DomainError::MalformedTopic(topic.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_device_topic() {
        let device_id = DeviceId::from_topic("device/client0/message").unwrap();
        assert_eq!(device_id.as_str(), "client0");
    }

    #[test]
    fn test_extract_various_ids() {
        for id in ["dev0", "sensor_temp_01", "a-b-c", "42", "ünïcode"] {
            let topic = format!("device/{}/message", id);
            let device_id = DeviceId::from_topic(&topic).unwrap();
            assert_eq!(device_id.as_str(), id);
        }
    }

    #[test]
    fn test_extract_two_segment_topic() {
        let device_id = DeviceId::from_topic("device/client7").unwrap();
        assert_eq!(device_id.to_string(), "client7");
    }

    #[test]
    fn test_extract_ignores_trailing_segments() {
        let device_id = DeviceId::from_topic("device/client0/message/extra").unwrap();
        assert_eq!(device_id.as_str(), "client0");
    }

    #[test]
    fn test_single_segment_topic_is_malformed() {
        let result = DeviceId::from_topic("bad-topic");
        assert!(matches!(result, Err(DomainError::MalformedTopic(t)) if t == "bad-topic"));
    }

    #[test]
    fn test_empty_topic_is_malformed() {
        assert!(DeviceId::from_topic("").is_err());
    }

    #[test]
    fn test_empty_device_segment_is_malformed() {
        assert!(DeviceId::from_topic("device//message").is_err());
        assert!(DeviceId::from_topic("device/").is_err());
    }
}
