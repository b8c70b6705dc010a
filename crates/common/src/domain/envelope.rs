use crate::domain::{DomainError, DomainResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single PUBLISH received from the broker
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub topic: String,
    pub payload: Bytes,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl InboundEvent {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: chrono::Utc::now(),
        }
    }
}

/// Decode a device payload as UTF-8 text holding a JSON document.
///
/// Any JSON value is accepted (object, array or scalar).
pub fn decode_payload(payload: &[u8]) -> DomainResult<serde_json::Value> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| DomainError::MalformedPayload(format!("invalid UTF-8: {}", e)))?;

    serde_json::from_str(text)
        .map_err(|e| DomainError::MalformedPayload(format!("invalid JSON: {}", e)))
}

/// Envelope forwarded to the output: original topic plus the decoded body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl OutboundEnvelope {
    pub fn to_bytes(&self) -> DomainResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_object_payload() {
        let value = decode_payload(br#"{"param1": 42, "param2": 0.5}"#).unwrap();
        assert_eq!(value, json!({"param1": 42, "param2": 0.5}));
    }

    #[test]
    fn test_decode_scalar_and_array_payloads() {
        assert_eq!(decode_payload(b"17").unwrap(), json!(17));
        assert_eq!(decode_payload(b"\"on\"").unwrap(), json!("on"));
        assert_eq!(decode_payload(b"[1, 2, 3]").unwrap(), json!([1, 2, 3]));
        assert_eq!(decode_payload(b"null").unwrap(), json!(null));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let result = decode_payload(b"not-json");
        assert!(matches!(result, Err(DomainError::MalformedPayload(msg)) if msg.contains("JSON")));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let result = decode_payload(&[0x7b, 0xff, 0xfe, 0x7d]);
        assert!(matches!(result, Err(DomainError::MalformedPayload(msg)) if msg.contains("UTF-8")));
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        assert!(decode_payload(b"").is_err());
    }

    #[test]
    fn test_reencoded_payload_decodes_to_same_value() {
        let values = [
            json!({"param1": 42, "param2": 0.5}),
            json!({"nested": {"list": [1, "two", null, true]}, "n": -3.25}),
            json!([]),
            json!("plain string"),
        ];

        for value in values {
            let encoded = serde_json::to_vec(&value).unwrap();
            assert_eq!(decode_payload(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_envelope_serializes_topic_then_payload() {
        let envelope = OutboundEnvelope {
            topic: "device/client0/message".to_string(),
            payload: json!({"param1": 42, "param2": 0.5}),
        };

        let bytes = envelope.to_bytes().unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"topic":"device/client0/message","payload":{"param1":42,"param2":0.5}}"#
        );
    }

    #[test]
    fn test_inbound_event_new() {
        let event = InboundEvent::new("device/a/message", &b"{}"[..]);
        assert_eq!(event.topic, "device/a/message");
        assert_eq!(event.payload, Bytes::from_static(b"{}"));
    }
}
