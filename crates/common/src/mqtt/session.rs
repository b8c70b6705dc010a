use rumqttc::{ConnectReturnCode, SubAck, SubscribeReasonCode};
use tracing::{error, info, warn};

/// Connection lifecycle of one MQTT session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    ConnectedUnsubscribed,
    ConnectedSubscribed,
}

/// Work the transport must carry out after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Subscribe(String),
}

/// Tracks connection state and decides when to (re)subscribe.
///
/// Broker subscriptions do not survive a reconnect with a clean session, so
/// every successful CONNACK that enters the connected state yields a
/// [`SessionAction::Subscribe`] for the configured filter.
#[derive(Debug, Clone)]
pub struct MqttSession {
    state: SessionState,
    topic_filter: Option<String>,
}

impl MqttSession {
    /// Session that subscribes to `topic_filter` on every connect
    pub fn subscribing(topic_filter: impl Into<String>) -> Self {
        Self {
            state: SessionState::Disconnected,
            topic_filter: Some(topic_filter.into()),
        }
    }

    /// Session that only publishes
    pub fn publish_only() -> Self {
        Self {
            state: SessionState::Disconnected,
            topic_filter: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn topic_filter(&self) -> Option<&str> {
        self.topic_filter.as_deref()
    }

    pub fn on_connack(&mut self, code: ConnectReturnCode) -> Option<SessionAction> {
        if code != ConnectReturnCode::Success {
            error!(return_code = ?code, "broker refused connection");
            self.state = SessionState::Disconnected;
            return None;
        }

        info!(return_code = ?code, "connected to MQTT broker");
        self.state = SessionState::ConnectedUnsubscribed;
        self.topic_filter
            .as_ref()
            .map(|filter| SessionAction::Subscribe(filter.clone()))
    }

    pub fn on_suback(&mut self, ack: &SubAck) {
        if self.state == SessionState::Disconnected {
            warn!(pkid = ack.pkid, "subscription acknowledged while disconnected, ignoring");
            return;
        }

        let granted = ack
            .return_codes
            .iter()
            .all(|code| matches!(code, SubscribeReasonCode::Success(_)));

        if granted {
            info!(topic_filter = ?self.topic_filter, "subscription acknowledged");
            self.state = SessionState::ConnectedSubscribed;
        } else {
            error!(
                topic_filter = ?self.topic_filter,
                return_codes = ?ack.return_codes,
                "broker rejected subscription"
            );
        }
    }

    pub fn on_disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            warn!("MQTT session disconnected");
        }
        self.state = SessionState::Disconnected;
    }
}
