mod connection;
mod session;
mod subscriber;

pub use connection::MqttConnectionConfig;
pub use session::{MqttSession, SessionAction, SessionState};
pub use subscriber::{MqttSubscriber, MqttSubscriberConfig};
