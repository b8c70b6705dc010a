pub mod edge_hub;
pub mod ptm_bridge;
pub mod translator;

pub use edge_hub::{EdgeHubConnection, EdgeHubOutputSink, EdgeHubSinkConfig};
pub use ptm_bridge::{PtmBridge, PtmBridgeConfig};
pub use translator::{BridgeTranslator, MessageOutcome};
