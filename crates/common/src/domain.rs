mod device_id;
mod envelope;
mod identity;
mod output;
mod result;

pub use device_id::*;
pub use envelope::*;
pub use identity::*;
pub use output::*;
pub use result::*;

/// Topic filter the bridge subscribes to; `+` matches exactly one device id.
pub const DEVICE_TOPIC_FILTER: &str = "device/+/message";
