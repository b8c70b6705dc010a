mod args;
mod client;
mod reading;
mod simulator;

pub use args::SimArgs;
pub use client::{device_topic, run_simulated_client, SimulatedClientConfig};
pub use reading::TelemetryReading;
pub use simulator::{client_ids, Simulator};
