use rand::Rng;
use serde::{Deserialize, Serialize};

/// Randomized device reading published by every simulated client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Integer in [0, 100)
    pub param1: u32,
    /// Float in [0, 1)
    pub param2: f64,
}

impl TelemetryReading {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            param1: rng.gen_range(0..100),
            param2: rng.gen::<f64>(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
