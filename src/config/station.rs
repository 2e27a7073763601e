use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Configuration of the command station attachment.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StationConfig {
    /// Capacity of the broadcast channel carrying sensor events from the
    /// station to the engine. Slow consumers lag and lose oldest events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Simulated actuator latency applied by the loopback station to every
    /// command; 0 for hardware-backed stations
    #[serde(default)]
    pub command_latency_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            command_latency_ms: 0,
        }
    }
}

impl StationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "station.event_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn command_latency(&self) -> Duration {
        Duration::from_millis(self.command_latency_ms)
    }
}

fn default_event_capacity() -> usize {
    256
}
