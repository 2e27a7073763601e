use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

use super::SensorAddress;

/// One feedback contact on the layout. Mutated exclusively by the sensor
/// router; everyone else reads snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub address: SensorAddress,
    pub active: bool,
    pub previous_active: bool,
    pub last_change: Option<SystemTime>,
}

impl Sensor {
    pub fn new(address: SensorAddress) -> Self {
        Self {
            address,
            active: false,
            previous_active: false,
            last_change: None,
        }
    }

    /// Fold a wire transition into the entity. Returns false when the event
    /// repeats the current level (debounce chatter, duplicated frames).
    pub fn apply(
        &mut self,
        event: &SensorEvent,
    ) -> bool {
        if self.active == event.active {
            return false;
        }
        self.previous_active = self.active;
        self.active = event.active;
        self.last_change = Some(SystemTime::now());
        true
    }
}

/// A sensor transition as reported by the command station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorEvent {
    pub address: SensorAddress,
    pub active: bool,
}

impl SensorEvent {
    pub fn on(address: SensorAddress) -> Self {
        Self {
            address,
            active: true,
        }
    }

    pub fn off(address: SensorAddress) -> Self {
        Self {
            address,
            active: false,
        }
    }
}
