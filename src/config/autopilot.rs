use std::fmt::Debug;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Configuration parameters for the dispatch engine core
#[derive(Serialize, Deserialize, Clone)]
pub struct AutopilotConfig {
    /// Rest delay drawn for every Wait phase
    #[serde(default)]
    pub wait: WaitConfig,

    /// Route reservation gate and turnout actuation settings
    #[serde(default)]
    pub reservation: ReservationConfig,

    /// Sensor wait supervision settings
    #[serde(default)]
    pub sensors: SensorConfig,

    /// Zeroes the rest delays and turnout pauses so an external driver can
    /// single-step the engine deterministically
    #[serde(default)]
    pub step_mode: bool,
}

impl Debug for AutopilotConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AutopilotConfig").finish()
    }
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            wait: WaitConfig::default(),
            reservation: ReservationConfig::default(),
            sensors: SensorConfig::default(),
            step_mode: false,
        }
    }
}

impl AutopilotConfig {
    /// Validates all dispatch engine configurations
    pub fn validate(&self) -> Result<()> {
        self.wait.validate()?;
        self.reservation.validate()?;
        self.sensors.validate()?;
        Ok(())
    }
}

/// Rest delay window between two dispatch cycles. The actual delay is drawn
/// uniformly from `[min_ms, max_ms]` for every Wait phase entry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WaitConfig {
    #[serde(default = "default_wait_min_ms")]
    pub min_ms: u64,

    #[serde(default = "default_wait_max_ms")]
    pub max_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            min_ms: default_wait_min_ms(),
            max_ms: default_wait_max_ms(),
        }
    }
}

impl WaitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_ms > self.max_ms {
            return Err(Error::Config(ConfigError::Message(
                "wait.min_ms must not exceed wait.max_ms".into(),
            )));
        }
        Ok(())
    }

    /// Rest-delay window in millis, ready for the pause timer.
    pub fn range_ms(&self) -> (u64, u64) {
        (self.min_ms, self.max_ms)
    }
}

/// Reservation gate width and turnout actuation pacing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReservationConfig {
    /// Number of dispatchers allowed inside the search+reserve critical
    /// section at the same time. One permit serializes all reservations.
    #[serde(default = "default_permits")]
    pub permits: usize,

    /// Pause between two turnout commands of the same route, giving the
    /// actuator time to finish switching
    #[serde(default = "default_switch_pause_ms")]
    pub switch_pause_ms: u64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            permits: default_permits(),
            switch_pause_ms: default_switch_pause_ms(),
        }
    }
}

impl ReservationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.permits == 0 {
            return Err(Error::Config(ConfigError::Message(
                "reservation.permits must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn switch_pause(&self) -> Duration {
        Duration::from_millis(self.switch_pause_ms)
    }
}

/// Supervision of armed sensor waits.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SensorConfig {
    /// How long a dispatcher may wait for an armed sensor before declaring
    /// the train stalled and emergency-stopping it. 0 disables the bound.
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    /// Loop tick interval while a sensor wait is armed
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            stall_timeout_ms: default_stall_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "sensors.poll_interval_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        if self.stall_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.stall_timeout_ms))
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_wait_min_ms() -> u64 {
    2_000
}

fn default_wait_max_ms() -> u64 {
    10_000
}

fn default_permits() -> usize {
    1
}

fn default_switch_pause_ms() -> u64 {
    250
}

fn default_stall_timeout_ms() -> u64 {
    90_000
}

fn default_poll_interval_ms() -> u64 {
    250
}
