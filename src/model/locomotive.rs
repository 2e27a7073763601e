use std::ops::Not;

use serde::Deserialize;
use serde::Serialize;

use super::LocoId;

/// Velocity scale used across the engine; command stations map it onto
/// their own speed steps.
pub const VELOCITY_MAX: u16 = 1000;
pub const VELOCITY_STOP: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forwards,
    Backwards,
}

impl Not for Direction {
    type Output = Direction;

    fn not(self) -> Self::Output {
        match self {
            Direction::Forwards => Direction::Backwards,
            Direction::Backwards => Direction::Forwards,
        }
    }
}

/// Cruise and approach velocities of a locomotive on the 0..=1000 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub cruise: u16,
    pub approach: u16,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            cruise: 600,
            approach: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locomotive {
    pub id: LocoId,
    pub direction: Direction,
    /// Last commanded velocity; updated after every issued speed command
    pub velocity: u16,
    /// Commuter trains may reverse out of dead ends
    pub commuter: bool,
    pub profile: SpeedProfile,
    /// Decoder calibration: the velocities this locomotive can actually
    /// hold, ascending. Empty means the decoder takes the scale directly.
    pub steps: Vec<u16>,
}

impl Locomotive {
    pub fn new(id: impl Into<LocoId>) -> Self {
        Self {
            id: id.into(),
            direction: Direction::Forwards,
            velocity: VELOCITY_STOP,
            commuter: false,
            profile: SpeedProfile::default(),
            steps: Vec::new(),
        }
    }

    /// Snap a requested velocity onto the calibration table, nearest entry
    /// winning (lower on ties). Without a table the request is only clamped.
    pub fn calibrated(
        &self,
        velocity: u16,
    ) -> u16 {
        let velocity = velocity.min(VELOCITY_MAX);
        if self.steps.is_empty() {
            return velocity;
        }

        let mut best = self.steps[0];
        for &step in &self.steps {
            let d = step.abs_diff(velocity);
            if d < best.abs_diff(velocity) {
                best = step;
            }
        }
        best
    }

    pub fn cruise_velocity(&self) -> u16 {
        self.calibrated(self.profile.cruise)
    }

    pub fn approach_velocity(&self) -> u16 {
        self.calibrated(self.profile.approach)
    }
}
