use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Dispatch cycle phase of one locomotive.
///
/// The enum is deliberately data-free: all per-run bookkeeping (active
/// reservation, armed sensor, stall deadline) lives in the dispatcher, and
/// every transition goes through its single transition site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Parked, automode off
    Idle,
    /// Searching and reserving the next route
    PrepareRoute,
    /// Under way towards the destination's enter sensor
    Starting,
    /// Inside the destination at approach speed, heading for the in sensor
    Entering,
    /// Still heading for the in sensor while trying to reserve a
    /// continuation route
    PrepareNext,
    /// Continuation reserved; passing through at cruise speed
    Proceeding,
    /// Stopping on the in sensor and finalizing the arrival
    Braking,
    /// Arrived; resting until the pause timer expires
    Waiting,
    /// Tearing down the current run after a reset request
    Resetting,
}

impl Phase {
    /// Rest points are the only phases where automode-off is honored; a
    /// train is never abandoned between blocks.
    pub fn is_rest_point(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Waiting)
    }

    /// Phases with an armed sensor wait, supervised by the stall timeout.
    pub fn awaits_sensor(&self) -> bool {
        matches!(
            self,
            Phase::Starting | Phase::Entering | Phase::PrepareNext | Phase::Proceeding
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PrepareRoute => "prepare_route",
            Phase::Starting => "starting",
            Phase::Entering => "entering",
            Phase::PrepareNext => "prepare_next",
            Phase::Proceeding => "proceeding",
            Phase::Braking => "braking",
            Phase::Waiting => "waiting",
            Phase::Resetting => "resetting",
        };
        f.write_str(name)
    }
}
