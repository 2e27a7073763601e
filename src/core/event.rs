use crate::model::LocoId;
use crate::model::RouteId;
use crate::model::SensorAddress;
use crate::Phase;

/// Cooperative control requests from the supervisor to one dispatcher.
/// They only latch flags inside the loop; the dispatcher acts on them at
/// the next tick or event boundary, never mid-action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Finish the cycle, park in Idle at the next rest point
    AutomodeOff,
    /// Abort the current run, roll the reservation back, end in Idle.
    /// Always wins over the phase's normal exit once observed.
    Reset,
}

/// Snapshot published on the dispatcher's watch channel after every phase
/// transition. This is the engine's observation surface: supervisors, tests
/// and external drivers read state here instead of through a callback API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseChange {
    pub loco: LocoId,
    pub phase: Phase,
    /// Sensor the dispatcher is waiting for, when one is armed
    pub awaiting: Option<SensorAddress>,
    /// Route of the active reservation, when one is held
    pub route: Option<RouteId>,
}

impl PhaseChange {
    pub fn idle(loco: LocoId) -> Self {
        Self {
            loco,
            phase: Phase::Idle,
            awaiting: None,
            route: None,
        }
    }
}
