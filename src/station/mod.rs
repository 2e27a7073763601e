//! Command station abstraction: the downlink for track commands and the
//! uplink for sensor feedback.
//!
//! The engine never talks wire protocols itself; everything physical goes
//! through [`CommandStation`]. Commands are awaited so callers observe
//! acknowledgement order, while sensor feedback arrives asynchronously on a
//! broadcast channel.

mod sim;

#[cfg(test)]
mod sim_test;

#[doc(hidden)]
pub use sim::*;

// Trait definition of the current module
// -----------------------------------------------------------------------------

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::StationError;
use crate::model::Direction;
use crate::model::LocoId;
use crate::model::SensorEvent;
use crate::model::SignalAddress;
use crate::model::SignalAspect;
use crate::model::TurnoutAddress;
use crate::model::TurnoutPosition;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandStation: Send + Sync + 'static {
    async fn switch_turnout(
        &self,
        address: TurnoutAddress,
        position: TurnoutPosition,
    ) -> Result<(), StationError>;

    async fn set_signal(
        &self,
        address: SignalAddress,
        aspect: SignalAspect,
    ) -> Result<(), StationError>;

    /// Velocity on the engine scale (0..=1000); the station maps it onto
    /// decoder speed steps
    async fn set_velocity(
        &self,
        loco: &LocoId,
        velocity: u16,
    ) -> Result<(), StationError>;

    async fn set_direction(
        &self,
        loco: &LocoId,
        direction: Direction,
    ) -> Result<(), StationError>;

    /// Every subscriber sees every sensor transition
    fn subscribe_sensors(&self) -> broadcast::Receiver<SensorEvent>;

    fn is_connected(&self) -> bool;
}
