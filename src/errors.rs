//! Dispatch Engine Error Hierarchy
//!
//! Defines error types for the autonomous dispatch engine, categorized by
//! subsystem: dispatcher lifecycle, route reservation, layout store and
//! command station.

use config::ConfigError;

use crate::model::BlockId;
use crate::model::BlockSide;
use crate::model::LocoId;
use crate::model::RouteId;
use crate::model::SensorAddress;
use crate::model::TileId;
use crate::model::TurnoutAddress;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Per-dispatcher lifecycle and sensor-wait failures
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Route reservation failures (retryable by design)
    #[error(transparent)]
    Reservation(#[from] ReservationError),

    /// Layout store lookup failures
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Command station communication failures
    #[error(transparent)]
    Station(#[from] StationError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring engine termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The locomotive has no occupied block to depart from
    #[error("Locomotive {0} is not placed in any block")]
    NotPlaced(LocoId),

    /// Single-awaiter registry violation: the sensor already has a listener
    #[error("Sensor {sensor} is already awaited by locomotive {holder}")]
    SensorConflict {
        sensor: SensorAddress,
        holder: LocoId,
    },

    /// Bounded sensor wait expired; the locomotive was emergency-stopped
    /// and the await stays armed so a late event can resume the run
    #[error("Locomotive {loco} stalled waiting for sensor {sensor}")]
    Stalled {
        loco: LocoId,
        sensor: SensorAddress,
    },

    /// The dispatcher side of the control channel has gone away
    #[error("Dispatcher control channel closed")]
    ControlChannelClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    /// The global reservation gate is held by another dispatcher
    #[error("Reservation gate is busy")]
    GateBusy,

    /// No candidate route survived the availability filter
    #[error("No free route from block {block} on side {side:?}")]
    NoFreeRoute { block: BlockId, side: BlockSide },

    /// Commit-time re-validation found a turnout locked by another route
    #[error("Turnout {turnout} contended while committing route {route}")]
    TurnoutContended {
        route: RouteId,
        turnout: TurnoutAddress,
    },

    /// The chosen route's destination tile no longer resolves to a block
    #[error("No block on destination tile {0}")]
    DestinationUnavailable(TileId),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Station(#[from] StationError),
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Unknown block: {0}")]
    UnknownBlock(BlockId),

    #[error("Unknown route: {0}")]
    UnknownRoute(RouteId),

    #[error("Unknown locomotive: {0}")]
    UnknownLocomotive(LocoId),

    #[error("Unknown sensor: {0}")]
    UnknownSensor(SensorAddress),

    #[error("Unknown turnout: {0}")]
    UnknownTurnout(TurnoutAddress),
}

#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// The station link is down; fatal for the dispatcher being started
    #[error("Command station is not connected")]
    NotConnected,

    /// The station refused a command it received
    #[error("Command station rejected {command}: {reason}")]
    CommandRejected { command: String, reason: String },

    /// The sensor event stream ended
    #[error("Sensor feed closed")]
    FeedClosed,
}

impl Error {
    /// True when the failure only delays a dispatcher cycle instead of
    /// ending it. The dispatcher parks in Waiting and retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Reservation(e) if e.is_retryable())
    }
}

impl ReservationError {
    /// Contention and availability failures resolve themselves as other
    /// trains move on; store and station failures do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReservationError::GateBusy
                | ReservationError::NoFreeRoute { .. }
                | ReservationError::TurnoutContended { .. }
                | ReservationError::DestinationUnavailable(_)
        )
    }
}

// ============== Conversion Implementations ============== //
impl From<tokio::sync::TryAcquireError> for ReservationError {
    fn from(_: tokio::sync::TryAcquireError) -> Self {
        ReservationError::GateBusy
    }
}
