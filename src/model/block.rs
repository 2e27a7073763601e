use std::ops::Not;

use serde::Deserialize;
use serde::Serialize;

use super::BlockId;
use super::LocoId;
use super::SensorAddress;
use super::SignalAddress;
use super::TileId;

/// Physical side of a block. Every block has two ends; sensors, signals and
/// route endpoints are attached to one side or the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockSide {
    Plus,
    Minus,
}

impl Not for BlockSide {
    type Output = BlockSide;

    fn not(self) -> Self::Output {
        match self {
            BlockSide::Plus => BlockSide::Minus,
            BlockSide::Minus => BlockSide::Plus,
        }
    }
}

impl std::fmt::Display for BlockSide {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            BlockSide::Plus => write!(f, "+"),
            BlockSide::Minus => write!(f, "-"),
        }
    }
}

/// Occupancy state of a block.
///
/// `Departing/Leaving` and `Locked/Arriving` mark the two ends of a
/// stop-bound traversal; `Outbound/Inbound` mark a pass-through traversal
/// where the train keeps its cruise speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// No train, reservable
    Free,
    /// A train is parked here
    Occupied,
    /// The occupant has reserved a route out and is about to move
    Departing,
    /// Reserved as the destination of a route, train not yet arrived
    Locked,
    /// The expected train has hit the enter sensor and is rolling in to stop
    Arriving,
    /// The expected train is rolling in and will continue without stopping
    Inbound,
    /// The occupant is continuing through at speed
    Outbound,
    /// The occupant has crossed into the next block's enter sensor
    Leaving,
}

/// Aspect commanded to a block exit signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAspect {
    Stop,
    Clear,
}

/// A track section that can hold exactly one train, bounded by one feedback
/// sensor on each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    /// Tile the block occupies in the track plan; routes attach here
    pub tile: TileId,
    pub sensor_plus: SensorAddress,
    pub sensor_minus: SensorAddress,
    pub signal_plus: Option<SignalAddress>,
    pub signal_minus: Option<SignalAddress>,
    pub state: BlockState,
    pub occupant: Option<LocoId>,
    /// Side the occupant came in through, recorded on arrival
    pub arrival_side: Option<BlockSide>,
    /// Which side counts as the exit when the occupant drives forwards
    pub logical_direction: BlockSide,
    /// Commuter turnaround: record the flipped arrival side so the next
    /// departure leaves the way the train came in
    pub reverse_arrival: bool,
    /// Whether a train may continue through without a full stop
    pub through_allowed: bool,
    pub allow_commuter: bool,
    pub allow_non_commuter: bool,
}

impl Block {
    pub fn new(
        id: impl Into<BlockId>,
        tile: impl Into<TileId>,
        sensor_plus: SensorAddress,
        sensor_minus: SensorAddress,
    ) -> Self {
        Self {
            id: id.into(),
            tile: tile.into(),
            sensor_plus,
            sensor_minus,
            signal_plus: None,
            signal_minus: None,
            state: BlockState::Free,
            occupant: None,
            arrival_side: None,
            logical_direction: BlockSide::Plus,
            reverse_arrival: false,
            through_allowed: true,
            allow_commuter: true,
            allow_non_commuter: true,
        }
    }

    pub fn sensor_on(
        &self,
        side: BlockSide,
    ) -> SensorAddress {
        match side {
            BlockSide::Plus => self.sensor_plus,
            BlockSide::Minus => self.sensor_minus,
        }
    }

    pub fn signal_on(
        &self,
        side: BlockSide,
    ) -> Option<SignalAddress> {
        match side {
            BlockSide::Plus => self.signal_plus,
            BlockSide::Minus => self.signal_minus,
        }
    }

    /// First sensor a train arriving through `arrival` will trigger.
    pub fn enter_sensor(
        &self,
        arrival: BlockSide,
    ) -> SensorAddress {
        self.sensor_on(arrival)
    }

    /// Far-end sensor of a train arriving through `arrival`; triggering it
    /// means the train is fully inside the block.
    pub fn in_sensor(
        &self,
        arrival: BlockSide,
    ) -> SensorAddress {
        self.sensor_on(!arrival)
    }

    /// Exit side for the given travel direction, derived from the block's
    /// logical direction.
    pub fn exit_side(
        &self,
        direction: super::Direction,
    ) -> BlockSide {
        match direction {
            super::Direction::Forwards => self.logical_direction,
            super::Direction::Backwards => !self.logical_direction,
        }
    }

    pub fn is_free(&self) -> bool {
        self.state == BlockState::Free && self.occupant.is_none()
    }

    /// Whether a train with the given commuter flag may be routed here.
    pub fn admits(
        &self,
        commuter: bool,
    ) -> bool {
        if commuter {
            self.allow_commuter
        } else {
            self.allow_non_commuter
        }
    }

    /// Finalize an arrival: occupy the block and record the arrival side,
    /// flipped when the block is a commuter turnaround.
    pub fn record_arrival(
        &mut self,
        loco: LocoId,
        side: BlockSide,
    ) {
        let recorded = if self.reverse_arrival { !side } else { side };
        self.state = BlockState::Occupied;
        self.occupant = Some(loco);
        self.arrival_side = Some(recorded);
    }

    /// Release the block back to the reservable pool.
    pub fn release(&mut self) {
        self.state = BlockState::Free;
        self.occupant = None;
        self.arrival_side = None;
    }
}
