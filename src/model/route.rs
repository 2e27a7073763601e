use std::ops::Not;

use serde::Deserialize;
use serde::Serialize;

use super::BlockSide;
use super::LocoId;
use super::RouteId;
use super::TileId;
use super::TurnoutAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnoutPosition {
    Straight,
    Diverging,
}

impl Not for TurnoutPosition {
    type Output = TurnoutPosition;

    fn not(self) -> Self::Output {
        match self {
            TurnoutPosition::Straight => TurnoutPosition::Diverging,
            TurnoutPosition::Diverging => TurnoutPosition::Straight,
        }
    }
}

/// Position a route demands of one turnout on its way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnoutSetting {
    pub address: TurnoutAddress,
    pub position: TurnoutPosition,
}

/// One tile a route crosses between its two blocks. Elements carry an
/// explicit order because turnouts must be thrown in track order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteElement {
    pub tile: TileId,
    pub turnout: Option<TurnoutSetting>,
    pub order: u32,
}

/// A drivable connection from one block side to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub from_tile: TileId,
    pub from_side: BlockSide,
    pub to_tile: TileId,
    pub to_side: BlockSide,
    /// Holder of the route lock; at most one dispatcher at a time
    pub locked_by: Option<LocoId>,
    pub elements: Vec<RouteElement>,
}

impl Route {
    pub fn new(
        id: impl Into<RouteId>,
        from_tile: impl Into<TileId>,
        from_side: BlockSide,
        to_tile: impl Into<TileId>,
        to_side: BlockSide,
    ) -> Self {
        Self {
            id: id.into(),
            from_tile: from_tile.into(),
            from_side,
            to_tile: to_tile.into(),
            to_side,
            locked_by: None,
            elements: Vec::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    pub fn is_locked_by(
        &self,
        loco: &LocoId,
    ) -> bool {
        self.locked_by.as_ref() == Some(loco)
    }

    /// Turnout settings of this route in track order.
    pub fn turnouts(&self) -> impl Iterator<Item = TurnoutSetting> + '_ {
        let mut elements: Vec<&RouteElement> = self.elements.iter().filter(|e| e.turnout.is_some()).collect();
        elements.sort_by_key(|e| e.order);
        elements.into_iter().filter_map(|e| e.turnout)
    }

    /// Whether this route references the given turnout address.
    pub fn uses_turnout(
        &self,
        address: TurnoutAddress,
    ) -> bool {
        self.turnouts().any(|t| t.address == address)
    }
}
