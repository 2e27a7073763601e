//! Core seam to the layout data: every track-state read and write of the
//! engine goes through this trait.

use crate::errors::LayoutError;
use crate::model::Block;
use crate::model::BlockId;
use crate::model::BlockSide;
use crate::model::LocoId;
use crate::model::Locomotive;
use crate::model::Route;
use crate::model::RouteId;
use crate::model::Sensor;
use crate::model::SensorAddress;
use crate::model::TileId;
use crate::model::Turnout;
use crate::model::TurnoutAddress;

#[cfg(test)]
use mockall::automock;

/// Value-semantics access to the layout. Readers get snapshots; writers
/// persist whole entities back. The store makes no consistency promises
/// between calls -- callers that need atomicity hold the reservation gate
/// across their read-modify-write sequence.
#[cfg_attr(test, automock)]
pub trait LayoutStore: Send + Sync + 'static {
    fn block(&self, id: &BlockId) -> Result<Block, LayoutError>;

    /// Block occupying the given plan tile, if any
    fn block_by_tile(&self, tile: &TileId) -> Option<Block>;

    /// Block currently holding the locomotive as occupant, if any
    fn block_of_locomotive(&self, loco: &LocoId) -> Option<Block>;

    /// All routes leaving `block` through `side`, in deterministic order
    fn routes_from(&self, block: &BlockId, side: BlockSide) -> Vec<Route>;

    fn route(&self, id: &RouteId) -> Result<Route, LayoutError>;

    fn locomotive(&self, id: &LocoId) -> Result<Locomotive, LayoutError>;

    fn sensor(&self, address: SensorAddress) -> Option<Sensor>;

    fn turnout(&self, address: TurnoutAddress) -> Result<Turnout, LayoutError>;

    /// Whether some locked route other than `excluding` references the
    /// turnout. Turnout locks are derived, never stored.
    fn is_turnout_locked<'a>(&self, address: TurnoutAddress, excluding: Option<&'a RouteId>) -> bool;

    fn save_block(&self, block: &Block) -> Result<(), LayoutError>;

    fn save_route(&self, route: &Route) -> Result<(), LayoutError>;

    fn save_locomotive(&self, loco: &Locomotive) -> Result<(), LayoutError>;

    fn save_sensor(&self, sensor: &Sensor) -> Result<(), LayoutError>;

    fn save_turnout(&self, turnout: &Turnout) -> Result<(), LayoutError>;
}
