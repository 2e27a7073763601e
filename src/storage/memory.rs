use dashmap::DashMap;

use crate::errors::LayoutError;
use crate::model::Block;
use crate::model::BlockId;
use crate::model::BlockSide;
use crate::model::BlockState;
use crate::model::LocoId;
use crate::model::Locomotive;
use crate::model::Route;
use crate::model::RouteId;
use crate::model::Sensor;
use crate::model::SensorAddress;
use crate::model::TileId;
use crate::model::Turnout;
use crate::model::TurnoutAddress;
use crate::LayoutStore;

/// Concurrent in-memory layout store backing tests and the demo binary.
/// Durable layout storage is an external collaborator; this store only has
/// to be safe under concurrent dispatcher access.
#[derive(Debug, Default)]
pub struct MemoryLayoutStore {
    blocks: DashMap<BlockId, Block>,
    routes: DashMap<RouteId, Route>,
    locomotives: DashMap<LocoId, Locomotive>,
    sensors: DashMap<SensorAddress, Sensor>,
    turnouts: DashMap<TurnoutAddress, Turnout>,
}

impl MemoryLayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a block. Its two boundary sensors are registered as entities
    /// when not already known.
    pub fn add_block(
        &self,
        block: Block,
    ) {
        for address in [block.sensor_plus, block.sensor_minus] {
            self.sensors
                .entry(address)
                .or_insert_with(|| Sensor::new(address));
        }
        self.blocks.insert(block.id.clone(), block);
    }

    /// Seed a route. Its turnouts are registered as entities when not
    /// already known.
    pub fn add_route(
        &self,
        route: Route,
    ) {
        for setting in route.turnouts() {
            self.turnouts
                .entry(setting.address)
                .or_insert_with(|| Turnout::new(setting.address));
        }
        self.routes.insert(route.id.clone(), route);
    }

    pub fn add_locomotive(
        &self,
        loco: Locomotive,
    ) {
        self.locomotives.insert(loco.id.clone(), loco);
    }

    /// Park a locomotive in a block: block becomes Occupied with the
    /// locomotive as occupant.
    pub fn place_locomotive(
        &self,
        loco: &LocoId,
        block: &BlockId,
    ) -> Result<(), LayoutError> {
        let mut block = self.block(block)?;
        block.state = BlockState::Occupied;
        block.occupant = Some(loco.clone());
        self.save_block(&block)
    }
}

impl LayoutStore for MemoryLayoutStore {
    fn block(
        &self,
        id: &BlockId,
    ) -> Result<Block, LayoutError> {
        self.blocks
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LayoutError::UnknownBlock(id.clone()))
    }

    fn block_by_tile(
        &self,
        tile: &TileId,
    ) -> Option<Block> {
        self.blocks
            .iter()
            .find(|entry| &entry.value().tile == tile)
            .map(|entry| entry.value().clone())
    }

    fn block_of_locomotive(
        &self,
        loco: &LocoId,
    ) -> Option<Block> {
        self.blocks
            .iter()
            .find(|entry| entry.value().occupant.as_ref() == Some(loco))
            .map(|entry| entry.value().clone())
    }

    fn routes_from(
        &self,
        block: &BlockId,
        side: BlockSide,
    ) -> Vec<Route> {
        let from_tile = match self.blocks.get(block) {
            Some(entry) => entry.value().tile.clone(),
            None => return Vec::new(),
        };

        let mut routes: Vec<Route> = self
            .routes
            .iter()
            .filter(|entry| {
                let route = entry.value();
                route.from_tile == from_tile && route.from_side == side
            })
            .map(|entry| entry.value().clone())
            .collect();
        // deterministic candidate order
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        routes
    }

    fn route(
        &self,
        id: &RouteId,
    ) -> Result<Route, LayoutError> {
        self.routes
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LayoutError::UnknownRoute(id.clone()))
    }

    fn locomotive(
        &self,
        id: &LocoId,
    ) -> Result<Locomotive, LayoutError> {
        self.locomotives
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LayoutError::UnknownLocomotive(id.clone()))
    }

    fn sensor(
        &self,
        address: SensorAddress,
    ) -> Option<Sensor> {
        self.sensors.get(&address).map(|entry| entry.value().clone())
    }

    fn turnout(
        &self,
        address: TurnoutAddress,
    ) -> Result<Turnout, LayoutError> {
        self.turnouts
            .get(&address)
            .map(|entry| entry.value().clone())
            .ok_or(LayoutError::UnknownTurnout(address))
    }

    fn is_turnout_locked(
        &self,
        address: TurnoutAddress,
        excluding: Option<&RouteId>,
    ) -> bool {
        self.routes.iter().any(|entry| {
            let route = entry.value();
            route.is_locked() && Some(&route.id) != excluding && route.uses_turnout(address)
        })
    }

    fn save_block(
        &self,
        block: &Block,
    ) -> Result<(), LayoutError> {
        self.blocks.insert(block.id.clone(), block.clone());
        Ok(())
    }

    fn save_route(
        &self,
        route: &Route,
    ) -> Result<(), LayoutError> {
        self.routes.insert(route.id.clone(), route.clone());
        Ok(())
    }

    fn save_locomotive(
        &self,
        loco: &Locomotive,
    ) -> Result<(), LayoutError> {
        self.locomotives.insert(loco.id.clone(), loco.clone());
        Ok(())
    }

    fn save_sensor(
        &self,
        sensor: &Sensor,
    ) -> Result<(), LayoutError> {
        self.sensors.insert(sensor.address, sensor.clone());
        Ok(())
    }

    fn save_turnout(
        &self,
        turnout: &Turnout,
    ) -> Result<(), LayoutError> {
        self.turnouts.insert(turnout.address, turnout.clone());
        Ok(())
    }
}
