use serde::Deserialize;
use serde::Serialize;

use super::TurnoutAddress;
use super::TurnoutPosition;

/// A switch accessory. Only the commanded position is stored; whether the
/// turnout is *locked* is derived from the routes that reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turnout {
    pub address: TurnoutAddress,
    pub position: TurnoutPosition,
}

impl Turnout {
    pub fn new(address: TurnoutAddress) -> Self {
        Self {
            address,
            position: TurnoutPosition::Straight,
        }
    }
}
