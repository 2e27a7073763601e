use super::*;
use crate::errors::LayoutError;
use crate::model::Block;
use crate::model::BlockSide;
use crate::model::BlockState;
use crate::model::Locomotive;
use crate::model::Route;
use crate::model::RouteElement;
use crate::model::SensorAddress;
use crate::model::TurnoutAddress;
use crate::model::TurnoutPosition;
use crate::model::TurnoutSetting;
use crate::test_utils;

fn seeded_store() -> MemoryLayoutStore {
    let store = MemoryLayoutStore::new();
    store.add_block(Block::new(
        "b1",
        "t1",
        SensorAddress::new(20, 1),
        SensorAddress::new(20, 2),
    ));
    store.add_block(Block::new(
        "b2",
        "t2",
        SensorAddress::new(20, 3),
        SensorAddress::new(20, 4),
    ));

    let mut route = Route::new("r1", "t1", BlockSide::Plus, "t2", BlockSide::Minus);
    route.elements = vec![RouteElement {
        tile: "t5".into(),
        turnout: Some(TurnoutSetting {
            address: TurnoutAddress(30),
            position: TurnoutPosition::Straight,
        }),
        order: 0,
    }];
    store.add_route(route);
    store.add_locomotive(Locomotive::new("ice1"));
    store
}

/// # Case 1: seeded entities are readable by id
///
/// # Case 2: unknown ids surface as layout errors
#[test]
fn test_lookup_round_trip() {
    test_utils::enable_logger();
    let store = seeded_store();

    assert_eq!(store.block(&"b1".into()).expect("block").tile, "t1".into());
    assert_eq!(store.route(&"r1".into()).expect("route").to_side, BlockSide::Minus);
    assert!(store.locomotive(&"ice1".into()).is_ok());

    assert!(matches!(
        store.block(&"nope".into()),
        Err(LayoutError::UnknownBlock(_))
    ));
    assert!(matches!(
        store.locomotive(&"nope".into()),
        Err(LayoutError::UnknownLocomotive(_))
    ));
}

#[test]
fn test_tile_and_occupant_lookups() {
    test_utils::enable_logger();
    let store = seeded_store();
    let loco = "ice1".into();

    assert!(store.block_of_locomotive(&loco).is_none());

    store.place_locomotive(&loco, &"b1".into()).expect("place");

    let found = store.block_of_locomotive(&loco).expect("occupied block");
    assert_eq!(found.id, "b1".into());
    assert_eq!(found.state, BlockState::Occupied);
    assert_eq!(store.block_by_tile(&"t1".into()).expect("by tile").id, "b1".into());
    assert!(store.block_by_tile(&"t9".into()).is_none());
}

/// # Case 1: only routes leaving through the requested side match
///
/// # Case 2: candidates come back sorted by route id
#[test]
fn test_routes_from_filters_and_orders() {
    test_utils::enable_logger();
    let store = seeded_store();
    store.add_route(Route::new("r3", "t1", BlockSide::Plus, "t2", BlockSide::Plus));
    store.add_route(Route::new("r2", "t1", BlockSide::Minus, "t2", BlockSide::Minus));

    let plus_routes = store.routes_from(&"b1".into(), BlockSide::Plus);
    let ids: Vec<&str> = plus_routes.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r3"]);

    let minus_routes = store.routes_from(&"b1".into(), BlockSide::Minus);
    assert_eq!(minus_routes.len(), 1);
    assert_eq!(minus_routes[0].id, "r2".into());

    assert!(store.routes_from(&"nope".into(), BlockSide::Plus).is_empty());
}

/// # Case 1: an unlocked route never locks its turnouts
///
/// # Case 2: locking the route locks them, attributable via `excluding`
#[test]
fn test_turnout_lock_is_derived_from_routes() {
    test_utils::enable_logger();
    let store = seeded_store();
    let address = TurnoutAddress(30);

    assert!(!store.is_turnout_locked(address, None));

    let mut route = store.route(&"r1".into()).expect("route");
    route.locked_by = Some("ice1".into());
    store.save_route(&route).expect("save");

    assert!(store.is_turnout_locked(address, None));
    // the holder itself is excluded when re-validating its own commit
    assert!(!store.is_turnout_locked(address, Some(&"r1".into())));
    assert!(store.is_turnout_locked(address, Some(&"r9".into())));
}

#[test]
fn test_seeding_registers_boundary_entities() {
    test_utils::enable_logger();
    let store = seeded_store();

    assert!(store.sensor(SensorAddress::new(20, 1)).is_some());
    assert!(store.sensor(SensorAddress::new(20, 4)).is_some());
    assert!(store.sensor(SensorAddress::new(99, 9)).is_none());
    assert!(store.turnout(TurnoutAddress(30)).is_ok());
    assert!(matches!(
        store.turnout(TurnoutAddress(99)),
        Err(LayoutError::UnknownTurnout(_))
    ));
}

#[test]
fn test_save_overwrites_snapshot() {
    test_utils::enable_logger();
    let store = seeded_store();

    let mut block = store.block(&"b1".into()).expect("block");
    block.state = BlockState::Locked;
    store.save_block(&block).expect("save");

    assert_eq!(store.block(&"b1".into()).expect("block").state, BlockState::Locked);
}
