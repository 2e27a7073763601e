//! Ready-made layouts for dispatcher and reservation tests, plus a
//! deterministic chooser so candidate selection is scriptable.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::config::AutopilotConfig;
use crate::model::Block;
use crate::model::BlockSide;
use crate::model::LocoId;
use crate::model::Locomotive;
use crate::model::Route;
use crate::model::RouteElement;
use crate::model::SensorAddress;
use crate::model::SignalAddress;
use crate::model::TurnoutAddress;
use crate::model::TurnoutPosition;
use crate::model::TurnoutSetting;
use crate::MemoryLayoutStore;
use crate::NoopView;
use crate::RouteChooser;
use crate::SimStation;
use crate::TypeConfig;

/// Chooser returning a scripted index instead of a random draw.
#[derive(Debug, Default)]
pub struct StubChooser {
    index: AtomicUsize,
}

impl StubChooser {
    pub fn pick(index: usize) -> Self {
        Self {
            index: AtomicUsize::new(index),
        }
    }
}

impl RouteChooser for StubChooser {
    fn choose(
        &self,
        count: usize,
    ) -> usize {
        self.index.load(Ordering::Relaxed).min(count - 1)
    }
}

/// Wiring for tests that want real collaborators with scripted choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestTypeConfig;

impl TypeConfig for TestTypeConfig {
    type LS = MemoryLayoutStore;

    type CS = SimStation;

    type TV = NoopView;

    type RC = StubChooser;
}

/// Engine settings with every timed wait stripped, for single-stepping.
pub fn step_config() -> AutopilotConfig {
    let mut config = AutopilotConfig::default();
    config.step_mode = true;
    config.wait.min_ms = 0;
    config.wait.max_ms = 0;
    config.reservation.switch_pause_ms = 0;
    config.sensors.poll_interval_ms = 10;
    config
}

pub fn sensor(
    device: u16,
    contact: u16,
) -> SensorAddress {
    SensorAddress::new(device, contact)
}

/// Block `bN` on tile `tN` with sensors `20:2N-1`/`20:2N` and an exit
/// signal on the Plus side.
pub fn block_n(n: u16) -> Block {
    let mut block = Block::new(
        format!("b{n}"),
        format!("t{n}"),
        sensor(20, 2 * n - 1),
        sensor(20, 2 * n),
    );
    block.signal_plus = Some(SignalAddress(100 + n));
    block
}

/// Route `rFT` from tile `tF` Plus to tile `tT` Minus, optionally crossing
/// one straight turnout.
pub fn line_route(
    from: u16,
    to: u16,
    turnout: Option<u16>,
) -> Route {
    let mut route = Route::new(
        format!("r{from}{to}"),
        format!("t{from}"),
        BlockSide::Plus,
        format!("t{to}"),
        BlockSide::Minus,
    );
    if let Some(address) = turnout {
        route.elements = vec![RouteElement {
            tile: format!("x{address}").into(),
            turnout: Some(TurnoutSetting {
                address: TurnoutAddress(address),
                position: TurnoutPosition::Straight,
            }),
            order: 0,
        }];
    }
    route
}

/// `b1 --r12--> b2`, one turnout on the way, locomotive `ice1` parked in
/// `b1` driving forwards.
pub fn two_block_line() -> MemoryLayoutStore {
    let store = MemoryLayoutStore::new();
    store.add_block(block_n(1));
    store.add_block(block_n(2));
    store.add_route(line_route(1, 2, Some(30)));
    store.add_locomotive(Locomotive::new("ice1"));
    store
        .place_locomotive(&"ice1".into(), &"b1".into())
        .expect("place ice1");
    store
}

/// Three blocks in a circle; every leg enters through the Minus side so a
/// forwards-driving train can cycle endlessly.
pub fn oval() -> MemoryLayoutStore {
    let store = MemoryLayoutStore::new();
    for n in 1..=3 {
        store.add_block(block_n(n));
    }
    store.add_route(line_route(1, 2, Some(30)));
    store.add_route(line_route(2, 3, None));
    store.add_route(line_route(3, 1, Some(31)));
    store.add_locomotive(Locomotive::new("ice1"));
    store
        .place_locomotive(&"ice1".into(), &"b1".into())
        .expect("place ice1");
    store
}

/// `b1 <--> b2` where `b2` is a dead end: the only way out of `b2` is back
/// through the side the train came in. Locomotive `vt628` is a commuter
/// parked in `b2`.
pub fn dead_end() -> MemoryLayoutStore {
    let store = MemoryLayoutStore::new();
    store.add_block(block_n(1));
    store.add_block(block_n(2));
    store.add_route(line_route(1, 2, None));

    // back out of the dead end: leaves b2 through Minus, enters b1 through Plus
    store.add_route(Route::new("r21", "t2", BlockSide::Minus, "t1", BlockSide::Plus));

    let mut loco = Locomotive::new("vt628");
    loco.commuter = true;
    store.add_locomotive(loco);
    store
        .place_locomotive(&"vt628".into(), &"b2".into())
        .expect("place vt628");
    store
}

/// Two trains, one shared destination: `b1 --r12--> b2 <--r32-- b3`, both
/// approach routes crossing the same turnout. Locomotives `ice1` in `b1`
/// and `br218` in `b3`.
pub fn contention_y() -> MemoryLayoutStore {
    let store = MemoryLayoutStore::new();
    for n in 1..=3 {
        store.add_block(block_n(n));
    }
    store.add_route(line_route(1, 2, Some(40)));

    let mut r32 = Route::new("r32", "t3", BlockSide::Plus, "t2", BlockSide::Minus);
    r32.elements = vec![RouteElement {
        tile: "x40".into(),
        turnout: Some(TurnoutSetting {
            address: TurnoutAddress(40),
            position: TurnoutPosition::Diverging,
        }),
        order: 0,
    }];
    store.add_route(r32);

    store.add_locomotive(Locomotive::new("ice1"));
    store.add_locomotive(Locomotive::new("br218"));
    store
        .place_locomotive(&"ice1".into(), &"b1".into())
        .expect("place ice1");
    store
        .place_locomotive(&"br218".into(), &"b3".into())
        .expect("place br218");
    store
}

pub fn loco_id(id: &str) -> LocoId {
    LocoId::from(id)
}
