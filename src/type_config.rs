use std::fmt::Debug;

use crate::CommandStation;
use crate::LayoutStore;
use crate::RouteChooser;
use crate::TrackView;

/// **This coding style learned from OpenRaft project type config.**
pub trait TypeConfig:
    Sync + Send + Sized + Debug + Clone + Copy + Default + Eq + PartialEq + Ord + PartialOrd + 'static
{
    type LS: LayoutStore;

    type CS: CommandStation;

    type TV: TrackView;

    type RC: RouteChooser;
}

pub mod alias {
    use super::TypeConfig;

    pub type LSOF<T> = <T as TypeConfig>::LS;

    pub type CSOF<T> = <T as TypeConfig>::CS;

    pub type TVOF<T> = <T as TypeConfig>::TV;

    pub type RCOF<T> = <T as TypeConfig>::RC;
}

/// Production wiring: in-memory layout store, loopback command station,
/// no-op track view and uniform random route choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct RailTypeConfig;

impl TypeConfig for RailTypeConfig {
    type LS = crate::MemoryLayoutStore;

    type CS = crate::SimStation;

    type TV = crate::NoopView;

    type RC = crate::RandomChooser;
}
