use crate::MockCommandStation;
use crate::MockLayoutStore;
use crate::MockRouteChooser;
use crate::MockTrackView;
use crate::TypeConfig;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct MockTypeConfig;

impl TypeConfig for MockTypeConfig {
    type LS = MockLayoutStore;

    type CS = MockCommandStation;

    type TV = MockTrackView;

    type RC = MockRouteChooser;
}
