//! Track display seam. Purely advisory: the engine pushes block and route
//! state at it, and correctness never depends on what the view does with
//! them.

#[cfg(test)]
use mockall::automock;

use tracing::debug;

use crate::model::Block;
use crate::model::Route;

/// Highlight color for a reserved route on a track diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteColor {
    /// Reserved, train not yet underway
    Yellow,
    /// Train is running the route
    Green,
}

#[cfg_attr(test, automock)]
pub trait TrackView: Send + Sync + 'static {
    fn show_block(
        &self,
        block: &Block,
    );

    fn show_route(
        &self,
        route: &Route,
        color: RouteColor,
    );

    fn reset_route(
        &self,
        route: &Route,
    );
}

/// Default view: renders nothing, logs at debug for traceability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopView;

impl TrackView for NoopView {
    fn show_block(
        &self,
        block: &Block,
    ) {
        debug!(block = %block.id, state = ?block.state, "view: block");
    }

    fn show_route(
        &self,
        route: &Route,
        color: RouteColor,
    ) {
        debug!(route = %route.id, ?color, "view: route");
    }

    fn reset_route(
        &self,
        route: &Route,
    ) {
        debug!(route = %route.id, "view: route reset");
    }
}
