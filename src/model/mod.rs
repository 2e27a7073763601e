//! Layout entities: blocks, routes, sensors, turnouts and locomotives.
//!
//! Entities are plain data with value semantics. Code that wants to change
//! track state fetches a copy from the layout store, mutates it and writes
//! it back; cross-dispatcher consistency comes from the reservation gate,
//! not from the entities themselves.

mod block;
mod ids;
mod locomotive;
mod route;
mod sensor;
mod turnout;

pub use block::*;
pub use ids::*;
pub use locomotive::*;
pub use route::*;
pub use sensor::*;
pub use turnout::*;
