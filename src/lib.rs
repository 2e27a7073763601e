mod config;
mod core;
mod errors;
mod model;
mod station;
mod storage;
mod type_config;
mod view;

pub use core::*;

pub use config::*;
pub use errors::*;
pub use model::*;
pub use station::*;
pub use storage::*;
pub use type_config::*;
pub use view::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
