//! the test_utils folder here will share utils or test components betwee unit
//! tests and integrations tests
mod common;
mod fixtures;
pub mod mock_type_config;

pub use common::*;
pub use fixtures::*;
pub use mock_type_config::*;
