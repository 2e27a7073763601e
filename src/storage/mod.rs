mod layout_store;
mod memory;

#[cfg(test)]
mod storage_test;

#[doc(hidden)]
pub use layout_store::*;
#[doc(hidden)]
pub use memory::*;
