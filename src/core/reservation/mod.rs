//! Cross-dispatcher route reservation.
//!
//! All availability decisions happen while the caller holds the global
//! reservation gate; the protocol itself only enforces commit-time
//! re-validation and transactional rollback.

mod journal;
mod protocol;

pub use journal::*;
pub use protocol::*;


// Trait definition of the current module
// -----------------------------------------------------------------------------

#[cfg(test)]
use mockall::automock;

use rand::Rng;

/// Tie-break among several available candidate routes. Seam for tests;
/// production draws uniformly.
#[cfg_attr(test, automock)]
pub trait RouteChooser: Send + Sync + 'static {
    /// Pick an index in `0..count`. Only called with `count >= 2`; a single
    /// candidate is taken without a draw.
    fn choose(
        &self,
        count: usize,
    ) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomChooser;

impl RouteChooser for RandomChooser {
    fn choose(
        &self,
        count: usize,
    ) -> usize {
        rand::thread_rng().gen_range(0..count)
    }
}
