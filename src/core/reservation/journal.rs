use std::sync::Arc;

use nanoid::nanoid;
use tracing::debug;
use tracing::warn;

use crate::alias::CSOF;
use crate::alias::LSOF;
use crate::model::Block;
use crate::model::RouteId;
use crate::model::SignalAddress;
use crate::model::SignalAspect;
use crate::CommandStation;
use crate::LayoutStore;
use crate::TypeConfig;

/// One recorded mutation of a reservation, with enough context to undo it.
#[derive(Debug, Clone)]
pub enum UndoStep {
    /// Release the route lock
    UnlockRoute(RouteId),
    /// Write back the block snapshot taken before the mutation
    RestoreBlock(Block),
    /// Command the signal back to Stop
    ResetSignal(SignalAddress),
}

/// Ordered undo log of one reservation transaction.
///
/// Steps are pushed before each mutation and undone in reverse order, so a
/// block touched twice ends at its oldest snapshot. Undo runs to completion
/// even when individual steps fail (each failure is logged), and re-running
/// a journal is idempotent: every step writes absolute state.
#[derive(Debug, Clone)]
pub struct UndoJournal {
    txn: String,
    steps: Vec<UndoStep>,
}

impl UndoJournal {
    pub fn new() -> Self {
        Self {
            txn: nanoid!(8),
            steps: Vec::new(),
        }
    }

    /// Transaction id carried into every log line of this reservation.
    pub fn txn(&self) -> &str {
        &self.txn
    }

    pub fn push(
        &mut self,
        step: UndoStep,
    ) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undo every recorded step, newest first.
    pub async fn rollback<T>(
        &self,
        layout: &Arc<LSOF<T>>,
        station: &Arc<CSOF<T>>,
    ) where
        T: TypeConfig,
    {
        if self.is_empty() {
            return;
        }
        for step in self.steps.iter().rev() {
            match step {
                UndoStep::UnlockRoute(route_id) => match layout.route(route_id) {
                    Ok(mut route) => {
                        route.locked_by = None;
                        if let Err(e) = layout.save_route(&route) {
                            warn!(txn = %self.txn, route = %route_id, error = %e, "undo: route unlock failed");
                        }
                    }
                    Err(e) => {
                        warn!(txn = %self.txn, route = %route_id, error = %e, "undo: route vanished");
                    }
                },
                UndoStep::RestoreBlock(snapshot) => {
                    if let Err(e) = layout.save_block(snapshot) {
                        warn!(txn = %self.txn, block = %snapshot.id, error = %e, "undo: block restore failed");
                    }
                }
                UndoStep::ResetSignal(address) => {
                    if let Err(e) = station.set_signal(*address, SignalAspect::Stop).await {
                        warn!(txn = %self.txn, signal = %address, error = %e, "undo: signal reset failed");
                    }
                }
            }
        }
        debug!(txn = %self.txn, steps = self.steps.len(), "reservation rolled back");
    }
}

impl Default for UndoJournal {
    fn default() -> Self {
        Self::new()
    }
}
