use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::RouteChooser;
use super::UndoJournal;
use super::UndoStep;
use crate::alias::CSOF;
use crate::alias::LSOF;
use crate::alias::RCOF;
use crate::alias::TVOF;
use crate::config::AutopilotConfig;
use crate::errors::ReservationError;
use crate::model::Block;
use crate::model::BlockId;
use crate::model::BlockSide;
use crate::model::BlockState;
use crate::model::Locomotive;
use crate::model::Route;
use crate::model::RouteId;
use crate::model::SensorAddress;
use crate::model::SignalAddress;
use crate::model::SignalAspect;
use crate::model::Turnout;
use crate::CommandStation;
use crate::LayoutStore;
use crate::RouteColor;
use crate::TrackView;
use crate::TypeConfig;

/// A committed route reservation held by one dispatcher: the route, the two
/// blocks it joins, the destination's boundary sensors and the undo journal
/// that can take it all back.
#[derive(Debug, Clone)]
pub struct ActiveReservation {
    pub route_id: RouteId,
    pub departure: BlockId,
    pub destination: BlockId,
    /// Side the train will physically enter the destination through
    /// (`route.to_side`, unflipped)
    pub arrival_side: BlockSide,
    /// The commuter fallback reversed the search side; the dispatcher must
    /// flip the locomotive's direction before moving
    pub flip_direction: bool,
    pub enter_sensor: SensorAddress,
    pub in_sensor: SensorAddress,
    pub departure_signal: Option<SignalAddress>,
    pub(crate) journal: UndoJournal,
}

impl ActiveReservation {
    pub fn txn(&self) -> &str {
        self.journal.txn()
    }
}

/// Search and reserve routes, commit turnouts, release or roll back.
///
/// Every caller must hold the global reservation gate across
/// `reserve_standing`/`reserve_moving`; release and rollback operate on
/// states only the owning dispatcher can still see, so they run gateless.
pub struct ReservationProtocol<T>
where T: TypeConfig
{
    layout: Arc<LSOF<T>>,
    station: Arc<CSOF<T>>,
    view: Arc<TVOF<T>>,
    chooser: Arc<RCOF<T>>,
    config: AutopilotConfig,
}

impl<T> ReservationProtocol<T>
where T: TypeConfig
{
    pub fn new(
        layout: Arc<LSOF<T>>,
        station: Arc<CSOF<T>>,
        view: Arc<TVOF<T>>,
        chooser: Arc<RCOF<T>>,
        config: AutopilotConfig,
    ) -> Self {
        Self {
            layout,
            station,
            view,
            chooser,
            config,
        }
    }

    /// Reserve the next route for a train standing in `departure`.
    ///
    /// The exit side follows the block's logical direction and the
    /// locomotive's travel direction. When nothing is available there and
    /// the locomotive is a commuter, the opposite side is tried once; a
    /// route found that way carries `flip_direction`.
    pub async fn reserve_standing(
        &self,
        loco: &Locomotive,
        departure: &Block,
    ) -> Result<ActiveReservation, ReservationError> {
        let side = departure.exit_side(loco.direction);

        match self.pick_candidate(loco, departure, side, false) {
            Some(route) => self.commit(loco, departure, route, false, false).await,
            None if loco.commuter => {
                debug!(
                    loco = %loco.id,
                    block = %departure.id,
                    "no forward route; trying commuter turnaround"
                );
                let route = self
                    .pick_candidate(loco, departure, !side, false)
                    .ok_or(ReservationError::NoFreeRoute {
                        block: departure.id.clone(),
                        side,
                    })?;
                self.commit(loco, departure, route, false, true).await
            }
            None => Err(ReservationError::NoFreeRoute {
                block: departure.id.clone(),
                side,
            }),
        }
    }

    /// Reserve a continuation route for a train about to cross into
    /// `departure` through `entry_side`, without stopping there.
    ///
    /// A moving train can only leave through the far side, so there is no
    /// commuter fallback; the destination must additionally admit this
    /// class of train because the decision to pass is made for it.
    pub async fn reserve_moving(
        &self,
        loco: &Locomotive,
        departure: &Block,
        entry_side: BlockSide,
    ) -> Result<ActiveReservation, ReservationError> {
        let side = !entry_side;
        let route =
            self.pick_candidate(loco, departure, side, true)
                .ok_or(ReservationError::NoFreeRoute {
                    block: departure.id.clone(),
                    side,
                })?;
        self.commit(loco, departure, route, true, false).await
    }

    /// The train has hit the destination's enter sensor: flip the crossing
    /// pair to Leaving/Arriving. Journaled, so a reset mid-crossing still
    /// restores the original states.
    pub fn mark_crossing(
        &self,
        reservation: &mut ActiveReservation,
    ) -> Result<(), ReservationError> {
        self.flip_crossing(reservation, BlockState::Leaving, BlockState::Arriving)?;
        if let Ok(route) = self.layout.route(&reservation.route_id) {
            self.view.show_route(&route, RouteColor::Green);
        }
        Ok(())
    }

    /// A continuation was reserved while crossing: re-mark the pair as a
    /// pass-through (Outbound/Inbound).
    pub fn mark_passthrough(
        &self,
        reservation: &mut ActiveReservation,
    ) -> Result<(), ReservationError> {
        self.flip_crossing(reservation, BlockState::Outbound, BlockState::Inbound)
    }

    /// Final stop on the in sensor: free the departure, occupy the
    /// destination, release the route. Consumes the reservation.
    pub async fn release_after_stop(
        &self,
        reservation: ActiveReservation,
        loco: &Locomotive,
    ) -> Result<(), ReservationError> {
        let mut departure = self.layout.block(&reservation.departure)?;
        departure.release();
        self.layout.save_block(&departure)?;
        self.view.show_block(&departure);

        let mut destination = self.layout.block(&reservation.destination)?;
        destination.record_arrival(loco.id.clone(), reservation.arrival_side);
        self.layout.save_block(&destination)?;
        self.view.show_block(&destination);

        self.release_route(&reservation).await?;
        info!(
            txn = %reservation.txn(),
            loco = %loco.id,
            block = %destination.id,
            "arrival finalized"
        );
        Ok(())
    }

    /// Pass completion on the in sensor: free the departure and leave the
    /// destination Outbound with the train still on it. Consumes the
    /// reservation; the continuation reservation stays untouched.
    pub async fn release_passthrough(
        &self,
        reservation: ActiveReservation,
        loco: &Locomotive,
    ) -> Result<(), ReservationError> {
        let mut departure = self.layout.block(&reservation.departure)?;
        departure.release();
        self.layout.save_block(&departure)?;
        self.view.show_block(&departure);

        let mut destination = self.layout.block(&reservation.destination)?;
        destination.state = BlockState::Outbound;
        destination.occupant = Some(loco.id.clone());
        destination.arrival_side = Some(reservation.arrival_side);
        self.layout.save_block(&destination)?;
        self.view.show_block(&destination);

        self.release_route(&reservation).await?;
        info!(
            txn = %reservation.txn(),
            loco = %loco.id,
            block = %destination.id,
            "pass-through completed"
        );
        Ok(())
    }

    /// Undo a reservation through its journal. Used on commit failure, on
    /// declined continuations and on reset.
    pub async fn rollback(
        &self,
        reservation: ActiveReservation,
    ) {
        reservation.journal.rollback::<T>(&self.layout, &self.station).await;
        if let Ok(route) = self.layout.route(&reservation.route_id) {
            self.view.reset_route(&route);
        }
    }

    fn pick_candidate(
        &self,
        loco: &Locomotive,
        departure: &Block,
        side: BlockSide,
        moving: bool,
    ) -> Option<Route> {
        let candidates: Vec<Route> = self
            .layout
            .routes_from(&departure.id, side)
            .into_iter()
            .filter(|route| self.route_available(route, loco, moving))
            .collect();

        debug!(
            loco = %loco.id,
            block = %departure.id,
            %side,
            candidates = candidates.len(),
            "route search"
        );

        match candidates.len() {
            0 => None,
            1 => candidates.into_iter().next(),
            n => {
                let index = self.chooser.choose(n);
                candidates.into_iter().nth(index.min(n - 1))
            }
        }
    }

    /// Availability filter: unlocked route, free destination with both
    /// boundary sensors inactive, no turnout locked by another route.
    fn route_available(
        &self,
        route: &Route,
        loco: &Locomotive,
        moving: bool,
    ) -> bool {
        if route.is_locked() {
            return false;
        }

        let Some(destination) = self.layout.block_by_tile(&route.to_tile) else {
            return false;
        };
        if !destination.is_free() {
            return false;
        }
        if moving && !destination.admits(loco.commuter) {
            return false;
        }

        for address in [destination.sensor_plus, destination.sensor_minus] {
            if self.layout.sensor(address).map(|s| s.active).unwrap_or(false) {
                return false;
            }
        }

        for setting in route.turnouts() {
            if self.layout.is_turnout_locked(setting.address, Some(&route.id)) {
                return false;
            }
        }

        true
    }

    /// Lock the route and both blocks, then command the turnouts in track
    /// order with commit-time re-validation. Any failure rolls the partial
    /// transaction back and surfaces as retryable.
    async fn commit(
        &self,
        loco: &Locomotive,
        departure: &Block,
        route: Route,
        moving: bool,
        flip_direction: bool,
    ) -> Result<ActiveReservation, ReservationError> {
        let mut journal = UndoJournal::new();
        let txn = journal.txn().to_string();

        let destination = self
            .layout
            .block_by_tile(&route.to_tile)
            .ok_or_else(|| ReservationError::DestinationUnavailable(route.to_tile.clone()))?;

        let (locked_route, locked_dest) =
            match self.lock_states(&mut journal, loco, departure, &destination, &route, moving) {
                Ok(locked) => locked,
                Err(e) => {
                    warn!(txn = %txn, route = %route.id, error = %e, "reservation aborted while locking states");
                    journal.rollback::<T>(&self.layout, &self.station).await;
                    return Err(e);
                }
            };

        if let Err(e) = self.commit_turnouts(&locked_route, &txn).await {
            warn!(txn = %txn, route = %route.id, error = %e, "reservation aborted at turnout commit");
            journal.rollback::<T>(&self.layout, &self.station).await;
            return Err(e);
        }

        let departure_signal = departure.signal_on(route.from_side);
        if let Some(signal) = departure_signal {
            if let Err(e) = self.station.set_signal(signal, SignalAspect::Clear).await {
                journal.rollback::<T>(&self.layout, &self.station).await;
                return Err(e.into());
            }
            journal.push(UndoStep::ResetSignal(signal));
        }

        self.view.show_route(&locked_route, RouteColor::Yellow);
        info!(
            txn = %txn,
            loco = %loco.id,
            route = %route.id,
            from = %departure.id,
            to = %locked_dest.id,
            moving,
            "route reserved"
        );

        Ok(ActiveReservation {
            route_id: route.id.clone(),
            departure: departure.id.clone(),
            destination: locked_dest.id.clone(),
            arrival_side: route.to_side,
            flip_direction,
            enter_sensor: locked_dest.enter_sensor(route.to_side),
            in_sensor: locked_dest.in_sensor(route.to_side),
            departure_signal,
            journal,
        })
    }

    /// Lock the route to the locomotive and mark both block states, pushing
    /// an undo step ahead of every mutation. The caller rolls the journal
    /// back when any save fails.
    fn lock_states(
        &self,
        journal: &mut UndoJournal,
        loco: &Locomotive,
        departure: &Block,
        destination: &Block,
        route: &Route,
        moving: bool,
    ) -> Result<(Route, Block), ReservationError> {
        journal.push(UndoStep::UnlockRoute(route.id.clone()));
        let mut locked_route = route.clone();
        locked_route.locked_by = Some(loco.id.clone());
        self.layout.save_route(&locked_route)?;

        // a moving train's departure is the block it is crossing; its state
        // pair is managed by the crossing marks, not here
        if !moving {
            journal.push(UndoStep::RestoreBlock(departure.clone()));
            let mut departing = departure.clone();
            departing.state = BlockState::Departing;
            self.layout.save_block(&departing)?;
            self.view.show_block(&departing);
        }

        journal.push(UndoStep::RestoreBlock(destination.clone()));
        let mut locked_dest = destination.clone();
        locked_dest.state = BlockState::Locked;
        locked_dest.occupant = Some(loco.id.clone());
        locked_dest.arrival_side = Some(route.to_side);
        self.layout.save_block(&locked_dest)?;
        self.view.show_block(&locked_dest);

        Ok((locked_route, locked_dest))
    }

    /// Throw every turnout of the route in track order, re-validating the
    /// derived lock immediately before each command.
    async fn commit_turnouts(
        &self,
        route: &Route,
        txn: &str,
    ) -> Result<(), ReservationError> {
        let settings: Vec<_> = route.turnouts().collect();
        let last = settings.len().saturating_sub(1);

        for (i, setting) in settings.into_iter().enumerate() {
            if self.layout.is_turnout_locked(setting.address, Some(&route.id)) {
                return Err(ReservationError::TurnoutContended {
                    route: route.id.clone(),
                    turnout: setting.address,
                });
            }

            self.station.switch_turnout(setting.address, setting.position).await?;

            let mut turnout = self
                .layout
                .turnout(setting.address)
                .unwrap_or_else(|_| Turnout::new(setting.address));
            turnout.position = setting.position;
            self.layout.save_turnout(&turnout)?;
            debug!(txn = %txn, turnout = %setting.address, position = ?setting.position, "turnout committed");

            // actuators need switching time between commands
            if i != last && !self.config.step_mode {
                tokio::time::sleep(self.config.reservation.switch_pause()).await;
            }
        }
        Ok(())
    }

    async fn release_route(
        &self,
        reservation: &ActiveReservation,
    ) -> Result<(), ReservationError> {
        let mut route = self.layout.route(&reservation.route_id)?;
        route.locked_by = None;
        self.layout.save_route(&route)?;
        self.view.reset_route(&route);

        if let Some(signal) = reservation.departure_signal {
            if let Err(e) = self.station.set_signal(signal, SignalAspect::Stop).await {
                warn!(txn = %reservation.txn(), signal = %signal, error = %e, "signal reset failed on release");
            }
        }
        Ok(())
    }

    fn flip_crossing(
        &self,
        reservation: &mut ActiveReservation,
        departure_state: BlockState,
        destination_state: BlockState,
    ) -> Result<(), ReservationError> {
        let mut departure = self.layout.block(&reservation.departure)?;
        reservation.journal.push(UndoStep::RestoreBlock(departure.clone()));
        departure.state = departure_state;
        self.layout.save_block(&departure)?;
        self.view.show_block(&departure);

        let mut destination = self.layout.block(&reservation.destination)?;
        reservation.journal.push(UndoStep::RestoreBlock(destination.clone()));
        destination.state = destination_state;
        self.layout.save_block(&destination)?;
        self.view.show_block(&destination);

        debug!(
            txn = %reservation.txn(),
            departure = %departure.id,
            destination = %destination.id,
            states = ?(departure_state, destination_state),
            "crossing states updated"
        );
        Ok(())
    }
}
